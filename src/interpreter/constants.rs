// Constants for the pseudocode interpreter

/// Addresses below this value are reserved and never handed out by the arena.
/// Address 0 doubles as NULL.
pub const RESERVED_ADDRESSES: u64 = 1024;

/// Default number of slots in the simulated arena
pub const DEFAULT_ARENA_SIZE: usize = 65_536;

/// Default global loop-iteration budget for one run
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

/// Default maximum number of active procedure/function frames
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 500;

/// Largest element count a single array may declare
pub const MAX_ARRAY_CELLS: usize = 1_000_000;

/// Remaining native stack below which evaluation moves to a fresh segment
pub const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each native stack segment allocated for deep recursion
pub const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Deepest nesting of parentheses, prefix operators or blocks the parser accepts
pub const MAX_NESTING_DEPTH: usize = 100;

/// Default cap on recorded trace entries
pub const DEFAULT_TRACE_LIMIT: usize = 100_000;

/// Slots rendered per hex-dump row
pub const HEX_DUMP_WIDTH: usize = 16;

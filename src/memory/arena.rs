//! Memory arena implementation for the interpreter
//!
//! This module provides the simulated address space with:
//! - A fixed number of addressable slots, one [`Value`] per slot
//! - A reserved prefix (`0..RESERVED_ADDRESSES`) that is never handed out; 0 is NULL
//! - An allocation table mapping block start → [`Allocation`]
//! - Double-free and invalid-free detection
//!
//! # Reclamation
//!
//! Allocation is a forward scan from the free-address watermark. Freeing the
//! highest block pulls the watermark back to the end of the highest remaining
//! block; freeing any other block leaves a hole that later allocations never
//! reuse. There is no free list and no compaction.

use super::value::{Address, Value};
use crate::interpreter::constants::{HEX_DUMP_WIDTH, RESERVED_ADDRESSES};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write as _;
use thiserror::Error;

/// Faults raised by arena operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryFault {
    #[error("address 0x{address:04x} is out of bounds (arena size {size})")]
    OutOfBounds { address: Address, size: usize },

    #[error("address 0x{0:04x} is not allocated")]
    NotAllocated(Address),

    #[error("read of uninitialized memory at 0x{0:04x}")]
    Uninitialized(Address),

    #[error("invalid free: 0x{0:04x} is not the start of an allocated block")]
    InvalidFree(Address),

    #[error("double free of 0x{0:04x}")]
    DoubleFree(Address),

    #[error("out of memory: no run of {requested} free slots available")]
    OutOfMemory { requested: usize },

    #[error("null pointer dereference")]
    NullDereference,

    #[error("invalid allocation size {0}")]
    InvalidSize(i64),
}

/// One live allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub start: Address,
    pub size: usize,
    pub type_tag: String,
}

impl Allocation {
    pub fn end(&self) -> Address {
        self.start + self.size as Address
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Summary numbers for visualizers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub size: usize,
    pub used_slots: usize,
    pub live_blocks: usize,
    pub watermark: Address,
    /// Slots between the watermark and the end of the arena
    pub free_tail: usize,
}

/// The simulated memory arena
#[derive(Debug, Clone)]
pub struct Arena {
    slots: Vec<Option<Value>>,
    allocated: Vec<bool>,
    allocations: FxHashMap<Address, Allocation>,
    freed: FxHashSet<Address>,
    next_free_address: Address,
}

impl Arena {
    /// Create an arena with `size` slots
    pub fn new(size: usize) -> Self {
        Arena {
            slots: vec![None; size],
            allocated: vec![false; size],
            allocations: FxHashMap::default(),
            freed: FxHashSet::default(),
            next_free_address: RESERVED_ADDRESSES,
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Current free-address watermark
    pub fn watermark(&self) -> Address {
        self.next_free_address
    }

    /// Allocate `size` consecutive slots tagged with `type_tag`
    pub fn allocate(&mut self, size: usize, type_tag: &str) -> Result<Address, MemoryFault> {
        if size == 0 {
            return Err(MemoryFault::InvalidSize(0));
        }

        let end = self.slots.len();
        let mut candidate = self.next_free_address.max(RESERVED_ADDRESSES) as usize;

        'scan: while candidate.checked_add(size).is_some_and(|last| last <= end) {
            for offset in 0..size {
                if self.allocated[candidate + offset] {
                    candidate += offset + 1;
                    continue 'scan;
                }
            }

            for slot in candidate..candidate + size {
                self.allocated[slot] = true;
                self.slots[slot] = None;
            }
            let start = candidate as Address;
            self.allocations.insert(
                start,
                Allocation {
                    start,
                    size,
                    type_tag: type_tag.to_string(),
                },
            );
            self.freed.remove(&start);
            self.next_free_address = self.next_free_address.max(start + size as Address);
            log::debug!("arena: allocated {} slot(s) of {} at 0x{:04x}", size, type_tag, start);
            return Ok(start);
        }

        Err(MemoryFault::OutOfMemory { requested: size })
    }

    /// Free the block starting exactly at `address`
    pub fn free(&mut self, address: Address) -> Result<Allocation, MemoryFault> {
        let Some(allocation) = self.allocations.remove(&address) else {
            return Err(if self.freed.contains(&address) {
                MemoryFault::DoubleFree(address)
            } else {
                MemoryFault::InvalidFree(address)
            });
        };

        for slot in allocation.start as usize..allocation.end() as usize {
            self.allocated[slot] = false;
            self.slots[slot] = None;
        }
        self.freed.insert(address);

        let was_last = self.allocations.keys().all(|&start| start < address);
        if was_last {
            self.next_free_address = self
                .allocations
                .values()
                .map(Allocation::end)
                .max()
                .unwrap_or(RESERVED_ADDRESSES);
        }

        log::debug!(
            "arena: freed {} slot(s) at 0x{:04x}, watermark 0x{:04x}",
            allocation.size,
            address,
            self.next_free_address
        );
        Ok(allocation)
    }

    fn check_access(&self, address: Address) -> Result<usize, MemoryFault> {
        let index = address as usize;
        if address == 0 {
            return Err(MemoryFault::NullDereference);
        }
        if index >= self.slots.len() {
            return Err(MemoryFault::OutOfBounds {
                address,
                size: self.slots.len(),
            });
        }
        if !self.allocated[index] {
            return Err(MemoryFault::NotAllocated(address));
        }
        Ok(index)
    }

    /// Read the value stored at `address`
    pub fn read(&self, address: Address) -> Result<Value, MemoryFault> {
        let index = self.check_access(address)?;
        self.slots[index]
            .clone()
            .ok_or(MemoryFault::Uninitialized(address))
    }

    /// Write `value` at `address`, returning the previous contents
    pub fn write(&mut self, address: Address, value: Value) -> Result<Option<Value>, MemoryFault> {
        let index = self.check_access(address)?;
        Ok(self.slots[index].replace(value))
    }

    /// Raw slot contents, without allocation checks
    pub fn peek(&self, address: Address) -> Option<&Value> {
        self.slots.get(address as usize).and_then(Option::as_ref)
    }

    pub fn is_allocated(&self, address: Address) -> bool {
        self.allocated.get(address as usize).copied().unwrap_or(false)
    }

    /// Resolve an address (possibly interior to a block) to its allocation
    pub fn get_allocation(&self, address: Address) -> Option<&Allocation> {
        if !self.is_allocated(address) {
            return None;
        }
        self.allocations.values().find(|a| a.contains(address))
    }

    /// Live allocations ordered by start address
    pub fn allocations(&self) -> Vec<&Allocation> {
        let mut list: Vec<&Allocation> = self.allocations.values().collect();
        list.sort_by_key(|a| a.start);
        list
    }

    pub fn used_slots(&self) -> usize {
        self.allocations.values().map(|a| a.size).sum()
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            size: self.slots.len(),
            used_slots: self.used_slots(),
            live_blocks: self.allocations.len(),
            watermark: self.next_free_address,
            free_tail: self.slots.len().saturating_sub(self.next_free_address as usize),
        }
    }

    /// Render `length` slots from `start` as rows of hex bytes plus an ASCII column.
    /// Unallocated slots show as `--`, allocated but unwritten slots as `??`.
    pub fn hex_dump(&self, start: Address, length: usize) -> String {
        let begin = (start as usize).min(self.slots.len());
        let end = begin.saturating_add(length).min(self.slots.len());
        let mut out = String::new();

        let mut row = begin;
        while row < end {
            let row_end = (row + HEX_DUMP_WIDTH).min(end);
            let mut hex = String::new();
            let mut ascii = String::new();

            for index in row..row_end {
                let (cell, glyph) = if !self.allocated[index] {
                    ("--".to_string(), '.')
                } else {
                    match &self.slots[index] {
                        None => ("??".to_string(), '.'),
                        Some(value) => {
                            let byte = slot_byte(value);
                            let glyph = if byte.is_ascii_graphic() || byte == b' ' {
                                byte as char
                            } else {
                                '.'
                            };
                            (format!("{:02x}", byte), glyph)
                        }
                    }
                };
                if index > row {
                    hex.push(' ');
                }
                hex.push_str(&cell);
                ascii.push(glyph);
            }

            for _ in row_end..row + HEX_DUMP_WIDTH {
                hex.push_str("   ");
            }

            let _ = writeln!(out, "0x{:04x}: {} |{}|", row, hex, ascii);
            row = row_end;
        }

        out
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(crate::interpreter::constants::DEFAULT_ARENA_SIZE)
    }
}

/// Low byte of a slot value for the hex view
fn slot_byte(value: &Value) -> u8 {
    match value {
        Value::Number(n) => (*n as i64 & 0xff) as u8,
        Value::Text(s) => s.bytes().next().unwrap_or(0),
        Value::Boolean(b) => u8::from(*b),
        Value::Address(a) => (*a & 0xff) as u8,
        Value::Array(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;

    #[test]
    fn test_reserved_region_is_never_handed_out() {
        let mut arena = Arena::new(2048);
        let a = arena.allocate(4, "INTEGER").unwrap();
        assert_eq!(a, RESERVED_ADDRESSES);
        assert_eq!(arena.watermark(), RESERVED_ADDRESSES + 4);
    }

    #[test]
    fn test_oversized_request_is_out_of_memory() {
        let mut arena = Arena::new(2048);
        assert_eq!(
            arena.allocate(usize::MAX, "BLOCK"),
            Err(MemoryFault::OutOfMemory {
                requested: usize::MAX
            })
        );
        assert_eq!(
            arena.allocate(usize::MAX - 512, "BLOCK"),
            Err(MemoryFault::OutOfMemory {
                requested: usize::MAX - 512
            })
        );
        // Nothing was reserved by the failed requests
        assert_eq!(arena.allocate(4, "INTEGER"), Ok(RESERVED_ADDRESSES));
    }

    #[test]
    fn test_write_then_read() {
        let mut arena = Arena::new(2048);
        let a = arena.allocate(2, "INTEGER").unwrap();

        assert_eq!(arena.read(a), Err(MemoryFault::Uninitialized(a)));
        assert_eq!(arena.write(a, Value::Number(7.0)), Ok(None));
        assert_eq!(arena.read(a), Ok(Value::Number(7.0)));
        assert_eq!(
            arena.write(a, Value::Number(8.0)),
            Ok(Some(Value::Number(7.0)))
        );
    }

    #[test]
    fn test_out_of_bounds_vs_not_allocated() {
        let mut arena = Arena::new(2048);
        assert_eq!(arena.read(1500), Err(MemoryFault::NotAllocated(1500)));
        assert_eq!(
            arena.write(5000, Value::Boolean(true)),
            Err(MemoryFault::OutOfBounds {
                address: 5000,
                size: 2048
            })
        );
        assert_eq!(arena.read(0), Err(MemoryFault::NullDereference));
    }

    #[test]
    fn test_free_requires_block_start() {
        let mut arena = Arena::new(2048);
        let a = arena.allocate(8, "REAL").unwrap();

        assert_eq!(arena.free(a + 1), Err(MemoryFault::InvalidFree(a + 1)));
        assert!(arena.free(a).is_ok());
        assert_eq!(arena.free(a), Err(MemoryFault::DoubleFree(a)));
        assert_eq!(arena.read(a), Err(MemoryFault::NotAllocated(a)));
    }

    #[test]
    fn test_freeing_last_block_rewinds_watermark() {
        let mut arena = Arena::new(4096);
        let a = arena.allocate(4, "INTEGER").unwrap();
        let b = arena.allocate(4, "INTEGER").unwrap();

        arena.free(b).unwrap();
        assert_eq!(arena.watermark(), a + 4);
        assert_eq!(arena.allocate(4, "INTEGER").unwrap(), b);
    }

    #[test]
    fn test_interior_holes_are_not_reused() {
        let mut arena = Arena::new(4096);
        let a = arena.allocate(4, "INTEGER").unwrap();
        let b = arena.allocate(4, "INTEGER").unwrap();

        arena.free(a).unwrap();
        assert_eq!(arena.watermark(), b + 4);
        let c = arena.allocate(4, "INTEGER").unwrap();
        assert_eq!(c, b + 4);
    }

    #[test]
    fn test_watermark_falls_to_reserved_when_empty() {
        let mut arena = Arena::new(4096);
        let a = arena.allocate(4, "INTEGER").unwrap();
        let b = arena.allocate(4, "INTEGER").unwrap();
        arena.free(a).unwrap();
        arena.free(b).unwrap();
        assert_eq!(arena.watermark(), RESERVED_ADDRESSES);
    }

    #[test]
    fn test_out_of_memory() {
        let mut arena = Arena::new(1024 + 10);
        assert!(arena.allocate(8, "BLOCK").is_ok());
        assert_eq!(
            arena.allocate(8, "BLOCK"),
            Err(MemoryFault::OutOfMemory { requested: 8 })
        );
        assert_eq!(arena.allocate(0, "BLOCK"), Err(MemoryFault::InvalidSize(0)));
    }

    #[test]
    fn test_get_allocation_resolves_interior_addresses() {
        let mut arena = Arena::new(4096);
        let a = arena.allocate(256, "STRING").unwrap();
        let block = arena.get_allocation(a + 100).unwrap();
        assert_eq!(block.start, a);
        assert_eq!(block.type_tag, "STRING");
        assert!(arena.get_allocation(a + 256).is_none());
    }

    #[test]
    fn test_hex_dump_placeholders() {
        let mut arena = Arena::new(4096);
        let a = arena.allocate(2, "CHAR").unwrap();
        arena.write(a, Value::Text("A".into())).unwrap();

        let dump = arena.hex_dump(a, 4);
        assert!(dump.starts_with("0x0400: 41 ?? -- --"), "{}", dump);
        assert!(dump.trim_end().ends_with("|A...|"), "{}", dump);
    }

    #[test]
    fn prop_write_read_free_roundtrip() {
        fn property(size: u8, offset: u8, value: i32) -> TestResult {
            if size == 0 || offset >= size {
                return TestResult::discard();
            }
            let mut arena = Arena::new(2048);
            let start = arena.allocate(size as usize, "INTEGER").unwrap();
            let address = start + offset as Address;
            let v = Value::Number(value as f64);

            arena.write(address, v.clone()).unwrap();
            if arena.read(address) != Ok(v) {
                return TestResult::failed();
            }
            arena.free(start).unwrap();
            TestResult::from_bool(arena.read(address) == Err(MemoryFault::NotAllocated(address)))
        }

        let mut qc = quickcheck::QuickCheck::new().tests(50);
        qc.quickcheck(property as fn(u8, u8, i32) -> TestResult);
    }
}

//! Pseudocode execution engine
//!
//! This module provides the tree-walking evaluator:
//! - [`engine`]: the [`Interpreter`], its configuration and statement dispatch
//! - [`errors`]: runtime error types
//! - [`host`]: the boundary to whoever drives a run (output, input, stepping)
//! - [`files`]: in-memory file buffers
//!
//! # Execution Model
//!
//! The interpreter walks the AST and executes statements one at a time against
//! a chain of scopes. Top-level code and procedure bodies run with access to
//! the [`Host`]; function bodies run without it and therefore cannot perform
//! I/O or pause. Loop iterations and call depth are bounded by
//! [`InterpreterConfig`].
//!
//! Most of the evaluator is written as `impl Interpreter` blocks spread over
//! the submodules below.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod files;
pub mod host;
pub mod loops;
pub mod memory_ops;
pub mod ops;
pub mod statements;

pub use engine::{Interpreter, InterpreterConfig};
pub use errors::RuntimeError;
pub use host::{BufferedHost, CancelToken, Host, RunOutcome, StepControl};

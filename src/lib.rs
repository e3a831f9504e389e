//! # Introduction
//!
//! pseudomem parses and executes Cambridge-style pseudocode extended with an
//! explicit memory model: pointers, `MALLOC`/`FREE`, address-of and
//! dereference. Every memory-affecting action is recorded in an operation
//! trace so that a front end can visualise what the program did to memory.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Interpreter → Host (output, input, steps)
//!                                      ↓
//!                               Arena + Tracer
//! ```
//!
//! 1. [`parser`] tokenises the source and builds an AST.
//! 2. [`interpreter`] walks the AST against a chain of scopes, calling the
//!    [`Host`](interpreter::Host) for output, input and debug steps.
//! 3. [`memory`] holds the runtime values, scopes and the simulated
//!    [`Arena`](memory::arena::Arena).
//! 4. [`trace`] is the append-only operation log.
//! 5. [`snapshot`] describes debug snapshots and the output transcript.
//!
//! ## Example
//!
//! ```
//! use pseudomem::interpreter::{BufferedHost, InterpreterConfig};
//!
//! let source = "DECLARE x : INTEGER\nx ← 6 * 7\nOUTPUT \"x = \", x\n";
//! let mut host = BufferedHost::new();
//! pseudomem::run_source(source, InterpreterConfig::default(), &mut host).unwrap();
//! assert_eq!(host.outputs(), vec!["x = 42"]);
//! ```

pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod snapshot;
pub mod trace;

use interpreter::{Host, Interpreter, InterpreterConfig, RunOutcome, RuntimeError};
use parser::SyntaxError;
use thiserror::Error;

/// Any failure of a whole parse-and-run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    /// Source line the error is attributed to
    pub fn line(&self) -> usize {
        match self {
            Error::Syntax(e) => e.line(),
            Error::Runtime(e) => e.line(),
        }
    }
}

/// Parse and run `source` in one go.
///
/// Use [`Interpreter`] directly to inspect the arena or trace afterwards.
pub fn run_source(
    source: &str,
    config: InterpreterConfig,
    host: &mut dyn Host,
) -> Result<RunOutcome, Error> {
    let program = parser::parse(source)?;
    let mut interpreter = Interpreter::new(program, config);
    Ok(interpreter.run(host)?)
}

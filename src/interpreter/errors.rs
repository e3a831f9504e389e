//! Runtime error types for the pseudocode interpreter
//!
//! This module defines [`RuntimeError`], which represents all errors that can occur
//! during program execution (as opposed to syntax errors).
//!
//! All runtime errors are fatal - they halt execution and propagate out of
//! [`Interpreter::run`](crate::interpreter::engine::Interpreter::run). Arena and
//! trace state collected before the failure stays readable on the interpreter.

use crate::memory::arena::MemoryFault;
use crate::parser::ast::DataType;
use thiserror::Error;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Type error at line {line}: {message}")]
    TypeMismatch { message: String, line: usize },

    #[error("{operation} by zero at line {line}")]
    DivisionByZero {
        operation: &'static str,
        line: usize,
    },

    #[error("Index {index} out of bounds for '{name}' ({lower}:{upper}) at line {line}")]
    IndexOutOfBounds {
        name: String,
        index: i64,
        lower: i64,
        upper: i64,
        line: usize,
    },

    #[error("Variable '{name}' used before being assigned a value at line {line}")]
    UninitializedRead { name: String, line: usize },

    #[error("Undeclared identifier '{name}' at line {line}")]
    UndefinedVariable { name: String, line: usize },

    #[error("Undefined procedure or function '{name}' at line {line}")]
    UndefinedCallable { name: String, line: usize },

    #[error(
        "'{name}' expects {expected} argument{}, got {got} at line {line}",
        plural(.expected)
    )]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        line: usize,
    },

    #[error("Possible infinite loop: exceeded {limit} iterations at line {line}")]
    IterationLimit { limit: u64, line: usize },

    #[error("Maximum recursion depth ({limit}) exceeded calling '{name}' at line {line}")]
    RecursionLimit {
        name: String,
        limit: usize,
        line: usize,
    },

    #[error("Memory error at line {line}: {fault}")]
    Memory { fault: MemoryFault, line: usize },

    #[error("Cannot assign to constant '{name}' at line {line}")]
    ConstantAssignment { name: String, line: usize },

    #[error("FOR loop STEP cannot be 0 at line {line}")]
    ZeroStep { line: usize },

    #[error("{statement} is not allowed inside a FUNCTION (line {line})")]
    IllegalInFunction {
        statement: &'static str,
        line: usize,
    },

    #[error("File error at line {line}: {message}")]
    File { message: String, line: usize },

    #[error("'{name}' is already declared in this scope at line {line}")]
    Redeclaration { name: String, line: usize },

    #[error("Invalid argument at line {line}: {message}")]
    InvalidArgument { message: String, line: usize },

    #[error("FUNCTION '{name}' ended without RETURN at line {line}")]
    MissingReturn { name: String, line: usize },

    #[error("Input '{input}' is not a valid {expected} for '{name}' at line {line}")]
    InvalidInput {
        name: String,
        input: String,
        expected: DataType,
        line: usize,
    },

    #[error("This interpreter has already run its program; create a new one to run again")]
    AlreadyRun,
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

impl RuntimeError {
    /// Source line the error is attributed to (0 when no statement was running)
    pub fn line(&self) -> usize {
        match self {
            RuntimeError::TypeMismatch { line, .. }
            | RuntimeError::DivisionByZero { line, .. }
            | RuntimeError::IndexOutOfBounds { line, .. }
            | RuntimeError::UninitializedRead { line, .. }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::UndefinedCallable { line, .. }
            | RuntimeError::ArgumentCountMismatch { line, .. }
            | RuntimeError::IterationLimit { line, .. }
            | RuntimeError::RecursionLimit { line, .. }
            | RuntimeError::Memory { line, .. }
            | RuntimeError::ConstantAssignment { line, .. }
            | RuntimeError::ZeroStep { line }
            | RuntimeError::IllegalInFunction { line, .. }
            | RuntimeError::File { line, .. }
            | RuntimeError::Redeclaration { line, .. }
            | RuntimeError::InvalidArgument { line, .. }
            | RuntimeError::MissingReturn { line, .. }
            | RuntimeError::InvalidInput { line, .. } => *line,
            RuntimeError::AlreadyRun => 0,
        }
    }

    /// Whether this is an arena fault (invalid free, out-of-bounds, not allocated, ...)
    pub fn is_memory_fault(&self) -> bool {
        matches!(self, RuntimeError::Memory { .. })
    }

    pub fn memory_fault(&self) -> Option<&MemoryFault> {
        match self {
            RuntimeError::Memory { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>, line: usize) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
            line,
        }
    }

    pub(crate) fn memory(fault: MemoryFault, line: usize) -> Self {
        RuntimeError::Memory { fault, line }
    }
}

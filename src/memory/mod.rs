//! Memory model for the pseudocode interpreter
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation (Number, Text, Boolean, Array, Address)
//! - [`scope`]: Scopes, shared variable cells and the call stack
//! - [`arena`]: The simulated address space with allocate/free/read/write
//!
//! # Type Sizes
//!
//! Sizes are counted in arena slots and are fixed:
//! - `INTEGER`: 4
//! - `REAL`: 8
//! - `CHAR`, `BOOLEAN`: 1
//! - `STRING`: 256
//! - pointer: 4 (regardless of target type)
//! - array: element size × element count
//!
//! # Pointer Arithmetic
//!
//! Offsets are in slots and are not scaled by the target size:
//! ```text
//! p + n  →  p + n
//! p - q  →  number of slots between them
//! ```

pub mod arena;
pub mod scope;
pub mod value;

use crate::parser::ast::DataType;

/// Size of a type in arena slots
pub fn sizeof_type(t: &DataType) -> usize {
    match t {
        DataType::Integer => 4,
        DataType::Real => 8,
        DataType::Char | DataType::Boolean => 1,
        DataType::String => 256,
        DataType::Pointer(_) => 4,
        DataType::Array { dims, element } => dims
            .iter()
            .fold(sizeof_type(element), |size, b| size.saturating_mul(b.len())),
    }
}

//! Runtime value representation
//!
//! This module defines the [`Value`] enum, which represents all possible runtime values
//! of a pseudocode program. Values are tagged; every declared data type maps onto
//! exactly one variant:
//!
//! - [`Value::Number`]: `INTEGER` and `REAL`
//! - [`Value::Text`]: `STRING` and `CHAR` (a one-character string)
//! - [`Value::Boolean`]: `BOOLEAN`
//! - [`Value::Array`]: `ARRAY[...] OF T`
//! - [`Value::Address`]: `POINTER TO T` (`NULL` is address 0)
//!
//! # Initialization Tracking
//!
//! Values never carry an "uninitialized" marker of their own. A variable or array
//! element that was never assigned holds `None`, which lets the evaluator report
//! reads-before-write precisely.

use crate::interpreter::constants::MAX_ARRAY_CELLS;
use crate::parser::ast::{Bounds, DataType};
use std::fmt;

/// Simulated memory address
pub type Address = u64;

/// The null address
pub const NULL_ADDRESS: Address = 0;

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Array(ArrayValue),
    Address(Address),
}

impl Value {
    pub fn null() -> Self {
        Value::Address(NULL_ADDRESS)
    }

    /// Name used in type error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Array(_) => "array",
            Value::Address(_) => "pointer",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Address(NULL_ADDRESS))
    }

    /// Numeric view used by CASE ranges and mixed comparisons: numbers as-is,
    /// text parsed as a number, addresses as their integer value.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Address(a) => Some(*a as f64),
            _ => None,
        }
    }

    /// Check a value against a declared type, returning the value to store.
    ///
    /// `INTEGER` only accepts whole numbers and `CHAR` only single characters.
    /// Arrays must agree on shape.
    pub fn conform_to(self, data_type: &DataType) -> Result<Value, Value> {
        match (data_type, self) {
            (DataType::Integer, Value::Number(n)) if n.fract() == 0.0 => Ok(Value::Number(n)),
            (DataType::Real, Value::Number(n)) => Ok(Value::Number(n)),
            (DataType::String, Value::Text(s)) => Ok(Value::Text(s)),
            (DataType::Char, Value::Text(s)) if s.chars().count() == 1 => Ok(Value::Text(s)),
            (DataType::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(b)),
            (DataType::Pointer(_), Value::Address(a)) => Ok(Value::Address(a)),
            (DataType::Array { dims, .. }, Value::Array(array))
                if dims.is_empty() || array.same_shape(dims) =>
            {
                Ok(Value::Array(array))
            }
            (_, other) => Err(other),
        }
    }
}

/// Render a number the way OUTPUT prints it: whole numbers without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Address(NULL_ADDRESS) => write!(f, "NULL"),
            Value::Address(a) => write!(f, "0x{:04x}", a),
            Value::Array(array) => write!(f, "{}", array),
        }
    }
}

/// An index that fell outside its dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFault {
    pub index: i64,
    pub bounds: Bounds,
}

/// A fixed-shape array. Elements are stored row-major; `None` marks an element
/// that has never been assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub dims: Vec<Bounds>,
    pub element: DataType,
    cells: Vec<Option<Value>>,
}

/// Total element count of a shape, or `None` if the product overflows
pub fn cell_count(dims: &[Bounds]) -> Option<usize> {
    dims.iter()
        .try_fold(1usize, |count, bounds| count.checked_mul(bounds.len()))
}

impl ArrayValue {
    /// A fresh array with every element unassigned. `None` when the shape
    /// holds more than [`MAX_ARRAY_CELLS`] elements.
    pub fn new(dims: Vec<Bounds>, element: DataType) -> Option<Self> {
        let count = cell_count(&dims).filter(|&count| count <= MAX_ARRAY_CELLS)?;
        Some(ArrayValue {
            dims,
            element,
            cells: vec![None; count],
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn same_shape(&self, dims: &[Bounds]) -> bool {
        self.dims == dims
    }

    /// Row-major offset of an index tuple. The caller checks the tuple length.
    pub fn offset(&self, indices: &[i64]) -> Result<usize, IndexFault> {
        let mut offset = 0usize;
        for (&index, bounds) in indices.iter().zip(&self.dims) {
            if !bounds.contains(index) {
                return Err(IndexFault {
                    index,
                    bounds: *bounds,
                });
            }
            offset = offset * bounds.len() + (index - bounds.lower) as usize;
        }
        Ok(offset)
    }

    pub fn get(&self, offset: usize) -> Option<&Value> {
        self.cells.get(offset).and_then(Option::as_ref)
    }

    pub fn set(&mut self, offset: usize, value: Value) {
        if let Some(cell) = self.cells.get_mut(offset) {
            *cell = Some(value);
        }
    }

    /// Number of elements that have been assigned
    pub fn initialized_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn cells(&self) -> &[Option<Value>] {
        &self.cells
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match cell {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

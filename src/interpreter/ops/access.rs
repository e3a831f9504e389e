//! Array element access and static types of assignment targets

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{ArrayValue, Value};
use crate::parser::ast::{DataType, Expr};
use crate::trace::{OperationKind, TraceDetails};

impl Interpreter {
    /// Evaluate array indices; each must be a whole number
    pub(crate) fn evaluate_indices(
        &mut self,
        indices: &[Expr],
        line: usize,
    ) -> Result<Vec<i64>, RuntimeError> {
        indices
            .iter()
            .map(|expr| match self.evaluate(expr)? {
                Value::Number(n) if n.fract() == 0.0 => Ok(n as i64),
                Value::Number(n) => Err(RuntimeError::type_mismatch(
                    format!("array index must be a whole number, got {}", n),
                    line,
                )),
                other => Err(RuntimeError::type_mismatch(
                    format!("array index must be a number, got a {}", other.type_name()),
                    line,
                )),
            })
            .collect()
    }

    pub(crate) fn read_element(
        &mut self,
        name: &str,
        indices: &[Expr],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        // Indices first: they may read the same array
        let indices = self.evaluate_indices(indices, line)?;
        let var = self.lookup_variable(name, line)?;
        let var = var.borrow();

        let Some(Value::Array(array)) = &var.value else {
            return Err(not_an_array(name, line));
        };
        let offset = element_offset(name, array, &indices, line)?;
        let label = element_label(name, &indices);
        let value = array
            .get(offset)
            .cloned()
            .ok_or_else(|| RuntimeError::UninitializedRead {
                name: label.clone(),
                line,
            })?;

        self.tracer.add_entry(
            OperationKind::Read,
            line,
            TraceDetails::new().variable(label).value(&value),
        );
        Ok(value)
    }

    /// Declared type of an assignment target: variable, array element or `*p`
    pub(crate) fn target_type(&self, target: &Expr, line: usize) -> Result<DataType, RuntimeError> {
        match target {
            Expr::Identifier(name, _) => {
                let var = self.lookup_variable(name, line)?;
                let data_type = var.borrow().data_type.clone();
                Ok(data_type)
            }
            Expr::ArrayAccess { name, .. } => {
                let var = self.lookup_variable(name, line)?;
                let data_type = var.borrow().data_type.clone();
                match data_type {
                    DataType::Array { element, .. } => Ok(*element),
                    _ => Err(not_an_array(name, line)),
                }
            }
            Expr::Dereference { operand, .. } => match self.target_type(operand, line)? {
                DataType::Pointer(target) => Ok(*target),
                other => Err(RuntimeError::type_mismatch(
                    format!("cannot dereference a {}", other),
                    line,
                )),
            },
            _ => Err(RuntimeError::type_mismatch(
                "only variables, array elements and dereferenced pointers can be assigned",
                line,
            )),
        }
    }
}

/// Row-major offset for `indices`, checking dimension count and bounds
pub(crate) fn element_offset(
    name: &str,
    array: &ArrayValue,
    indices: &[i64],
    line: usize,
) -> Result<usize, RuntimeError> {
    if indices.len() != array.dims.len() {
        return Err(RuntimeError::type_mismatch(
            format!(
                "'{}' has {} dimension(s) but {} index(es) were given",
                name,
                array.dims.len(),
                indices.len()
            ),
            line,
        ));
    }
    array
        .offset(indices)
        .map_err(|fault| RuntimeError::IndexOutOfBounds {
            name: name.to_string(),
            index: fault.index,
            lower: fault.bounds.lower,
            upper: fault.bounds.upper,
            line,
        })
}

/// `A[2, 3]`
pub(crate) fn element_label(name: &str, indices: &[i64]) -> String {
    let indices: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
    format!("{}[{}]", name, indices.join(", "))
}

pub(crate) fn not_an_array(name: &str, line: usize) -> RuntimeError {
    RuntimeError::type_mismatch(format!("'{}' is not an array", name), line)
}

//! Assignment to variables, array elements and dereferenced pointers
//!
//! The value is always evaluated before the target is resolved. A variable
//! whose address has been taken is mirrored in the arena, so every store to it
//! (by name or through a pointer) updates both copies.

use super::access::{element_label, element_offset, not_an_array};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::arena::MemoryFault;
use crate::memory::value::{Address, Value, NULL_ADDRESS};
use crate::parser::ast::{DataType, Expr};
use crate::trace::{OperationKind, TraceDetails};

impl Interpreter {
    pub(crate) fn assign(&mut self, target: &Expr, value: Value, line: usize) -> Result<(), RuntimeError> {
        match target {
            Expr::Identifier(name, _) => self.assign_variable(name, value, line),
            Expr::ArrayAccess { name, indices, .. } => {
                self.assign_element(name, indices, value, line)
            }
            Expr::Dereference { operand, .. } => self.assign_through_pointer(operand, value, line),
            _ => Err(RuntimeError::type_mismatch(
                "only variables, array elements and dereferenced pointers can be assigned",
                line,
            )),
        }
    }

    pub(crate) fn assign_variable(
        &mut self,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let var = self.lookup_variable(name, line)?;
        let (data_type, constant, address) = {
            let var = var.borrow();
            (var.data_type.clone(), var.constant, var.address)
        };

        if constant {
            return Err(RuntimeError::ConstantAssignment {
                name: name.to_string(),
                line,
            });
        }

        let value = conform(value, &data_type, name, line)?;
        let old = var.borrow_mut().value.replace(value.clone());
        if let Some(address) = address {
            self.arena
                .write(address, value.clone())
                .map_err(|fault| RuntimeError::memory(fault, line))?;
        }

        self.trace_store(name, &data_type, &value, address, old, line);
        Ok(())
    }

    fn assign_element(
        &mut self,
        name: &str,
        indices: &[Expr],
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let indices = self.evaluate_indices(indices, line)?;
        let var = self.lookup_variable(name, line)?;
        let label = element_label(name, &indices);

        let (element_type, value, old) = {
            let mut var = var.borrow_mut();
            if var.constant {
                return Err(RuntimeError::ConstantAssignment {
                    name: name.to_string(),
                    line,
                });
            }
            let Some(Value::Array(array)) = &mut var.value else {
                return Err(not_an_array(name, line));
            };
            let offset = element_offset(name, array, &indices, line)?;
            let element_type = array.element.clone();
            let value = conform(value, &element_type, &label, line)?;
            let old = array.get(offset).cloned();
            array.set(offset, value.clone());
            (element_type, value, old)
        };

        self.trace_store(&label, &element_type, &value, None, old, line);
        Ok(())
    }

    fn assign_through_pointer(
        &mut self,
        pointer: &Expr,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let address = match self.evaluate(pointer)? {
            Value::Address(NULL_ADDRESS) => {
                return Err(RuntimeError::memory(MemoryFault::NullDereference, line))
            }
            Value::Address(address) => address,
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("cannot dereference a {}", other.type_name()),
                    line,
                ))
            }
        };

        // A bound variable keeps its own copy in sync with the arena
        let value = match self.bound.get(&address).cloned() {
            Some(var) => {
                let (data_type, constant) = {
                    let var = var.borrow();
                    (var.data_type.clone(), var.constant)
                };
                let label = format!("*0x{:04x}", address);
                if constant {
                    return Err(RuntimeError::ConstantAssignment { name: label, line });
                }
                let value = conform(value, &data_type, &label, line)?;
                var.borrow_mut().value = Some(value.clone());
                value
            }
            None => value,
        };

        let old = self
            .arena
            .write(address, value.clone())
            .map_err(|fault| RuntimeError::memory(fault, line))?;

        self.tracer.add_entry(
            OperationKind::Dereference,
            line,
            TraceDetails::new().address(address),
        );
        let mut details = TraceDetails::new().address(address).value(&value);
        if let Some(old) = old {
            details = details.metadata(format!("old: {}", old));
        }
        self.tracer.add_entry(OperationKind::Write, line, details);
        Ok(())
    }

    /// Record a store to a named location
    fn trace_store(
        &mut self,
        label: &str,
        data_type: &DataType,
        value: &Value,
        address: Option<Address>,
        old: Option<Value>,
        line: usize,
    ) {
        let details = if data_type.is_pointer() {
            let mut details = TraceDetails::new()
                .variable(label)
                .address(value.as_address().unwrap_or(NULL_ADDRESS))
                .value(value);
            if let Some(own) = address {
                details = details.pointer_address(own);
            }
            details
        } else {
            let mut details = TraceDetails::new().variable(label).value(value);
            if let Some(address) = address {
                details = details.address(address);
            }
            details
        };

        let details = match old {
            Some(old) if !matches!(old, Value::Array(_)) => details.metadata(format!("old: {}", old)),
            _ => details,
        };

        let kind = if data_type.is_pointer() {
            OperationKind::PointerAssign
        } else {
            OperationKind::Write
        };
        self.tracer.add_entry(kind, line, details);
    }
}

/// Check a value against the declared type of `name`
fn conform(value: Value, data_type: &DataType, name: &str, line: usize) -> Result<Value, RuntimeError> {
    value.conform_to(data_type).map_err(|value| {
        let detail = match (&value, data_type) {
            (Value::Number(n), DataType::Integer) => format!("{} is not a whole number", n),
            _ => format!("a {} does not fit", value.type_name()),
        };
        RuntimeError::type_mismatch(
            format!("cannot assign to '{}' : {}: {}", name, data_type, detail),
            line,
        )
    })
}

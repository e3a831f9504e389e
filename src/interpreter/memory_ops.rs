//! Memory operations: `&x`, `*p`, `MALLOC`, `FREE` and scope release
//!
//! # Variable binding
//!
//! Variables live in scopes, not in the arena. Taking a variable's address with
//! `&` lazily allocates `SIZE_OF(type)` slots for it, copies its current value
//! there, and records the address in the interpreter's bound map. From then on
//! writes by name and writes through a pointer keep both copies equal. When the
//! scope that declared the variable ends, the slots are freed again.
//!
//! A bound block belongs to its variable: `FREE` on it is an invalid free.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::arena::MemoryFault;
use crate::memory::scope::{Scope, ScopeId, VarRef};
use crate::memory::sizeof_type;
use crate::memory::value::{Address, Value, NULL_ADDRESS};
use crate::parser::ast::{DataType, Expr};
use crate::trace::{OperationKind, TraceDetails};
use std::rc::Rc;

impl Interpreter {
    /// `&operand`. Only variables have addresses; `&*p` is `p`.
    pub(crate) fn address_of(&mut self, operand: &Expr, line: usize) -> Result<Address, RuntimeError> {
        match operand {
            Expr::Identifier(name, _) => self.bind_variable_address(name, line),
            Expr::Dereference { operand, .. } => match self.evaluate(operand)? {
                Value::Address(address) => Ok(address),
                other => Err(RuntimeError::type_mismatch(
                    format!("cannot dereference a {}", other.type_name()),
                    line,
                )),
            },
            _ => Err(RuntimeError::type_mismatch(
                "'&' can only be applied to a variable",
                line,
            )),
        }
    }

    fn bind_variable_address(&mut self, name: &str, line: usize) -> Result<Address, RuntimeError> {
        let var = self.lookup_variable(name, line)?;

        let existing = var.borrow().address;
        let address = match existing {
            Some(address) => address,
            None => self.allocate_for_variable(name, &var, line)?,
        };

        self.tracer.add_entry(
            OperationKind::AddressOf,
            line,
            TraceDetails::new().variable(name).address(address),
        );
        Ok(address)
    }

    fn allocate_for_variable(
        &mut self,
        name: &str,
        var: &VarRef,
        line: usize,
    ) -> Result<Address, RuntimeError> {
        let (data_type, value) = {
            let var = var.borrow();
            (var.data_type.clone(), var.value.clone())
        };
        if data_type.is_array() {
            return Err(RuntimeError::type_mismatch(
                format!("cannot take the address of array '{}'", name),
                line,
            ));
        }

        let size = sizeof_type(&data_type);
        let address = self
            .arena
            .allocate(size, &data_type.to_string())
            .map_err(|fault| RuntimeError::memory(fault, line))?;
        if let Some(value) = value {
            self.arena
                .write(address, value)
                .map_err(|fault| RuntimeError::memory(fault, line))?;
        }

        var.borrow_mut().address = Some(address);
        self.bound.insert(address, Rc::clone(var));
        log::debug!("bound '{}' ({}) to 0x{:04x}", name, data_type, address);

        self.tracer.add_entry(
            OperationKind::Allocate,
            line,
            TraceDetails::new()
                .variable(name)
                .address(address)
                .metadata(format!("{} slot(s) for {}", size, data_type)),
        );
        Ok(address)
    }

    /// `*operand` as a value
    pub(crate) fn dereference(&mut self, operand: &Expr, line: usize) -> Result<Value, RuntimeError> {
        let address = match self.evaluate(operand)? {
            Value::Address(address) => address,
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("cannot dereference a {}", other.type_name()),
                    line,
                ))
            }
        };

        let value = self
            .arena
            .read(address)
            .map_err(|fault| RuntimeError::memory(fault, line))?;

        self.tracer.add_entry(
            OperationKind::Dereference,
            line,
            TraceDetails::new().address(address),
        );
        self.tracer.add_entry(
            OperationKind::Read,
            line,
            TraceDetails::new().address(address).value(&value),
        );
        Ok(value)
    }

    /// `MALLOC(size)` / `MALLOC(size, TYPE)`: `size` slots, tagged with the type
    pub(crate) fn evaluate_malloc(
        &mut self,
        size: &Expr,
        element_type: Option<&DataType>,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let size = self.evaluate_number(size, "MALLOC size", line)?;
        if size.fract() != 0.0 || size < 1.0 {
            return Err(RuntimeError::memory(MemoryFault::InvalidSize(size as i64), line));
        }
        if size > self.arena.size() as f64 {
            let fault = MemoryFault::OutOfMemory {
                requested: size as usize,
            };
            return Err(RuntimeError::memory(fault, line));
        }
        let size = size as usize;

        let tag = element_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "BLOCK".to_string());
        let address = self
            .arena
            .allocate(size, &tag)
            .map_err(|fault| RuntimeError::memory(fault, line))?;

        self.tracer.add_entry(
            OperationKind::Allocate,
            line,
            TraceDetails::new()
                .address(address)
                .metadata(format!("MALLOC {} slot(s) of {}", size, tag)),
        );
        Ok(Value::Address(address))
    }

    pub(crate) fn execute_free(&mut self, pointer: &Expr, line: usize) -> Result<(), RuntimeError> {
        let address = match self.evaluate(pointer)? {
            Value::Address(address) => address,
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("FREE needs a pointer, got a {}", other.type_name()),
                    line,
                ))
            }
        };

        if address == NULL_ADDRESS || self.bound.contains_key(&address) {
            return Err(RuntimeError::memory(MemoryFault::InvalidFree(address), line));
        }

        let allocation = self
            .arena
            .free(address)
            .map_err(|fault| RuntimeError::memory(fault, line))?;

        self.tracer.add_entry(
            OperationKind::Free,
            line,
            TraceDetails::new()
                .address(address)
                .metadata(format!("{} slot(s) of {}", allocation.size, allocation.type_tag)),
        );
        Ok(())
    }

    /// Free the arena slots of variables declared in an ending scope.
    /// BYREF aliases belong to the caller's scope and are left alone.
    pub(crate) fn release_scope(
        &mut self,
        id: ScopeId,
        scope: &Scope,
        line: usize,
    ) -> Result<(), RuntimeError> {
        for (name, var) in scope.iter() {
            let address = {
                let var = var.borrow();
                if var.owner != id {
                    continue;
                }
                var.address
            };
            let Some(address) = address else {
                continue;
            };

            self.bound.remove(&address);
            var.borrow_mut().address = None;
            self.arena
                .free(address)
                .map_err(|fault| RuntimeError::memory(fault, line))?;

            self.tracer.add_entry(
                OperationKind::Free,
                line,
                TraceDetails::new()
                    .variable(name.as_str())
                    .address(address)
                    .metadata("end of scope"),
            );
        }
        Ok(())
    }
}

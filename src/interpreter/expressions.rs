//! Expression evaluation implementation
//!
//! This module handles evaluation of all expression kinds:
//!
//! - Literals, identifiers and array elements
//! - Binary and unary operators (see [`ops`](super::ops))
//! - Function calls, user-defined and built-in
//! - Memory expressions: `&x`, `*p`, `MALLOC`, `SIZE_OF`
//! - `EOF(f)`
//!
//! Expression evaluation never suspends: it has no access to the host.
//! Every read of a variable or array element is recorded in the trace.

use crate::interpreter::constants::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::sizeof_type;
use crate::memory::value::Value;
use crate::parser::ast::*;
use crate::trace::{OperationKind, TraceDetails};

impl Interpreter {
    /// Evaluate an expression and return its value
    pub(crate) fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let line = expr.line();

        match expr {
            Expr::Literal(literal, _) => Ok(literal_value(literal)),

            Expr::Identifier(name, _) => self.read_variable(name, line),

            Expr::ArrayAccess { name, indices, .. } => self.read_element(name, indices, line),

            Expr::BinaryOp {
                op, left, right, ..
            } => self.evaluate_binary(*op, left, right, line),

            Expr::UnaryOp { op, operand, .. } => self.evaluate_unary(*op, operand, line),

            Expr::FunctionCall { name, args, .. } => self.evaluate_call(name, args, line),

            Expr::AddressOf { operand, .. } => self.address_of(operand, line).map(Value::Address),

            Expr::Dereference { operand, .. } => self.dereference(operand, line),

            Expr::MemoryAllocation {
                size, element_type, ..
            } => self.evaluate_malloc(size, element_type.as_ref(), line),

            Expr::SizeOf { target_type, .. } => Ok(Value::Number(sizeof_type(target_type) as f64)),

            Expr::Eof { file, .. } => self.evaluate_eof(file, line),
        }
    }

    /// Evaluate a condition that must be BOOLEAN
    pub(crate) fn evaluate_condition(
        &mut self,
        expr: &Expr,
        construct: &str,
        line: usize,
    ) -> Result<bool, RuntimeError> {
        match self.evaluate(expr)? {
            Value::Boolean(b) => Ok(b),
            other => Err(RuntimeError::type_mismatch(
                format!("{} condition must be BOOLEAN, got a {}", construct, other.type_name()),
                line,
            )),
        }
    }

    /// Evaluate an expression that must produce a number
    pub(crate) fn evaluate_number(
        &mut self,
        expr: &Expr,
        what: &str,
        line: usize,
    ) -> Result<f64, RuntimeError> {
        match self.evaluate(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(RuntimeError::type_mismatch(
                format!("{} must be a number, got a {}", what, other.type_name()),
                line,
            )),
        }
    }

    fn read_variable(&mut self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        let var = self.lookup_variable(name, line)?;
        let var = var.borrow();
        let value = var
            .value
            .clone()
            .ok_or_else(|| RuntimeError::UninitializedRead {
                name: name.to_string(),
                line,
            })?;

        let mut details = TraceDetails::new().variable(name);
        if let Some(address) = var.address {
            details = details.address(address);
        }
        if !matches!(value, Value::Array(_)) {
            details = details.value(&value);
        }
        self.tracer.add_entry(OperationKind::Read, line, details);
        Ok(value)
    }

    /// Resolution order: user FUNCTION, built-in, then a PROCEDURE used as a value
    fn evaluate_call(&mut self, name: &str, args: &[Expr], line: usize) -> Result<Value, RuntimeError> {
        if let Some(def) = self.callables.get(name).cloned() {
            if def.is_function() {
                return self.call_function(&def, args, line);
            }
        }

        if super::builtins::is_builtin(name) {
            return self.call_builtin(name, args, line);
        }

        if self.callables.contains_key(name) {
            return Err(RuntimeError::type_mismatch(
                format!("'{}' is a PROCEDURE and does not return a value; use CALL", name),
                line,
            ));
        }

        Err(RuntimeError::UndefinedCallable {
            name: name.to_string(),
            line,
        })
    }
}

/// Runtime value of a source literal
pub(crate) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::Text(s.clone()),
        Literal::Char(c) => Value::Text(c.to_string()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::null(),
    }
}

//! Statement execution implementation
//!
//! This module handles the non-loop statement kinds:
//!
//! - `DECLARE` and `CONSTANT`
//! - `OUTPUT` and `INPUT`
//! - `IF` and `CASE`
//! - `CALL` and `RETURN`
//!
//! Loops live in [`loops`](super::loops), file statements in
//! [`files`](super::files) and `FREE` in [`memory_ops`](super::memory_ops).
//!
//! # Effects
//!
//! Statements that talk to the host take the current [`Effects`] and ask it
//! for the host with [`Effects::require_host`]. Inside a function body there is
//! no host, so those statements fail with `IllegalInFunction`.

use crate::interpreter::constants::MAX_ARRAY_CELLS;
use crate::interpreter::engine::{Flow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::expressions::literal_value;
use crate::interpreter::host::Effects;
use crate::interpreter::ops::binary::values_equal;
use crate::memory::scope::{var_ref, Variable};
use crate::memory::value::{ArrayValue, Value};
use crate::parser::ast::*;
use crate::snapshot::{OutputKind, OutputLine};
use crate::trace::{OperationKind, TraceDetails};

impl Interpreter {
    pub(crate) fn execute_declare(
        &mut self,
        name: &str,
        data_type: &DataType,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let scope = self.scopes.current();

        let value = match data_type {
            DataType::Array { dims, element } => {
                if dims.is_empty() || dims.iter().any(Bounds::is_empty) {
                    return Err(RuntimeError::InvalidArgument {
                        message: format!("array '{}' needs non-empty bounds", name),
                        line,
                    });
                }
                let array = ArrayValue::new(dims.clone(), (**element).clone()).ok_or_else(|| {
                    RuntimeError::InvalidArgument {
                        message: format!(
                            "array '{}' is larger than {} elements",
                            name, MAX_ARRAY_CELLS
                        ),
                        line,
                    }
                })?;
                Some(Value::Array(array))
            }
            _ => None,
        };

        let var = Variable {
            value,
            ..Variable::new(data_type.clone(), scope)
        };
        if !self.scopes.bind(scope, name, var_ref(var)) {
            return Err(RuntimeError::Redeclaration {
                name: name.to_string(),
                line,
            });
        }

        self.tracer.add_entry(
            OperationKind::Declare,
            line,
            TraceDetails::new()
                .variable(name)
                .metadata(data_type.to_string()),
        );
        Ok(())
    }

    pub(crate) fn execute_constant(
        &mut self,
        name: &str,
        value: &Expr,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let value = self.evaluate(value)?;
        let data_type = inferred_type(&value).ok_or_else(|| {
            RuntimeError::type_mismatch(format!("CONSTANT '{}' cannot hold an array", name), line)
        })?;

        let scope = self.scopes.current();
        let var = Variable {
            constant: true,
            ..Variable::with_value(data_type.clone(), value.clone(), scope)
        };
        if !self.scopes.bind(scope, name, var_ref(var)) {
            return Err(RuntimeError::Redeclaration {
                name: name.to_string(),
                line,
            });
        }

        self.tracer.add_entry(
            OperationKind::Declare,
            line,
            TraceDetails::new()
                .variable(name)
                .value(&value)
                .metadata(format!("CONSTANT {}", data_type)),
        );
        Ok(())
    }

    pub(crate) fn execute_output<E: Effects>(
        &mut self,
        items: &[Expr],
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let host = fx.require_host("OUTPUT", line)?;

        let mut text = String::new();
        for item in items {
            let value = self.evaluate(item)?;
            text.push_str(&value.to_string());
        }

        self.emit_line(
            host,
            OutputLine {
                kind: OutputKind::Output,
                text,
                line,
            },
        );
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_input<E: Effects>(
        &mut self,
        target: &Expr,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let host = fx.require_host("INPUT", line)?;
        let name = target_name(target);
        let data_type = self.target_type(target, line)?;

        let Some(raw) = host.request_input(&name, &data_type) else {
            log::info!("input for '{}' cancelled at line {}", name, line);
            return Ok(Flow::Halt);
        };

        let value = convert_input(&raw, &data_type).ok_or_else(|| RuntimeError::InvalidInput {
            name: name.clone(),
            input: raw.clone(),
            expected: data_type.clone(),
            line,
        })?;

        self.emit_line(
            host,
            OutputLine {
                kind: OutputKind::InputEcho,
                text: raw,
                line,
            },
        );
        self.assign(target, value, line)?;
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_if<E: Effects>(
        &mut self,
        condition: &Expr,
        then_branch: &[Statement],
        else_branch: Option<&[Statement]>,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        if self.evaluate_condition(condition, "IF", line)? {
            self.execute_block(then_branch, fx)
        } else if let Some(else_branch) = else_branch {
            self.execute_block(else_branch, fx)
        } else {
            Ok(Flow::Normal)
        }
    }

    /// Branches are tested top to bottom; the first match wins
    pub(crate) fn execute_case<E: Effects>(
        &mut self,
        subject: &Expr,
        branches: &[CaseBranch],
        otherwise: Option<&[Statement]>,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let subject = self.evaluate(subject)?;

        for branch in branches {
            if case_label_matches(&subject, &branch.label) {
                return self.execute_block(&branch.body, fx);
            }
        }

        match otherwise {
            Some(body) => self.execute_block(body, fx),
            None => Ok(Flow::Normal),
        }
    }

    pub(crate) fn execute_call<E: Effects>(
        &mut self,
        name: &str,
        args: &[Expr],
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let def = self.lookup_callable(name, line)?;
        if def.is_function() {
            return Err(RuntimeError::type_mismatch(
                format!("'{}' is a FUNCTION; use it in an expression instead of CALL", name),
                line,
            ));
        }
        self.call_procedure(&def, args, line, fx)
    }

    pub(crate) fn execute_return(
        &mut self,
        value: Option<&Expr>,
        line: usize,
    ) -> Result<Flow, RuntimeError> {
        if self.call_stack.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                message: "RETURN outside of a PROCEDURE or FUNCTION".to_string(),
                line,
            });
        }
        let value = value.map(|expr| self.evaluate(expr)).transpose()?;
        Ok(Flow::Return(value))
    }
}

/// Declared type for a CONSTANT, from its value
fn inferred_type(value: &Value) -> Option<DataType> {
    match value {
        Value::Number(n) if n.fract() == 0.0 => Some(DataType::Integer),
        Value::Number(_) => Some(DataType::Real),
        Value::Text(_) => Some(DataType::String),
        Value::Boolean(_) => Some(DataType::Boolean),
        Value::Address(_) => Some(DataType::Pointer(Box::new(DataType::Integer))),
        Value::Array(_) => None,
    }
}

/// Whether a CASE label selects `subject`.
///
/// Value labels use `=` semantics. Range labels are inclusive numeric intervals;
/// when the subject and both bounds are non-numeric text they compare as strings.
fn case_label_matches(subject: &Value, label: &CaseLabel) -> bool {
    match label {
        CaseLabel::Value(literal) => values_equal(subject, &literal_value(literal)),
        CaseLabel::Range(low, high) => {
            let low = literal_value(low);
            let high = literal_value(high);

            if let (Some(s), Some(lo), Some(hi)) = (
                subject.coerce_number(),
                low.coerce_number(),
                high.coerce_number(),
            ) {
                return lo <= s && s <= hi;
            }
            match (subject, &low, &high) {
                (Value::Text(s), Value::Text(lo), Value::Text(hi)) => {
                    lo.as_str() <= s.as_str() && s.as_str() <= hi.as_str()
                }
                _ => false,
            }
        }
    }
}

/// Convert entered text according to the target's declared type
pub(crate) fn convert_input(raw: &str, data_type: &DataType) -> Option<Value> {
    match data_type {
        DataType::Integer => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(Value::Number),
        DataType::Real => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number),
        DataType::String => Some(Value::Text(raw.to_string())),
        DataType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Text(c.to_string())),
                _ => None,
            }
        }
        DataType::Boolean => {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("TRUE") {
                Some(Value::Boolean(true))
            } else if raw.eq_ignore_ascii_case("FALSE") {
                Some(Value::Boolean(false))
            } else {
                None
            }
        }
        DataType::Array { .. } | DataType::Pointer(_) => None,
    }
}

/// Display name of an assignment target, used for prompts and trace labels
pub(crate) fn target_name(target: &Expr) -> String {
    match target {
        Expr::Identifier(name, _) | Expr::ArrayAccess { name, .. } => name.clone(),
        Expr::Dereference { operand, .. } => format!("*{}", target_name(operand)),
        _ => "value".to_string(),
    }
}

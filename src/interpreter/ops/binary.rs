use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{Address, Value};
use crate::parser::ast::{BinOp, Expr};
use std::cmp::Ordering;

impl Interpreter {
    /// `AND` and `OR` short-circuit; every other operator evaluates both sides
    pub(crate) fn evaluate_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        if matches!(op, BinOp::And | BinOp::Or) {
            let l = self.logical_operand(op, left, line)?;
            match (op, l) {
                (BinOp::And, false) => return Ok(Value::Boolean(false)),
                (BinOp::Or, true) => return Ok(Value::Boolean(true)),
                _ => {}
            }
            let r = self.logical_operand(op, right, line)?;
            return Ok(Value::Boolean(r));
        }

        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        apply_binary(op, l, r, line)
    }

    fn logical_operand(&mut self, op: BinOp, expr: &Expr, line: usize) -> Result<bool, RuntimeError> {
        match self.evaluate(expr)? {
            Value::Boolean(b) => Ok(b),
            other => Err(RuntimeError::type_mismatch(
                format!("{} needs BOOLEAN operands, got a {}", op, other.type_name()),
                line,
            )),
        }
    }
}

/// Apply a non-logical binary operator to two evaluated operands
pub(crate) fn apply_binary(op: BinOp, l: Value, r: Value, line: usize) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Address(a), Value::Number(n)) | (Value::Number(n), Value::Address(a)) => {
                offset_address(*a, *n, line).map(Value::Address)
            }
            _ => Err(operand_mismatch(op, &l, &r, line)),
        },

        BinOp::Sub => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (Value::Address(a), Value::Number(n)) => offset_address(*a, -n, line).map(Value::Address),
            (Value::Address(a), Value::Address(b)) => Ok(Value::Number(*a as f64 - *b as f64)),
            _ => Err(operand_mismatch(op, &l, &r, line)),
        },

        BinOp::Mul => numeric(op, &l, &r, line).map(|(a, b)| Value::Number(a * b)),

        BinOp::Div => {
            let (a, b) = numeric(op, &l, &r, line)?;
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero {
                    operation: "Division",
                    line,
                });
            }
            Ok(Value::Number(a / b))
        }

        // DIV and MOD truncate toward zero
        BinOp::IntDiv => {
            let (a, b) = numeric(op, &l, &r, line)?;
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero {
                    operation: "DIV",
                    line,
                });
            }
            Ok(Value::Number((a / b).trunc()))
        }

        BinOp::Mod => {
            let (a, b) = numeric(op, &l, &r, line)?;
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero {
                    operation: "MOD",
                    line,
                });
            }
            Ok(Value::Number(a % b))
        }

        BinOp::Concat => {
            if matches!(l, Value::Array(_)) || matches!(r, Value::Array(_)) {
                return Err(operand_mismatch(op, &l, &r, line));
            }
            Ok(Value::Text(format!("{}{}", l, r)))
        }

        BinOp::Eq => Ok(Value::Boolean(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Boolean(!values_equal(&l, &r))),

        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare_values(&l, &r).ok_or_else(|| operand_mismatch(op, &l, &r, line))?;
            let result = match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Le => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }

        BinOp::And | BinOp::Or => match (&l, &r) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(if op == BinOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(operand_mismatch(op, &l, &r, line)),
        },
    }
}

/// `=` semantics. A number compared with text parses the text; any other
/// mix of kinds is simply unequal.
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Address(a), Value::Address(b)) => a == b,
        (Value::Number(n), Value::Text(s)) | (Value::Text(s), Value::Number(n)) => {
            s.trim().parse::<f64>().map(|parsed| parsed == *n).unwrap_or(false)
        }
        (Value::Array(a), Value::Array(b)) => a == b,
        _ => false,
    }
}

/// Ordering for `< <= > >=`; `None` when the kinds cannot be ordered
fn compare_values(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Address(a), Value::Address(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn numeric(op: BinOp, l: &Value, r: &Value, line: usize) -> Result<(f64, f64), RuntimeError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(operand_mismatch(op, l, r, line)),
    }
}

/// Pointer arithmetic: offsets are whole slots
fn offset_address(address: Address, offset: f64, line: usize) -> Result<Address, RuntimeError> {
    if offset.fract() != 0.0 {
        return Err(RuntimeError::type_mismatch(
            format!("pointer offset must be a whole number, got {}", offset),
            line,
        ));
    }
    // `as` saturates, so a huge offset still lands outside the address range
    i128::from(address)
        .checked_add(offset as i128)
        .and_then(|target| Address::try_from(target).ok())
        .ok_or_else(|| RuntimeError::InvalidArgument {
            message: format!(
                "pointer arithmetic outside the address space (0x{:04x} {:+})",
                address, offset
            ),
            line,
        })
}

fn operand_mismatch(op: BinOp, l: &Value, r: &Value, line: usize) -> RuntimeError {
    RuntimeError::type_mismatch(
        format!("cannot apply '{}' to {} and {}", op, l.type_name(), r.type_name()),
        line,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_div_and_mod_truncate() {
        assert_eq!(apply_binary(BinOp::IntDiv, num(7.0), num(2.0), 1), Ok(num(3.0)));
        assert_eq!(apply_binary(BinOp::IntDiv, num(-7.0), num(2.0), 1), Ok(num(-3.0)));
        assert_eq!(apply_binary(BinOp::Mod, num(-7.0), num(2.0), 1), Ok(num(-1.0)));
    }

    #[test]
    fn test_division_by_zero_names_operator() {
        let err = apply_binary(BinOp::Mod, num(1.0), num(0.0), 9).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::DivisionByZero {
                operation: "MOD",
                line: 9
            }
        );
    }

    #[test]
    fn test_concat_renders_any_scalar() {
        let joined = apply_binary(BinOp::Concat, Value::Text("n=".into()), num(4.0), 1);
        assert_eq!(joined, Ok(Value::Text("n=4".into())));
    }

    #[test]
    fn test_mixed_equality() {
        assert!(values_equal(&num(5.0), &Value::Text("5".into())));
        assert!(!values_equal(&num(5.0), &Value::Boolean(true)));
    }

    #[test]
    fn test_ordering_across_kinds_is_a_type_error() {
        let err = apply_binary(BinOp::Lt, num(1.0), Value::Text("a".into()), 3);
        assert!(matches!(err, Err(RuntimeError::TypeMismatch { line: 3, .. })));
    }

    #[test]
    fn test_pointer_arithmetic() {
        assert_eq!(
            apply_binary(BinOp::Add, Value::Address(1024), num(4.0), 1),
            Ok(Value::Address(1028))
        );
        assert_eq!(
            apply_binary(BinOp::Sub, Value::Address(1030), Value::Address(1024), 1),
            Ok(num(6.0))
        );
        assert!(apply_binary(BinOp::Add, Value::Address(1024), num(0.5), 1).is_err());
    }

    #[test]
    fn test_pointer_arithmetic_stays_in_the_address_space() {
        let outside = |result: Result<Value, RuntimeError>| {
            matches!(result, Err(RuntimeError::InvalidArgument { line: 2, .. }))
        };
        assert!(outside(apply_binary(BinOp::Sub, Value::Address(4), num(5.0), 2)));
        assert!(outside(apply_binary(BinOp::Add, Value::Address(u64::MAX), num(1.0), 2)));
        assert!(outside(apply_binary(BinOp::Add, Value::Address(1024), num(1e300), 2)));
        assert!(outside(apply_binary(BinOp::Sub, Value::Address(1024), num(1e300), 2)));
        assert!(outside(apply_binary(BinOp::Add, num(-1e19), Value::Address(1024), 2)));
        assert!(apply_binary(BinOp::Add, Value::Address(1024), num(f64::INFINITY), 2).is_err());
        assert!(apply_binary(BinOp::Add, Value::Address(1024), num(f64::NAN), 2).is_err());
        assert_eq!(
            apply_binary(BinOp::Add, Value::Address(u64::MAX - 1), num(1.0), 2),
            Ok(Value::Address(u64::MAX))
        );
    }
}

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::Value;
use crate::parser::ast::{Expr, UnOp};

impl Interpreter {
    pub(crate) fn evaluate_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let value = self.evaluate(operand)?;
        match (op, value) {
            (UnOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (UnOp::Neg, other) => Err(RuntimeError::type_mismatch(
                format!("cannot negate a {}", other.type_name()),
                line,
            )),
            (UnOp::Not, other) => Err(RuntimeError::type_mismatch(
                format!("NOT needs a BOOLEAN operand, got a {}", other.type_name()),
                line,
            )),
        }
    }
}

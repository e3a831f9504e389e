//! Built-in function implementations
//!
//! Pure functions callable from any expression, including function bodies.
//! A user-defined FUNCTION with the same name takes precedence.
//!
//! # Supported Built-ins
//!
//! - Strings: `LENGTH`, `LEFT`, `RIGHT`, `MID` (1-based), `UCASE`, `LCASE`
//! - Numbers: `INT` (truncates toward zero), `ROUND(x, places)`
//! - Conversion: `NUM_TO_STR`, `STR_TO_NUM`, `IS_NUM`, `ASC`, `CHR`
//! - Random: `RAND(x)` in `[0, x)`, `RANDOM()` in `[0, 1)`

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{format_number, Value};
use crate::parser::ast::Expr;
use rand::Rng;

const BUILTINS: &[&str] = &[
    "LENGTH",
    "LEFT",
    "RIGHT",
    "MID",
    "UCASE",
    "LCASE",
    "INT",
    "ROUND",
    "NUM_TO_STR",
    "STR_TO_NUM",
    "IS_NUM",
    "ASC",
    "CHR",
    "RAND",
    "RANDOM",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &mut self,
        name: &str,
        args: &[Expr],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let values = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;
        apply_builtin(name, &values, line)
    }
}

/// Evaluate a built-in on already-evaluated arguments
pub(crate) fn apply_builtin(name: &str, args: &[Value], line: usize) -> Result<Value, RuntimeError> {
    let call = Call { name, args, line };

    match name {
        "LENGTH" => {
            call.arity(1)?;
            Ok(Value::Number(call.text(0)?.chars().count() as f64))
        }
        "LEFT" => {
            call.arity(2)?;
            let s = call.text(0)?;
            let n = call.count(1, s.chars().count())?;
            Ok(Value::Text(s.chars().take(n).collect()))
        }
        "RIGHT" => {
            call.arity(2)?;
            let s = call.text(0)?;
            let len = s.chars().count();
            let n = call.count(1, len)?;
            Ok(Value::Text(s.chars().skip(len - n).collect()))
        }
        "MID" => {
            call.arity(3)?;
            let s = call.text(0)?;
            let len = s.chars().count();
            let start = call.whole(1)?;
            if start < 1 || start as usize > len.max(1) {
                return Err(call.invalid(format!("start {} is outside 1..{}", start, len)));
            }
            let start = start as usize - 1;
            let n = call.count(2, len - start)?;
            Ok(Value::Text(s.chars().skip(start).take(n).collect()))
        }
        "UCASE" => {
            call.arity(1)?;
            Ok(Value::Text(call.text(0)?.to_uppercase()))
        }
        "LCASE" => {
            call.arity(1)?;
            Ok(Value::Text(call.text(0)?.to_lowercase()))
        }
        "INT" => {
            call.arity(1)?;
            Ok(Value::Number(call.number(0)?.trunc()))
        }
        "ROUND" => {
            call.arity(2)?;
            let x = call.number(0)?;
            let places = call.whole(1)?;
            if !(0..=15).contains(&places) {
                return Err(call.invalid(format!("cannot round to {} places", places)));
            }
            let factor = 10f64.powi(places as i32);
            Ok(Value::Number((x * factor).round() / factor))
        }
        "NUM_TO_STR" => {
            call.arity(1)?;
            Ok(Value::Text(format_number(call.number(0)?)))
        }
        "STR_TO_NUM" => {
            call.arity(1)?;
            let s = call.text(0)?;
            s.trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| call.invalid(format!("'{}' is not a number", s)))
        }
        "IS_NUM" => {
            call.arity(1)?;
            Ok(Value::Boolean(call.text(0)?.trim().parse::<f64>().is_ok()))
        }
        "ASC" => {
            call.arity(1)?;
            let s = call.text(0)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Number(c as u32 as f64)),
                _ => Err(call.invalid(format!("'{}' is not a single character", s))),
            }
        }
        "CHR" => {
            call.arity(1)?;
            let code = call.whole(0)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::Text(c.to_string()))
                .ok_or_else(|| call.invalid(format!("{} is not a character code", code)))
        }
        "RAND" => {
            call.arity(1)?;
            let upper = call.number(0)?;
            if !upper.is_finite() || upper <= 0.0 {
                return Err(call.invalid(format!("upper bound {} must be a positive number", upper)));
            }
            Ok(Value::Number(rand::thread_rng().gen_range(0.0..upper)))
        }
        "RANDOM" => {
            call.arity(0)?;
            Ok(Value::Number(rand::thread_rng().gen::<f64>()))
        }
        _ => Err(RuntimeError::UndefinedCallable {
            name: name.to_string(),
            line,
        }),
    }
}

/// Argument access for one built-in call
struct Call<'a> {
    name: &'a str,
    args: &'a [Value],
    line: usize,
}

impl Call<'_> {
    fn arity(&self, expected: usize) -> Result<(), RuntimeError> {
        if self.args.len() != expected {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: self.name.to_string(),
                expected,
                got: self.args.len(),
                line: self.line,
            });
        }
        Ok(())
    }

    fn text(&self, index: usize) -> Result<&str, RuntimeError> {
        match &self.args[index] {
            Value::Text(s) => Ok(s),
            other => Err(self.wrong_type(index, "STRING", other)),
        }
    }

    fn number(&self, index: usize) -> Result<f64, RuntimeError> {
        match &self.args[index] {
            Value::Number(n) => Ok(*n),
            other => Err(self.wrong_type(index, "number", other)),
        }
    }

    fn whole(&self, index: usize) -> Result<i64, RuntimeError> {
        let n = self.number(index)?;
        if n.fract() != 0.0 {
            return Err(self.invalid(format!("argument {} must be a whole number", index + 1)));
        }
        Ok(n as i64)
    }

    /// A character count between 0 and `max`
    fn count(&self, index: usize, max: usize) -> Result<usize, RuntimeError> {
        let n = self.whole(index)?;
        if n < 0 || n as usize > max {
            return Err(self.invalid(format!("length {} is outside 0..{}", n, max)));
        }
        Ok(n as usize)
    }

    fn wrong_type(&self, index: usize, expected: &str, got: &Value) -> RuntimeError {
        RuntimeError::type_mismatch(
            format!(
                "{} argument {} must be a {}, got a {}",
                self.name,
                index + 1,
                expected,
                got.type_name()
            ),
            self.line,
        )
    }

    fn invalid(&self, message: String) -> RuntimeError {
        RuntimeError::InvalidArgument {
            message: format!("{}: {}", self.name, message),
            line: self.line,
        }
    }
}

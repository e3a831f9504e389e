//! Loop statement execution (`WHILE`, `REPEAT`, `FOR`).
//!
//! Adds `impl Interpreter` methods for the three loop forms. Every iteration
//! is counted against the run-wide iteration budget before its body runs, so a
//! non-terminating loop fails with `IterationLimit` instead of hanging.
//!
//! A body that ends with anything other than [`Flow::Normal`] (a `RETURN`, or
//! a stop from the host) unwinds the loop immediately and the flow is passed to
//! the caller unchanged.

use crate::interpreter::engine::{Flow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::host::Effects;
use crate::memory::scope::{var_ref, VarRef, Variable};
use crate::memory::value::Value;
use crate::parser::ast::{DataType, Expr, Statement};
use crate::trace::{OperationKind, TraceDetails};

impl Interpreter {
    /// Condition is re-checked before each iteration
    pub(crate) fn execute_while<E: Effects>(
        &mut self,
        condition: &Expr,
        body: &[Statement],
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        while self.evaluate_condition(condition, "WHILE", line)? {
            self.tick_iteration(line)?;
            match self.execute_block(body, fx)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Body runs at least once; stops when the condition becomes TRUE
    pub(crate) fn execute_repeat<E: Effects>(
        &mut self,
        body: &[Statement],
        condition: &Expr,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        loop {
            self.tick_iteration(line)?;
            match self.execute_block(body, fx)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
            if self.evaluate_condition(condition, "UNTIL", line)? {
                return Ok(Flow::Normal);
            }
        }
    }

    /// `FOR v ← start TO end [STEP step]`.
    ///
    /// `start`, `end` and `step` are evaluated once. The variable starts at
    /// `floor(start)` and after each pass is advanced by `floor(step)`, so a
    /// step between 0 and 1 never moves it and only the iteration budget ends
    /// the loop.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn execute_for<E: Effects>(
        &mut self,
        variable: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &[Statement],
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let start = self.evaluate_number(start, "FOR start value", line)?;
        let end = self.evaluate_number(end, "FOR end value", line)?;
        let step = match step {
            Some(expr) => self.evaluate_number(expr, "FOR STEP", line)?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(RuntimeError::ZeroStep { line });
        }
        let increment = step.floor();

        let counter = self.loop_variable(variable, line)?;
        self.assign_variable(variable, Value::Number(start.floor()), line)?;

        loop {
            let current = loop_counter_value(&counter, variable, line)?;
            let continues = if step > 0.0 {
                current <= end
            } else {
                current >= end
            };
            if !continues {
                return Ok(Flow::Normal);
            }

            self.tick_iteration(line)?;
            match self.execute_block(body, fx)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }

            let current = loop_counter_value(&counter, variable, line)?;
            self.assign_variable(variable, Value::Number(current + increment), line)?;
        }
    }

    /// The loop variable, declared as INTEGER in the current scope if needed
    fn loop_variable(&mut self, name: &str, line: usize) -> Result<VarRef, RuntimeError> {
        if let Some(var) = self.scopes.lookup(self.scopes.current(), name) {
            return Ok(var);
        }

        let scope = self.scopes.current();
        let var = var_ref(Variable::new(DataType::Integer, scope));
        self.scopes.bind(scope, name, VarRef::clone(&var));
        self.tracer.add_entry(
            OperationKind::Declare,
            line,
            TraceDetails::new()
                .variable(name)
                .metadata("INTEGER (FOR loop variable)"),
        );
        Ok(var)
    }
}

fn loop_counter_value(counter: &VarRef, name: &str, line: usize) -> Result<f64, RuntimeError> {
    match &counter.borrow().value {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(RuntimeError::type_mismatch(
            format!("FOR variable '{}' holds a {}", name, other.type_name()),
            line,
        )),
        None => Err(RuntimeError::UninitializedRead {
            name: name.to_string(),
            line,
        }),
    }
}

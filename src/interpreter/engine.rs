// Execution engine for the pseudocode interpreter

use crate::interpreter::constants::{
    DEFAULT_ARENA_SIZE, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_RECURSION_DEPTH, DEFAULT_TRACE_LIMIT,
    STACK_GROW_SIZE, STACK_RED_ZONE,
};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::files::FileSystem;
use crate::interpreter::host::{
    CancelToken, Effects, Host, RunOutcome, StepControl, Suspendable, Synchronous,
};
use crate::memory::arena::Arena;
use crate::memory::scope::{
    var_ref, CallFrame, CallStack, FrameKind, ScopeId, Scopes, VarRef, Variable, GLOBAL_SCOPE,
};
use crate::memory::value::{Address, Value};
use crate::parser::ast::*;
use crate::snapshot::{OutputLine, Snapshot, Transcript, VariableSnapshot};
use crate::trace::{OperationKind, TraceDetails, Tracer};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Interpreter limits and switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Number of arena slots (the first 1024 are reserved)
    pub arena_size: usize,
    /// Global loop-iteration budget for the whole run
    pub max_iterations: u64,
    /// Maximum number of active procedure/function frames
    pub max_recursion_depth: usize,
    /// Call [`Host::step`] before each statement outside function bodies
    pub debug: bool,
    /// Also emit `WRITEFILE` lines to the output stream
    pub echo_file_writes: bool,
    /// Maximum number of trace entries recorded
    pub trace_limit: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            arena_size: DEFAULT_ARENA_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            debug: false,
            echo_file_writes: false,
            trace_limit: DEFAULT_TRACE_LIMIT,
        }
    }
}

/// How a statement or block finished
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Return(Option<Value>),
    /// Stop requested by the host or the cancel token
    Halt,
}

/// Tree-walking interpreter for one program run.
///
/// A run cannot be restarted: build a fresh `Interpreter` to run again. The
/// arena, tracer, files and transcript stay readable after `run` returns,
/// including after a runtime error.
pub struct Interpreter {
    program: Rc<Program>,
    pub(crate) config: InterpreterConfig,

    /// Top-level procedure and function definitions
    pub(crate) callables: FxHashMap<String, Rc<CallableDef>>,

    pub(crate) scopes: Scopes,
    pub(crate) call_stack: CallStack,
    pub(crate) arena: Arena,
    pub(crate) tracer: Tracer,
    pub(crate) files: FileSystem,
    pub(crate) transcript: Transcript,

    /// Arena address → variable whose address was taken with `&`
    pub(crate) bound: FxHashMap<Address, VarRef>,

    /// Loop iterations executed so far
    pub(crate) iterations: u64,

    /// Line of the statement being executed
    pub(crate) current_line: usize,

    cancel: CancelToken,
    started: bool,
}

impl Interpreter {
    /// Create an interpreter for a parsed program
    pub fn new(program: Program, config: InterpreterConfig) -> Self {
        Interpreter {
            program: Rc::new(program),
            arena: Arena::new(config.arena_size),
            tracer: Tracer::new(config.trace_limit),
            config,
            callables: FxHashMap::default(),
            scopes: Scopes::new(),
            call_stack: CallStack::new(),
            files: FileSystem::new(),
            transcript: Transcript::new(),
            bound: FxHashMap::default(),
            iterations: 0,
            current_line: 0,
            cancel: CancelToken::new(),
            started: false,
        }
    }

    /// Token that stops the run before the next statement when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the program to completion, cancellation, or the first runtime error.
    ///
    /// Each interpreter runs its program once. Later calls leave all state
    /// untouched and fail with [`RuntimeError::AlreadyRun`].
    pub fn run(&mut self, host: &mut dyn Host) -> Result<RunOutcome, RuntimeError> {
        if self.started {
            return Err(RuntimeError::AlreadyRun);
        }
        self.started = true;

        self.hoist_definitions()?;
        log::info!(
            "run started: {} top-level statement(s), {} callable(s)",
            self.program.statements.len(),
            self.callables.len()
        );

        let program = Rc::clone(&self.program);
        let mut fx = Suspendable::new(host);
        let flow = self.execute_block(&program.statements, &mut fx)?;

        let outcome = match flow {
            Flow::Halt => RunOutcome::Cancelled,
            Flow::Normal => RunOutcome::Completed,
            Flow::Return(_) => {
                return Err(RuntimeError::InvalidArgument {
                    message: "RETURN outside of a PROCEDURE or FUNCTION".to_string(),
                    line: self.current_line,
                })
            }
        };

        log::info!(
            "run finished ({:?}) after {} loop iteration(s), {} trace entries",
            outcome,
            self.iterations,
            self.tracer.len()
        );
        Ok(outcome)
    }

    /// Index every top-level definition before execution starts
    fn hoist_definitions(&mut self) -> Result<(), RuntimeError> {
        let program = Rc::clone(&self.program);
        for def in program.callables() {
            if self.callables.contains_key(&def.name) {
                return Err(RuntimeError::Redeclaration {
                    name: def.name.clone(),
                    line: def.location.line,
                });
            }
            self.callables.insert(def.name.clone(), Rc::new(def.clone()));
        }
        Ok(())
    }

    // ===== Read-only accessors =====

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn files(&self) -> &FileSystem {
        &self.files
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn call_stack(&self) -> &[CallFrame] {
        self.call_stack.frames()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Current value of a global variable, if declared and assigned
    pub fn global(&self, name: &str) -> Option<Value> {
        self.scopes
            .get(GLOBAL_SCOPE)
            .and_then(|scope| scope.get(name))
            .and_then(|var| var.borrow().value.clone())
    }

    /// Interpreter state at the current statement boundary
    pub fn snapshot(&self) -> Snapshot {
        self.capture_snapshot(false)
    }

    pub(crate) fn capture_snapshot(&self, paused: bool) -> Snapshot {
        let variables: BTreeMap<String, VariableSnapshot> = self
            .scopes
            .visible(self.scopes.current())
            .into_iter()
            .map(|(name, var)| {
                let var = var.borrow();
                (
                    name,
                    VariableSnapshot {
                        data_type: var.data_type.clone(),
                        value: var.value.clone(),
                        address: var.address,
                        constant: var.constant,
                    },
                )
            })
            .collect();

        Snapshot {
            line: self.current_line,
            call_stack: self.call_stack.frames().to_vec(),
            variables,
            paused,
        }
    }

    // ===== Statement dispatch =====

    /// Execute statements in order until one ends the block early.
    /// Every PROCEDURE and FUNCTION body passes through here, so recursion up to
    /// `max_recursion_depth` grows the native stack instead of overflowing it.
    pub(crate) fn execute_block<E: Effects>(
        &mut self,
        statements: &[Statement],
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.execute_statements(statements, fx)
        })
    }

    fn execute_statements<E: Effects>(
        &mut self,
        statements: &[Statement],
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            let flow = self.execute_statement(stmt, fx)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Execute a single statement
    pub(crate) fn execute_statement<E: Effects>(
        &mut self,
        stmt: &Statement,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let line = stmt.line();
        self.current_line = line;
        self.call_stack.set_line(line);
        self.check_iteration_budget(line)?;

        if E::SUSPENDS {
            if self.cancel.is_cancelled() {
                log::info!("run cancelled before line {}", line);
                return Ok(Flow::Halt);
            }
            if self.config.debug && !matches!(stmt, Statement::Procedure(_) | Statement::Function(_)) {
                let snapshot = self.capture_snapshot(true);
                if let Some(host) = fx.host() {
                    if host.step(&snapshot) == StepControl::Stop {
                        log::info!("run stopped by host at line {}", line);
                        return Ok(Flow::Halt);
                    }
                }
            }
        }

        log::trace!("line {}: {:?}", line, std::mem::discriminant(stmt));

        match stmt {
            Statement::Declare {
                name, data_type, ..
            } => {
                self.execute_declare(name, data_type, line)?;
                Ok(Flow::Normal)
            }
            Statement::Constant { name, value, .. } => {
                self.execute_constant(name, value, line)?;
                Ok(Flow::Normal)
            }
            Statement::Assignment { target, value, .. } => {
                let value = self.evaluate(value)?;
                self.assign(target, value, line)?;
                Ok(Flow::Normal)
            }
            Statement::Output { items, .. } => self.execute_output(items, line, fx),
            Statement::Input { target, .. } => self.execute_input(target, line, fx),
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.execute_if(condition, then_branch, else_branch.as_deref(), line, fx),
            Statement::While {
                condition, body, ..
            } => self.execute_while(condition, body, line, fx),
            Statement::Repeat {
                body, condition, ..
            } => self.execute_repeat(body, condition, line, fx),
            Statement::For {
                variable,
                start,
                end,
                step,
                body,
                ..
            } => self.execute_for(variable, start, end, step.as_ref(), body, line, fx),
            Statement::Case {
                subject,
                branches,
                otherwise,
                ..
            } => self.execute_case(subject, branches, otherwise.as_deref(), fx),
            // Hoisted before the run starts
            Statement::Procedure(_) | Statement::Function(_) => Ok(Flow::Normal),
            Statement::Call { name, args, .. } => self.execute_call(name, args, line, fx),
            Statement::Return { value, .. } => self.execute_return(value.as_ref(), line),
            Statement::OpenFile { file, mode, .. } => self.execute_openfile(file, *mode, line, fx),
            Statement::ReadFile { file, target, .. } => self.execute_readfile(file, target, line, fx),
            Statement::WriteFile { file, value, .. } => {
                self.execute_writefile(file, value, line, fx)
            }
            Statement::CloseFile { file, .. } => self.execute_closefile(file, line, fx),
            Statement::Free { pointer, .. } => {
                self.execute_free(pointer, line)?;
                Ok(Flow::Normal)
            }
        }
    }

    // ===== Budgets =====

    fn check_iteration_budget(&self, line: usize) -> Result<(), RuntimeError> {
        if self.iterations > self.config.max_iterations {
            return Err(RuntimeError::IterationLimit {
                limit: self.config.max_iterations,
                line,
            });
        }
        Ok(())
    }

    /// Count one loop iteration against the global budget
    pub(crate) fn tick_iteration(&mut self, line: usize) -> Result<(), RuntimeError> {
        self.iterations += 1;
        self.check_iteration_budget(line)
    }

    // ===== Calls =====

    pub(crate) fn lookup_callable(&self, name: &str, line: usize) -> Result<Rc<CallableDef>, RuntimeError> {
        self.callables
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedCallable {
                name: name.to_string(),
                line,
            })
    }

    /// Run a procedure under the caller's effects
    pub(crate) fn call_procedure<E: Effects>(
        &mut self,
        def: &CallableDef,
        args: &[Expr],
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let scope = self.enter_callable(def, args, FrameKind::Procedure, line)?;
        let result = self.execute_block(&def.body, fx);
        self.leave_callable(scope, line)?;

        match result? {
            Flow::Return(Some(_)) => Err(RuntimeError::type_mismatch(
                format!("PROCEDURE '{}' cannot return a value", def.name),
                self.current_line,
            )),
            Flow::Halt => Ok(Flow::Halt),
            Flow::Normal | Flow::Return(None) => Ok(Flow::Normal),
        }
    }

    /// Run a function body synchronously and return its value
    pub(crate) fn call_function(
        &mut self,
        def: &CallableDef,
        args: &[Expr],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let scope = self.enter_callable(def, args, FrameKind::Function, line)?;
        let result = self.execute_block(&def.body, &mut Synchronous);
        let end_line = self.current_line;
        self.leave_callable(scope, line)?;

        let value = match result? {
            Flow::Return(Some(value)) => value,
            _ => {
                return Err(RuntimeError::MissingReturn {
                    name: def.name.clone(),
                    line: end_line,
                })
            }
        };

        let Some(return_type) = &def.return_type else {
            return Ok(value);
        };
        value.conform_to(return_type).map_err(|value| {
            RuntimeError::type_mismatch(
                format!(
                    "FUNCTION '{}' RETURNS {} but returned a {}",
                    def.name,
                    return_type,
                    value.type_name()
                ),
                end_line,
            )
        })
    }

    /// Bind arguments, open the callee scope and push its frame
    fn enter_callable(
        &mut self,
        def: &CallableDef,
        args: &[Expr],
        kind: FrameKind,
        line: usize,
    ) -> Result<ScopeId, RuntimeError> {
        if args.len() != def.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: def.name.clone(),
                expected: def.params.len(),
                got: args.len(),
                line,
            });
        }

        if self.call_stack.depth() >= self.config.max_recursion_depth {
            return Err(RuntimeError::RecursionLimit {
                name: def.name.clone(),
                limit: self.config.max_recursion_depth,
                line,
            });
        }

        // Arguments are resolved in the caller's scope
        let mut bindings = Vec::with_capacity(args.len());
        for (param, arg) in def.params.iter().zip(args) {
            bindings.push(self.bind_argument(def, param, arg, line)?);
        }

        let scope = self.scopes.push(GLOBAL_SCOPE);
        for (param, binding) in def.params.iter().zip(bindings) {
            let (var, metadata) = match binding {
                Binding::Alias(var) => (var, "BYREF"),
                Binding::Copy(value) => (
                    var_ref(Variable::with_value(param.param_type.clone(), value, scope)),
                    "BYVAL",
                ),
            };
            let rendered = var.borrow().value.as_ref().map(|v| v.to_string());
            self.scopes.bind(scope, &param.name, var);

            let mut details = TraceDetails::new()
                .variable(param.name.as_str())
                .metadata(format!("{} parameter of {}", metadata, def.name));
            if let Some(value) = rendered {
                details = details.value(value);
            }
            self.tracer.add_entry(OperationKind::Declare, line, details);
        }

        self.call_stack.push(CallFrame {
            name: def.name.clone(),
            line: def.location.line,
            kind,
        });
        log::debug!(
            "call {} {} (depth {})",
            kind,
            def.name,
            self.call_stack.depth()
        );
        Ok(scope)
    }

    /// Pop the callee frame and scope, releasing the scope's arena bindings
    fn leave_callable(&mut self, scope: ScopeId, line: usize) -> Result<(), RuntimeError> {
        self.call_stack.pop();
        if let Some(popped) = self.scopes.pop() {
            self.release_scope(scope, &popped, line)?;
        }
        Ok(())
    }

    fn bind_argument(
        &mut self,
        def: &CallableDef,
        param: &Param,
        arg: &Expr,
        line: usize,
    ) -> Result<Binding, RuntimeError> {
        match param.mode {
            PassMode::ByRef => {
                let Expr::Identifier(name, _) = arg else {
                    return Err(RuntimeError::type_mismatch(
                        format!(
                            "BYREF parameter '{}' of '{}' needs a variable argument",
                            param.name, def.name
                        ),
                        line,
                    ));
                };
                let var = self.lookup_variable(name, line)?;
                let compatible = types_compatible(&param.param_type, &var.borrow().data_type);
                if !compatible {
                    return Err(RuntimeError::type_mismatch(
                        format!(
                            "BYREF parameter '{}' is {} but '{}' is {}",
                            param.name,
                            param.param_type,
                            name,
                            var.borrow().data_type
                        ),
                        line,
                    ));
                }
                Ok(Binding::Alias(var))
            }
            PassMode::ByVal => {
                let value = self.evaluate(arg)?;
                let value = value.conform_to(&param.param_type).map_err(|value| {
                    RuntimeError::type_mismatch(
                        format!(
                            "cannot pass a {} as parameter '{}' : {} of '{}'",
                            value.type_name(),
                            param.name,
                            param.param_type,
                            def.name
                        ),
                        line,
                    )
                })?;
                Ok(Binding::Copy(value))
            }
        }
    }

    /// Resolve a variable from the innermost scope outward
    pub(crate) fn lookup_variable(&self, name: &str, line: usize) -> Result<VarRef, RuntimeError> {
        self.scopes
            .lookup(self.scopes.current(), name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
                line,
            })
    }

    /// Deliver a line to the host and record it in the transcript
    pub(crate) fn emit_line(&mut self, host: &mut dyn Host, line: OutputLine) {
        host.emit(&line);
        self.transcript.push(line);
    }
}

/// How an argument reaches the callee
enum Binding {
    Alias(VarRef),
    Copy(Value),
}

/// Whether a variable of type `actual` may be passed BYREF as `declared`.
/// An array parameter without bounds accepts any array of the same element type.
fn types_compatible(declared: &DataType, actual: &DataType) -> bool {
    match (declared, actual) {
        (
            DataType::Array { dims, element },
            DataType::Array {
                element: actual_element,
                ..
            },
        ) if dims.is_empty() => element == actual_element,
        _ => declared == actual,
    }
}

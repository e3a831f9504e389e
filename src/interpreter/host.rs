//! Host boundary: output, input, stepping and file content
//!
//! The interpreter never performs I/O itself. Everything that leaves or enters
//! a running program goes through a [`Host`]:
//!
//! - [`Host::emit`] receives each output line, synchronously and in program order
//! - [`Host::request_input`] supplies the text for an `INPUT` statement
//! - [`Host::step`] is called before each statement in debug mode
//! - [`Host::request_file`] supplies the content of a file opened `FOR READ`
//!
//! Returning `None` from an input request, or [`StepControl::Stop`] from a step,
//! ends the run cleanly with [`RunOutcome::Cancelled`]. A [`CancelToken`] gives
//! the same effect from outside the host.
//!
//! # Effects
//!
//! Procedure and top-level bodies run under [`Suspendable`], which holds the
//! host. Function bodies run under [`Synchronous`], which has no host at all, so
//! a statement that needs one fails with `IllegalInFunction` instead of suspending.

use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::DataType;
use crate::snapshot::{OutputKind, OutputLine, Snapshot};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reply to a debug step request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Stop,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// External collaborator driving a run
pub trait Host {
    /// Receive one output line
    fn emit(&mut self, line: &OutputLine);

    /// Text for an `INPUT` into `name`, declared as `data_type`. `None` cancels the run.
    fn request_input(&mut self, name: &str, data_type: &DataType) -> Option<String>;

    /// Called before each statement when debugging
    fn step(&mut self, _snapshot: &Snapshot) -> StepControl {
        StepControl::Continue
    }

    /// Content of a file opened for reading
    fn request_file(&mut self, _name: &str) -> Option<String> {
        None
    }
}

/// Shared stop flag, checked before every statement outside function bodies
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory host with scripted input and file content. Collects every line
/// and every debug snapshot it is shown.
#[derive(Debug, Default)]
pub struct BufferedHost {
    inputs: VecDeque<String>,
    files: FxHashMap<String, String>,
    stop_after_steps: Option<usize>,
    pub lines: Vec<OutputLine>,
    pub prompts: Vec<(String, DataType)>,
    pub snapshots: Vec<Snapshot>,
}

impl BufferedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BufferedHost {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Answer `Stop` once `n` steps have been observed
    pub fn stop_after_steps(mut self, n: usize) -> Self {
        self.stop_after_steps = Some(n);
        self
    }

    /// Text of `OUTPUT` lines only
    pub fn outputs(&self) -> Vec<&str> {
        self.texts(OutputKind::Output)
    }

    pub fn texts(&self, kind: OutputKind) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.text.as_str())
            .collect()
    }
}

impl Host for BufferedHost {
    fn emit(&mut self, line: &OutputLine) {
        self.lines.push(line.clone());
    }

    fn request_input(&mut self, name: &str, data_type: &DataType) -> Option<String> {
        self.prompts.push((name.to_string(), data_type.clone()));
        self.inputs.pop_front()
    }

    fn step(&mut self, snapshot: &Snapshot) -> StepControl {
        self.snapshots.push(snapshot.clone());
        match self.stop_after_steps {
            Some(n) if self.snapshots.len() > n => StepControl::Stop,
            _ => StepControl::Continue,
        }
    }

    fn request_file(&mut self, name: &str) -> Option<String> {
        self.files.get(name).cloned()
    }
}

/// Capability set a statement executes under
pub(crate) trait Effects {
    /// Whether execution may pause here (debug steps, cancellation)
    const SUSPENDS: bool;

    fn host(&mut self) -> Option<&mut dyn Host>;

    /// The host, or `IllegalInFunction` for `statement`
    fn require_host(&mut self, statement: &'static str, line: usize) -> Result<&mut dyn Host, RuntimeError> {
        self.host()
            .ok_or(RuntimeError::IllegalInFunction { statement, line })
    }
}

/// Effects for the top level and procedure bodies
pub(crate) struct Suspendable<'h> {
    host: &'h mut dyn Host,
}

impl<'h> Suspendable<'h> {
    pub(crate) fn new(host: &'h mut dyn Host) -> Self {
        Suspendable { host }
    }
}

impl Effects for Suspendable<'_> {
    const SUSPENDS: bool = true;

    fn host(&mut self) -> Option<&mut dyn Host> {
        Some(&mut *self.host)
    }
}

/// Effects for function bodies: no host, no suspension
pub(crate) struct Synchronous;

impl Effects for Synchronous {
    const SUSPENDS: bool = false;

    fn host(&mut self) -> Option<&mut dyn Host> {
        None
    }
}

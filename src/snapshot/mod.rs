// Debug snapshots and the output transcript

use crate::memory::scope::CallFrame;
use crate::memory::value::{Address, Value};
use crate::parser::ast::DataType;
use std::collections::BTreeMap;
use std::fmt;

/// Where an output line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `OUTPUT` statement
    Output,
    /// `WRITEFILE` echoed to the output stream
    FileWrite,
    /// Value entered for an `INPUT` statement
    InputEcho,
}

/// A line of program output with source line tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub kind: OutputKind,
    pub text: String,
    pub line: usize,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Every line emitted during a run, in program order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub lines: Vec<OutputLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript { lines: Vec::new() }
    }

    pub fn push(&mut self, line: OutputLine) {
        self.lines.push(line);
    }

    /// Text of all lines of the given kind
    pub fn texts(&self, kind: OutputKind) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.text.as_str())
            .collect()
    }

    /// Text of every line regardless of kind
    pub fn get_output(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A variable as seen from a debug snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSnapshot {
    pub data_type: DataType,
    pub value: Option<Value>,
    pub address: Option<Address>,
    pub constant: bool,
}

impl fmt::Display for VariableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{} : {}", v, self.data_type)?,
            None => write!(f, "<uninitialized> : {}", self.data_type)?,
        }
        if let Some(address) = self.address {
            write!(f, " @0x{:04x}", address)?;
        }
        Ok(())
    }
}

/// Interpreter state at a step boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Line of the statement about to execute
    pub line: usize,
    pub call_stack: Vec<CallFrame>,
    /// Every variable visible from the current scope
    pub variables: BTreeMap<String, VariableSnapshot>,
    pub paused: bool,
}

impl Snapshot {
    pub fn variable(&self, name: &str) -> Option<&VariableSnapshot> {
        self.variables.get(name)
    }

    /// Name of the innermost procedure/function, if any
    pub fn current_callable(&self) -> Option<&str> {
        self.call_stack.last().map(|f| f.name.as_str())
    }
}

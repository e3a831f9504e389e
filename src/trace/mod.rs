//! Operation tracer
//!
//! Append-only log of memory-affecting actions performed by the evaluator.
//! [`Tracer::add_entry`] is the only mutator: it stamps each record with a
//! strictly increasing step number and the milliseconds elapsed since the
//! tracer was created. Entries are never modified or removed.
//!
//! The log exists for observers (visualizers, the CLI summary). The evaluator
//! writes to it but never reads it to make decisions.

use crate::memory::value::Address;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Instant;

/// Kinds of traced operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Declare,
    Read,
    Write,
    Allocate,
    Free,
    AddressOf,
    Dereference,
    PointerAssign,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Declare => "DECLARE",
            OperationKind::Read => "READ",
            OperationKind::Write => "WRITE",
            OperationKind::Allocate => "ALLOCATE",
            OperationKind::Free => "FREE",
            OperationKind::AddressOf => "ADDRESS_OF",
            OperationKind::Dereference => "DEREFERENCE",
            OperationKind::PointerAssign => "POINTER_ASSIGN",
        };
        write!(f, "{}", s)
    }
}

/// Optional fields of a trace record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceDetails {
    pub address: Option<Address>,
    /// For pointer operations: the address of the pointer variable itself
    pub pointer_address: Option<Address>,
    /// Rendered value involved in the operation
    pub value: Option<String>,
    pub variable: Option<String>,
    pub metadata: Option<String>,
}

impl TraceDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn pointer_address(mut self, address: Address) -> Self {
        self.pointer_address = Some(address);
        self
    }

    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(name.into());
        self
    }

    pub fn metadata(mut self, text: impl Into<String>) -> Self {
        self.metadata = Some(text.into());
        self
    }
}

/// One immutable trace record
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub step: u64,
    pub kind: OperationKind,
    pub line: usize,
    pub timestamp_ms: u64,
    pub details: TraceDetails,
}

impl TraceEntry {
    pub fn address(&self) -> Option<Address> {
        self.details.address
    }

    pub fn variable(&self) -> Option<&str> {
        self.details.variable.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.details.value.as_deref()
    }

    pub fn metadata(&self) -> Option<&str> {
        self.details.metadata.as_deref()
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:<5} line {:<4} {:<14}", self.step, self.line, self.kind)?;
        if let Some(name) = &self.details.variable {
            write!(f, " {}", name)?;
        }
        if let Some(address) = self.details.address {
            write!(f, " @0x{:04x}", address)?;
        }
        if let Some(pointer) = self.details.pointer_address {
            write!(f, " via 0x{:04x}", pointer)?;
        }
        if let Some(value) = &self.details.value {
            write!(f, " = {}", value)?;
        }
        if let Some(meta) = &self.details.metadata {
            write!(f, " ({})", meta)?;
        }
        Ok(())
    }
}

/// Counts per operation kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub counts: BTreeMap<OperationKind, usize>,
    pub total: usize,
    pub first_step: Option<u64>,
    pub last_step: Option<u64>,
}

impl TraceStats {
    pub fn count(&self, kind: OperationKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Append-only operation log
#[derive(Debug, Clone)]
pub struct Tracer {
    entries: Vec<TraceEntry>,
    next_step: u64,
    started: Instant,
    limit: usize,
    truncated: bool,
}

impl Tracer {
    /// Create a tracer that keeps at most `limit` entries
    pub fn new(limit: usize) -> Self {
        Tracer {
            entries: Vec::new(),
            next_step: 1,
            started: Instant::now(),
            limit,
            truncated: false,
        }
    }

    /// Record an operation. Returns the assigned step, or `None` once the
    /// entry limit has been reached.
    pub fn add_entry(&mut self, kind: OperationKind, line: usize, details: TraceDetails) -> Option<u64> {
        if self.entries.len() >= self.limit {
            if !self.truncated {
                log::info!("trace limit of {} entries reached; further operations are not recorded", self.limit);
            }
            self.truncated = true;
            return None;
        }

        let step = self.next_step;
        self.next_step += 1;
        self.entries.push(TraceEntry {
            step,
            kind,
            line,
            timestamp_ms: self.started.elapsed().as_millis() as u64,
            details,
        });
        Some(step)
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether operations were dropped because of the entry limit
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn by_variable(&self, name: &str) -> Vec<&TraceEntry> {
        self.entries
            .iter()
            .filter(|e| e.variable() == Some(name))
            .collect()
    }

    /// Entries touching `address`, either as target or as pointer location
    pub fn by_address(&self, address: Address) -> Vec<&TraceEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.details.address == Some(address) || e.details.pointer_address == Some(address)
            })
            .collect()
    }

    pub fn in_step_range(&self, steps: RangeInclusive<u64>) -> Vec<&TraceEntry> {
        self.entries
            .iter()
            .filter(|e| steps.contains(&e.step))
            .collect()
    }

    pub fn in_line_range(&self, lines: RangeInclusive<usize>) -> Vec<&TraceEntry> {
        self.entries
            .iter()
            .filter(|e| lines.contains(&e.line))
            .collect()
    }

    pub fn last_for_variable(&self, name: &str) -> Option<&TraceEntry> {
        self.entries.iter().rev().find(|e| e.variable() == Some(name))
    }

    pub fn stats(&self) -> TraceStats {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        TraceStats {
            counts,
            total: self.entries.len(),
            first_step: self.entries.first().map(|e| e.step),
            last_step: self.entries.last().map(|e| e.step),
        }
    }

    /// Latest pointer → target relationships, from `PointerAssign` entries.
    /// A pointer last assigned NULL is omitted.
    pub fn pointer_targets(&self) -> BTreeMap<String, Address> {
        let mut targets: FxHashMap<&str, Address> = FxHashMap::default();
        for entry in &self.entries {
            if entry.kind != OperationKind::PointerAssign {
                continue;
            }
            let (Some(name), Some(target)) = (entry.variable(), entry.details.address) else {
                continue;
            };
            if target == 0 {
                targets.remove(name);
            } else {
                targets.insert(name, target);
            }
        }
        targets
            .into_iter()
            .map(|(name, target)| (name.to_string(), target))
            .collect()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(crate::interpreter::constants::DEFAULT_TRACE_LIMIT)
    }
}

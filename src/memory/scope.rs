//! Scopes, variables and the call stack
//!
//! This module provides the execution environment for the evaluator:
//! - [`Variable`]: a declared variable with its type and (optional) value
//! - [`VarRef`]: shared handle to a variable; `BYREF` parameters alias the caller's handle
//! - [`Scopes`]: arena of scopes indexed by [`ScopeId`], each with an optional parent
//! - [`CallStack`]: procedure/function frames for diagnostics and depth limiting
//!
//! # Lookup
//!
//! Lookup starts in the given scope and walks parent links outward. A procedure
//! scope's parent is the global scope, so callees see globals but never their
//! caller's locals.

use super::value::{Address, Value};
use crate::parser::ast::DataType;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle to a scope in [`Scopes`]
pub type ScopeId = usize;

/// The global scope always exists and has no parent
pub const GLOBAL_SCOPE: ScopeId = 0;

/// A declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub data_type: DataType,
    /// `None` until the first assignment
    pub value: Option<Value>,
    pub constant: bool,
    /// Arena slots mirroring this variable once its address has been taken
    pub address: Option<Address>,
    /// Scope that declared the variable and releases its arena binding
    pub owner: ScopeId,
}

impl Variable {
    pub fn new(data_type: DataType, owner: ScopeId) -> Self {
        Variable {
            data_type,
            value: None,
            constant: false,
            address: None,
            owner,
        }
    }

    pub fn with_value(data_type: DataType, value: Value, owner: ScopeId) -> Self {
        Variable {
            value: Some(value),
            ..Variable::new(data_type, owner)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }
}

/// Shared, mutable variable cell
pub type VarRef = Rc<RefCell<Variable>>;

pub fn var_ref(variable: Variable) -> VarRef {
    Rc::new(RefCell::new(variable))
}

/// One scope: identifier → variable, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    vars: FxHashMap<String, VarRef>,
    order: Vec<String>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&VarRef> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarRef)> {
        self.order.iter().filter_map(|name| self.vars.get_key_value(name))
    }
}

/// Arena of scopes. Scopes are created per call and discarded on return, so
/// they form a stack in practice; the global scope sits at index 0.
#[derive(Debug, Clone)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Scopes {
            scopes: vec![Scope::default()],
        }
    }

    /// Open a new scope with the given parent
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        self.scopes.len() - 1
    }

    /// Discard the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    /// Innermost live scope
    pub fn current(&self) -> ScopeId {
        self.scopes.len() - 1
    }

    /// Bind `name` in scope `id`. Returns `false` if the name is already
    /// bound in that scope.
    pub fn bind(&mut self, id: ScopeId, name: &str, var: VarRef) -> bool {
        let Some(scope) = self.scopes.get_mut(id) else {
            return false;
        };
        if scope.vars.contains_key(name) {
            return false;
        }
        scope.order.push(name.to_string());
        scope.vars.insert(name.to_string(), var);
        true
    }

    /// Resolve `name` starting at scope `id`, innermost first
    pub fn lookup(&self, id: ScopeId, name: &str) -> Option<VarRef> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let scope = self.scopes.get(current)?;
            if let Some(var) = scope.vars.get(name) {
                return Some(Rc::clone(var));
            }
            cursor = scope.parent;
        }
        None
    }

    /// Every name visible from scope `id`, innermost binding winning
    pub fn visible(&self, id: ScopeId) -> Vec<(String, VarRef)> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut out = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(scope) = self.scopes.get(current) else {
                break;
            };
            for (name, var) in scope.iter() {
                if seen.insert(name.as_str()) {
                    out.push((name.clone(), Rc::clone(var)));
                }
            }
            cursor = scope.parent;
        }
        out
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of callable a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Procedure,
    Function,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Procedure => write!(f, "PROCEDURE"),
            FrameKind::Function => write!(f, "FUNCTION"),
        }
    }
}

/// Call stack frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub name: String,
    /// Line currently executing inside this frame
    pub line: usize,
    pub kind: FrameKind,
}

/// The call stack
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    /// Record the line being executed by the innermost frame
    pub fn set_line(&mut self, line: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_to_global() {
        let mut scopes = Scopes::new();
        scopes.bind(GLOBAL_SCOPE, "g", var_ref(Variable::new(DataType::Integer, GLOBAL_SCOPE)));

        let local = scopes.push(GLOBAL_SCOPE);
        scopes.bind(local, "x", var_ref(Variable::new(DataType::Real, local)));

        assert!(scopes.lookup(local, "g").is_some());
        assert!(scopes.lookup(local, "x").is_some());
        assert!(scopes.lookup(GLOBAL_SCOPE, "x").is_none());
    }

    #[test]
    fn test_shadowing_resolves_innermost_first() {
        let mut scopes = Scopes::new();
        scopes.bind(
            GLOBAL_SCOPE,
            "n",
            var_ref(Variable::with_value(DataType::Integer, Value::Number(1.0), GLOBAL_SCOPE)),
        );
        let local = scopes.push(GLOBAL_SCOPE);
        scopes.bind(
            local,
            "n",
            var_ref(Variable::with_value(DataType::Integer, Value::Number(2.0), local)),
        );

        let found = scopes.lookup(local, "n").unwrap();
        assert_eq!(found.borrow().value, Some(Value::Number(2.0)));

        let visible = scopes.visible(local);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn test_duplicate_binding_in_one_scope_is_rejected() {
        let mut scopes = Scopes::new();
        let v = var_ref(Variable::new(DataType::Integer, GLOBAL_SCOPE));
        assert!(scopes.bind(GLOBAL_SCOPE, "a", Rc::clone(&v)));
        assert!(!scopes.bind(GLOBAL_SCOPE, "a", v));
    }

    #[test]
    fn test_aliased_binding_shares_the_cell() {
        let mut scopes = Scopes::new();
        let v = var_ref(Variable::new(DataType::Integer, GLOBAL_SCOPE));
        scopes.bind(GLOBAL_SCOPE, "x", Rc::clone(&v));
        let local = scopes.push(GLOBAL_SCOPE);
        scopes.bind(local, "alias", Rc::clone(&v));

        if let Some(var) = scopes.lookup(local, "alias") {
            var.borrow_mut().value = Some(Value::Number(9.0));
        }
        assert_eq!(v.borrow().value, Some(Value::Number(9.0)));
    }

    #[test]
    fn test_global_scope_is_never_popped() {
        let mut scopes = Scopes::new();
        assert!(scopes.pop().is_none());
        scopes.push(GLOBAL_SCOPE);
        assert!(scopes.pop().is_some());
        assert_eq!(scopes.depth(), 1);
    }
}

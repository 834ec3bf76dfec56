//! Persistent variable scope.
//!
//! A scope is a linked chain of single bindings. Binding a name never touches
//! the existing chain; it returns a new head pointing at the old one. Closures
//! and continuation frames capture a scope by cloning the head pointer, so
//! any number of them can share ancestry safely.

use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::value::Value;

#[derive(Clone, Default)]
pub struct Env {
    head: Option<Rc<Scope>>,
}

struct Scope {
    name: String,
    value: Value,
    parent: Env,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new scope with `name` bound on top of this one.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        Env {
            head: Some(Rc::new(Scope {
                name: name.into(),
                value,
                parent: self.clone(),
            })),
        }
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes()
            .find(|scope| scope.name == name)
            .map(|scope| &scope.value)
    }

    /// Visible names, innermost first, shadowed duplicates removed.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for scope in self.scopes() {
            if !names.contains(&scope.name.as_str()) {
                names.push(&scope.name);
            }
        }
        names
    }

    /// True when both handles point at the same scope.
    pub fn ptr_eq(&self, other: &Env) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Unlinks the uniquely owned prefix of the chain and moves its values
    /// into `pending`.
    pub(crate) fn release(&mut self, pending: &mut Vec<Value>) {
        let mut next = self.head.take();
        while let Some(scope) = next {
            match Rc::try_unwrap(scope) {
                Ok(mut scope) => {
                    pending.push(mem::replace(&mut scope.value, Value::Int(0)));
                    next = scope.parent.head.take();
                }
                Err(_) => break,
            }
        }
    }

    fn scopes(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(self.head.as_deref(), |scope| scope.parent.head.as_deref())
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// Long chains would otherwise drop recursively.
impl Drop for Scope {
    fn drop(&mut self) {
        let mut next = self.parent.head.take();
        while let Some(scope) = next {
            match Rc::try_unwrap(scope) {
                Ok(mut scope) => next = scope.parent.head.take(),
                Err(_) => break,
            }
        }
    }
}

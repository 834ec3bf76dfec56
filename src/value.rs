//! Runtime values.
//!
//! Values are never mutated in place. Compound data sits behind `Rc`, so
//! "updating" a record or list builds a new value that shares the untouched
//! parts with the old one.
//!
//! Dropping and comparing values use explicit work lists, so arbitrarily deep
//! data is safe to discard or test for equality. `Display` and `Debug` still
//! recurse and are meant for values of modest depth.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::rc::Rc;

use crate::ast::{Expr, Label};
use crate::builtins::Op;
use crate::effects::Resumption;
use crate::env::Env;

pub type Fields = BTreeMap<Label, Value>;

/// An immutable run of items whose front can be dropped in O(1).
///
/// `rest` shares storage with the original, so walking a list or binary one
/// item at a time never copies the remainder.
#[derive(Clone)]
pub struct Shared<T> {
    items: Rc<[T]>,
    start: usize,
}

impl<T> Shared<T> {
    pub fn new(items: impl Into<Rc<[T]>>) -> Self {
        Shared {
            items: items.into(),
            start: 0,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[self.start..]
    }

    /// The first item and a view of everything after it.
    pub fn uncons(&self) -> Option<(&T, Shared<T>)> {
        let first = self.items.get(self.start)?;
        let rest = Shared {
            items: Rc::clone(&self.items),
            start: self.start + 1,
        };
        Some((first, rest))
    }

    fn same(&self, other: &Shared<T>) -> bool {
        Rc::ptr_eq(&self.items, &other.items) && self.start == other.start
    }
}

impl<T> Deref for Shared<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(Rc<str>),
    Binary(Shared<u8>),
    Record(Rc<Fields>),
    List(Shared<Value>),
    Tagged {
        tag: Rc<str>,
        payload: Rc<Value>,
    },
    Closure {
        param: Label,
        body: Rc<Expr>,
        env: Env,
    },
    /// A primitive waiting for the rest of its arguments.
    Partial {
        op: Op,
        applied: Vec<Value>,
    },
    /// A captured delimited continuation.
    Resume(Rc<Resumption>),
}

impl Value {
    /// The empty record.
    pub fn unit() -> Self {
        Value::Record(Rc::new(Fields::new()))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Value::Binary(Shared::new(bytes.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Shared::new(items.into_iter().collect::<Vec<_>>()))
    }

    pub fn record<K: Into<Label>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(Rc::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn tagged(tag: impl AsRef<str>, payload: Value) -> Self {
        Value::Tagged {
            tag: Rc::from(tag.as_ref()),
            payload: Rc::new(payload),
        }
    }

    pub fn ok(payload: Value) -> Self {
        Value::tagged("Ok", payload)
    }

    pub fn error(payload: Value) -> Self {
        Value::tagged("Error", payload)
    }

    pub fn bool(b: bool) -> Self {
        Value::tagged(if b { "True" } else { "False" }, Value::unit())
    }

    pub fn partial(op: Op) -> Self {
        Value::Partial {
            op,
            applied: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Integer",
            Value::Str(_) => "String",
            Value::Binary(_) => "Binary",
            Value::Record(_) => "Record",
            Value::List(_) => "List",
            Value::Tagged { .. } => "Tagged",
            Value::Closure { .. } => "Function",
            Value::Partial { .. } => "Builtin",
            Value::Resume(_) => "Resume",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Shared<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Shared<u8>> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Moves uniquely owned children into `pending`, leaving cheap
    /// placeholders behind.
    fn detach(&mut self, pending: &mut Vec<Value>) {
        match self {
            Value::Record(fields) => {
                if let Some(fields) = Rc::get_mut(fields) {
                    pending.extend(mem::take(fields).into_values());
                }
            }
            Value::List(items) => {
                if let Some(items) = Rc::get_mut(&mut items.items) {
                    pending.extend(items.iter_mut().map(|item| mem::replace(item, Value::Int(0))));
                }
            }
            Value::Tagged { payload, .. } => {
                if let Some(payload) = Rc::get_mut(payload) {
                    pending.push(mem::replace(payload, Value::Int(0)));
                }
            }
            Value::Closure { env, .. } => env.release(pending),
            Value::Partial { applied, .. } => pending.append(applied),
            _ => {}
        }
    }
}

// Deep values would otherwise drop recursively.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach(&mut pending);
        while let Some(mut value) = pending.pop() {
            value.detach(&mut pending);
        }
    }
}

/// Structural equality.
///
/// Records compare by key set and values, lists elementwise, tagged values by
/// tag then payload. Closures are equal when they share body and scope,
/// partials when op and applied arguments match, resumptions only to
/// themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            let equal = match pair {
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Binary(a), Value::Binary(b)) => a == b,
                (Value::Record(a), Value::Record(b)) => {
                    if Rc::ptr_eq(a, b) {
                        continue;
                    }
                    if a.len() != b.len() {
                        return false;
                    }
                    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                        if ka != kb {
                            return false;
                        }
                        pending.push((va, vb));
                    }
                    true
                }
                (Value::List(a), Value::List(b)) => {
                    if a.same(b) {
                        continue;
                    }
                    if a.len() != b.len() {
                        return false;
                    }
                    pending.extend(a.iter().zip(b.iter()));
                    true
                }
                (
                    Value::Tagged { tag: t1, payload: p1 },
                    Value::Tagged { tag: t2, payload: p2 },
                ) => {
                    pending.push((&**p1, &**p2));
                    t1 == t2
                }
                (
                    Value::Closure { param: p1, body: b1, env: e1 },
                    Value::Closure { param: p2, body: b2, env: e2 },
                ) => p1 == p2 && Rc::ptr_eq(b1, b2) && e1.ptr_eq(e2),
                (
                    Value::Partial { op: o1, applied: a1 },
                    Value::Partial { op: o2, applied: a2 },
                ) => {
                    pending.extend(a1.iter().zip(a2.iter()));
                    o1 == o2 && a1.len() == a2.len()
                }
                (Value::Resume(a), Value::Resume(b)) => Rc::ptr_eq(a, b),
                _ => false,
            };
            if !equal {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Binary(bytes) => {
                write!(f, "<")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ">")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (label, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", label, value)?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Tagged { tag, payload } => write!(f, "{}({})", tag, payload),
            Value::Closure { param, .. } => write!(f, "<closure |{}|>", param),
            Value::Partial { op, applied } => {
                write!(f, "<{} {}/{}>", op, applied.len(), op.arity())
            }
            Value::Resume(resumption) => write!(f, "<resume {} frames>", resumption.depth()),
        }
    }
}

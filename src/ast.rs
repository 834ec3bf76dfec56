//! Expression tree consumed by the machine.
//!
//! Every node is one constructor of [`Expr`]. Children are reference counted
//! so closures and continuation frames can hold on to subtrees without
//! copying them.
//!
//! Dropping a tree is iterative, so programs of any depth can be discarded.
//! `PartialEq` and `Display` recurse and suit trees of modest depth.

use std::fmt;
use std::mem;
use std::rc::Rc;

pub type Label = String;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(Label),
    Lambda {
        param: Label,
        body: Rc<Expr>,
    },
    /// Function first, then argument.
    Apply {
        func: Rc<Expr>,
        arg: Rc<Expr>,
    },
    Let {
        label: Label,
        value: Rc<Expr>,
        then: Rc<Expr>,
    },

    // === Literals ===
    /// A hole left by an editor; evaluating it is fatal.
    Vacant,
    Int(i64),
    Str(String),
    Binary(Vec<u8>),

    // === Lists ===
    /// The empty list.
    Tail,
    /// `cons(item, list)`
    Cons,

    // === Records ===
    /// The empty record.
    Empty,
    /// `extend(value, record)` adds a field.
    Extend(Label),
    /// `overwrite(value, record)` replaces a field.
    Overwrite(Label),
    /// `select(record)` reads a field.
    Select(Label),

    // === Unions ===
    /// `tag(payload)`
    Tag(Label),
    /// `case(branch, otherwise, scrutinee)`
    Case(Label),
    /// Terminal arm of a case chain.
    NoCases,

    // === Effects ===
    /// `perform(lift)`
    Perform(Label),
    /// `handle(handler, thunk)`
    Handle(Label),

    Builtin(Label),
}

impl Expr {
    pub fn var(label: impl Into<Label>) -> Self {
        Expr::Var(label.into())
    }

    pub fn lambda(param: impl Into<Label>, body: Expr) -> Self {
        Expr::Lambda {
            param: param.into(),
            body: Rc::new(body),
        }
    }

    /// Curried lambda over several parameters: `|a, b| body`.
    pub fn lambdas<'a>(params: impl IntoIterator<Item = &'a str>, body: Expr) -> Self {
        let params: Vec<&str> = params.into_iter().collect();
        params
            .into_iter()
            .rev()
            .fold(body, |body, param| Expr::lambda(param, body))
    }

    pub fn apply(func: Expr, arg: Expr) -> Self {
        Expr::Apply {
            func: Rc::new(func),
            arg: Rc::new(arg),
        }
    }

    /// Nested unary application: `f(a, b)` is `f(a)(b)`.
    pub fn call(func: Expr, args: impl IntoIterator<Item = Expr>) -> Self {
        args.into_iter().fold(func, Expr::apply)
    }

    pub fn let_(label: impl Into<Label>, value: Expr, then: Expr) -> Self {
        Expr::Let {
            label: label.into(),
            value: Rc::new(value),
            then: Rc::new(then),
        }
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Str(s.into())
    }

    pub fn builtin(label: impl Into<Label>) -> Self {
        Expr::Builtin(label.into())
    }

    pub fn perform(label: impl Into<Label>) -> Self {
        Expr::Perform(label.into())
    }

    pub fn handle(label: impl Into<Label>) -> Self {
        Expr::Handle(label.into())
    }

    pub fn tag(label: impl Into<Label>) -> Self {
        Expr::Tag(label.into())
    }

    pub fn case(label: impl Into<Label>) -> Self {
        Expr::Case(label.into())
    }

    pub fn select(label: impl Into<Label>) -> Self {
        Expr::Select(label.into())
    }

    /// List literal built from `cons` and `tail`.
    pub fn list(items: impl IntoIterator<Item = Expr>) -> Self {
        let items: Vec<Expr> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Expr::Tail, |tail, item| Expr::call(Expr::Cons, [item, tail]))
    }

    /// Record literal built from `extend` over the empty record.
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Expr)>) -> Self {
        let fields: Vec<(&str, Expr)> = fields.into_iter().collect();
        fields.into_iter().rev().fold(Expr::Empty, |rest, (label, value)| {
            Expr::call(Expr::Extend(label.to_string()), [value, rest])
        })
    }

    /// `let _ = first in then`, the sequencing idiom.
    pub fn seq(first: Expr, then: Expr) -> Self {
        Expr::let_("_", first, then)
    }

    /// A one-argument thunk ignoring its argument.
    pub fn thunk(body: Expr) -> Self {
        Expr::lambda("_", body)
    }
}

impl Expr {
    /// Moves uniquely owned children into `pending`, leaving holes behind.
    fn detach(&mut self, pending: &mut Vec<Expr>) {
        let children = match self {
            Expr::Lambda { body, .. } => [Some(body), None],
            Expr::Apply { func, arg } => [Some(func), Some(arg)],
            Expr::Let { value, then, .. } => [Some(value), Some(then)],
            _ => return,
        };
        for child in children.into_iter().flatten() {
            if let Some(child) = Rc::get_mut(child) {
                pending.push(mem::replace(child, Expr::Vacant));
            }
        }
    }
}

// Long let chains and nested applications would otherwise drop recursively.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.detach(&mut pending);
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(label) => write!(f, "{}", label),
            Expr::Lambda { param, body } => write!(f, "(|{}| {})", param, body),
            Expr::Apply { func, arg } => write!(f, "{}({})", func, arg),
            Expr::Let { label, value, then } => write!(f, "let {} = {} in {}", label, value, then),
            Expr::Vacant => write!(f, "?"),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Expr::Tail => write!(f, "[]"),
            Expr::Cons => write!(f, "cons"),
            Expr::Empty => write!(f, "{{}}"),
            Expr::Extend(label) => write!(f, "+{}", label),
            Expr::Overwrite(label) => write!(f, ":={}", label),
            Expr::Select(label) => write!(f, ".{}", label),
            Expr::Tag(label) => write!(f, "{}", label),
            Expr::Case(label) => write!(f, "match {}", label),
            Expr::NoCases => write!(f, "nocases"),
            Expr::Perform(label) => write!(f, "perform {}", label),
            Expr::Handle(label) => write!(f, "handle {}", label),
            Expr::Builtin(label) => write!(f, "!{}", label),
        }
    }
}

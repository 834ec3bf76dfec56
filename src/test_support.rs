//! Test support for driving the machine from tests.
//!
//! This module provides:
//! - Shorthand constructors for common program shapes
//! - Evaluation helpers with and without host effects
//! - A recorder that captures every extrinsic call in order

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Expr;
use crate::config::MachineConfig;
use crate::driver::{run_with_config, Extrinsics};
use crate::errors::{Failure, MachineError};
use crate::value::Value;

// ============================================================================
// Program shorthands
// ============================================================================

/// `builtin(a)(b)...`
pub fn builtin_call(label: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::call(Expr::builtin(label), args)
}

pub fn int_add(a: Expr, b: Expr) -> Expr {
    builtin_call("int_add", [a, b])
}

/// `perform label(lift)`
pub fn perform(label: &str, lift: Expr) -> Expr {
    Expr::apply(Expr::perform(label), lift)
}

/// `handle label(handler, thunk)` where `handler = |lift, resume| body`.
pub fn handle(label: &str, lift: &str, resume: &str, handler_body: Expr, body: Expr) -> Expr {
    Expr::call(
        Expr::handle(label),
        [Expr::lambdas([lift, resume], handler_body), Expr::thunk(body)],
    )
}

/// `resume(value)`
pub fn resume(name: &str, value: Expr) -> Expr {
    Expr::apply(Expr::var(name), value)
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate with no host effects.
pub fn eval(expr: Expr) -> Result<Value, Failure> {
    eval_with(expr, &mut Extrinsics::new())
}

pub fn eval_with(expr: Expr, extrinsics: &mut Extrinsics) -> Result<Value, Failure> {
    run_with_config(expr, extrinsics, MachineConfig::default())
}

pub fn eval_config(expr: Expr, config: MachineConfig) -> Result<Value, Failure> {
    run_with_config(expr, &mut Extrinsics::new(), config)
}

/// Evaluate and panic with context unless a value comes back.
pub fn eval_ok(expr: Expr) -> Value {
    let printed = expr.to_string();
    match eval(expr) {
        Ok(value) => value,
        Err(failure) => panic!("evaluating {} failed: {}", printed, failure),
    }
}

/// Evaluate and return the fatal error, panicking on any other outcome.
pub fn eval_fatal(expr: Expr) -> MachineError {
    match eval(expr) {
        Err(Failure::Fatal(error)) => error,
        other => panic!("expected a fatal error, got {:?}", other),
    }
}

// ============================================================================
// Recording extrinsics
// ============================================================================

/// Captures every `(label, lift)` passed to its extrinsics.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<(String, Value)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label` on `extrinsics`, replying with `reply` each time.
    pub fn answer(&self, extrinsics: Extrinsics, label: &str, reply: Value) -> Extrinsics {
        let calls = self.calls.clone();
        let name = label.to_string();
        extrinsics.with(label, move |lift| {
            calls.borrow_mut().push((name.clone(), lift));
            Ok(reply.clone())
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.borrow().clone()
    }

    pub fn lifts(&self, label: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, lift)| lift.clone())
            .collect()
    }
}

//! Host-side driver.
//!
//! Runs a [`Machine`] to completion, answering every effect that escapes the
//! program with a host function registered under the same label.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::ast::Expr;
use crate::config::MachineConfig;
use crate::errors::Failure;
use crate::machine::{Break, Machine};
use crate::value::Value;

/// A host effect handler. The reply becomes the value of the `perform`.
pub type Extrinsic = Box<dyn FnMut(Value) -> Result<Value, String>>;

/// Host effect handlers keyed by label.
#[derive(Default)]
pub struct Extrinsics {
    handlers: HashMap<String, Extrinsic>,
}

impl Extrinsics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Log` prints a string lift to stdout and replies with unit.
    pub fn console() -> Self {
        Self::new().with("Log", |lift| match lift.as_str() {
            Some(message) => {
                println!("{}", message);
                Ok(Value::unit())
            }
            None => Err(format!("Log expected a String, got {}", lift.type_name())),
        })
    }

    pub fn with(
        mut self,
        label: impl Into<String>,
        handler: impl FnMut(Value) -> Result<Value, String> + 'static,
    ) -> Self {
        self.insert(label, handler);
        self
    }

    pub fn insert(
        &mut self,
        label: impl Into<String>,
        handler: impl FnMut(Value) -> Result<Value, String> + 'static,
    ) {
        self.handlers.insert(label.into(), Box::new(handler));
    }

    pub fn contains(&self, label: &str) -> bool {
        self.handlers.contains_key(label)
    }

    fn dispatch(&mut self, label: &str, lift: Value) -> Result<Value, Failure> {
        let Some(handler) = self.handlers.get_mut(label) else {
            return Err(Failure::UnhandledEffect {
                label: label.to_string(),
                lift,
            });
        };
        debug!(label, %lift, "dispatching extrinsic");
        handler(lift).map_err(|message| Failure::Extrinsic {
            label: label.to_string(),
            message,
        })
    }
}

impl fmt::Debug for Extrinsics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        labels.sort_unstable();
        f.debug_struct("Extrinsics").field("labels", &labels).finish()
    }
}

/// Evaluate `expr`, answering escaped effects from `extrinsics`.
pub fn run(expr: Expr, extrinsics: &mut Extrinsics) -> Result<Value, Failure> {
    run_with_config(expr, extrinsics, MachineConfig::default())
}

pub fn run_with_config(
    expr: Expr,
    extrinsics: &mut Extrinsics,
    config: MachineConfig,
) -> Result<Value, Failure> {
    let mut machine = Machine::with_config(expr, config);
    loop {
        match machine.run() {
            Ok(value) => return Ok(value),
            Err(Break::Fatal(error)) => return Err(Failure::Fatal(error)),
            Err(Break::Effect { label, lift }) => {
                let reply = extrinsics.dispatch(&label, lift)?;
                machine.resume(reply)?;
            }
        }
    }
}

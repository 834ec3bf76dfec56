//! JSON fixture suites.
//!
//! A suite is an array of cases. Each case gives an IR `source`, the effects
//! it is expected to perform in order (with the reply to feed back), and
//! either the expected final `value` or the expected `break`:
//!
//! ```json
//! [{
//!   "name": "ask twice",
//!   "source": {"0": "a", "f": {"0": "p", "l": "Ask"}, "a": {"0": "u"}},
//!   "effects": [{"label": "Ask", "lift": {"record": {}}, "reply": {"integer": 1}}],
//!   "value": {"integer": 1}
//! }]
//! ```
//!
//! Expected values use single-key wrappers: `integer`, `string`, `binary`,
//! `list`, `record` and `tagged` (`{"label", "value"}`). An expected break is
//! an object whose key is the error code, e.g. `{"UndefinedVariable": "x"}`.

use std::mem;

use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MachineConfig;
use crate::ir;
use crate::machine::{Break, Machine};
use crate::value::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Case {
    pub name: String,
    pub source: Json,
    #[serde(default)]
    pub effects: Vec<ExpectedEffect>,
    #[serde(default)]
    pub value: Option<Json>,
    #[serde(default, rename = "break")]
    pub expected_break: Option<Json>,
}

// Sources can nest deeper than a recursive drop allows.
impl Drop for Case {
    fn drop(&mut self) {
        ir::discard(mem::take(&mut self.source));
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedEffect {
    pub label: String,
    pub lift: Json,
    pub reply: Json,
}

/// Why a case did not pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseFailure {
    #[error("bad fixture: {0}")]
    Fixture(String),
    #[error("expected effect {expected} but {actual}")]
    MissingEffect { expected: String, actual: String },
    #[error("effect {label}: expected lift {expected}, got {actual}")]
    LiftMismatch {
        label: String,
        expected: Value,
        actual: Value,
    },
    #[error("expected {expected}, got {actual}")]
    ValueMismatch { expected: Value, actual: Value },
    #[error("expected break {expected}, got {actual}")]
    BreakMismatch { expected: String, actual: String },
}

#[derive(Debug, Default)]
pub struct Report {
    pub passed: usize,
    pub failed: Vec<(String, CaseFailure)>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed.len()
    }
}

pub fn load(text: &str) -> Result<Vec<Case>, serde_json::Error> {
    ir::read(text)
}

pub fn run_suite(cases: &[Case], config: &MachineConfig) -> Report {
    let mut report = Report::default();
    for case in cases {
        match run_case(case, config) {
            Ok(()) => {
                debug!(name = %case.name, "case passed");
                report.passed += 1;
            }
            Err(failure) => {
                warn!(name = %case.name, %failure, "case failed");
                report.failed.push((case.name.clone(), failure));
            }
        }
    }
    report
}

pub fn run_case(case: &Case, config: &MachineConfig) -> Result<(), CaseFailure> {
    if case.value.is_none() && case.expected_break.is_none() {
        return Err(CaseFailure::Fixture(format!(
            "case {:?} expects neither a value nor a break",
            case.name
        )));
    }
    let source = ir::decode(&case.source).map_err(|e| CaseFailure::Fixture(e.to_string()))?;
    let mut machine = Machine::with_config(source, config.clone());
    let mut outcome = machine.run();

    for effect in &case.effects {
        match outcome {
            Err(Break::Effect { label, lift }) if label == effect.label => {
                let expected = fixture_value(&effect.lift)?;
                if lift != expected {
                    return Err(CaseFailure::LiftMismatch {
                        label,
                        expected,
                        actual: lift,
                    });
                }
                machine
                    .resume(fixture_value(&effect.reply)?)
                    .map_err(|e| CaseFailure::Fixture(e.to_string()))?;
                outcome = machine.run();
            }
            other => {
                return Err(CaseFailure::MissingEffect {
                    expected: effect.label.clone(),
                    actual: describe(&other),
                })
            }
        }
    }

    if let Some(expected) = &case.expected_break {
        let (code, subject) = expected_break(expected)?;
        let matches = match &outcome {
            Err(Break::Fatal(error)) => {
                error.code() == code
                    && subject.map_or(true, |s| s.is_empty() || error.subject() == Some(s))
            }
            Err(Break::Effect { label, .. }) => {
                code == "UnhandledEffect" && subject.map_or(true, |s| s == label)
            }
            Ok(_) => false,
        };
        if !matches {
            return Err(CaseFailure::BreakMismatch {
                expected: expected.to_string(),
                actual: describe(&outcome),
            });
        }
        return Ok(());
    }

    match (outcome, &case.value) {
        (Ok(actual), Some(expected)) => {
            let expected = fixture_value(expected)?;
            if actual == expected {
                Ok(())
            } else {
                Err(CaseFailure::ValueMismatch { expected, actual })
            }
        }
        (outcome, _) => Err(CaseFailure::BreakMismatch {
            expected: "a value".to_string(),
            actual: describe(&outcome),
        }),
    }
}

fn describe(outcome: &Result<Value, Break>) -> String {
    match outcome {
        Ok(value) => format!("value {}", value),
        Err(Break::Fatal(error)) => format!("{} ({})", error.code(), error),
        Err(Break::Effect { label, lift }) => format!("effect {}({})", label, lift),
    }
}

fn expected_break(json: &Json) -> Result<(&str, Option<&str>), CaseFailure> {
    let entry = json
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.iter().next());
    match entry {
        Some((code, subject)) => Ok((code.as_str(), subject.as_str())),
        None => Err(CaseFailure::Fixture(format!(
            "break must be a single-key object, got {}",
            json
        ))),
    }
}

/// Decode an expected value written with fixture wrappers.
pub fn fixture_value(json: &Json) -> Result<Value, CaseFailure> {
    let bad = || CaseFailure::Fixture(format!("not a fixture value: {}", json));
    let object = json.as_object().ok_or_else(bad)?;
    let (kind, inner) = match object.iter().next() {
        Some(entry) if object.len() == 1 => entry,
        _ => return Err(bad()),
    };

    match kind.as_str() {
        "integer" => inner.as_i64().map(Value::Int).ok_or_else(bad),
        "string" => inner.as_str().map(Value::string).ok_or_else(bad),
        "binary" => ir::bytes(inner).map(Value::binary).map_err(CaseFailure::Fixture),
        "list" => inner
            .as_array()
            .ok_or_else(bad)?
            .iter()
            .map(fixture_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::list),
        "record" => inner
            .as_object()
            .ok_or_else(bad)?
            .iter()
            .map(|(label, value)| Ok((label.clone(), fixture_value(value)?)))
            .collect::<Result<Vec<_>, CaseFailure>>()
            .map(Value::record),
        "tagged" => {
            let label = inner.get("label").and_then(Json::as_str).ok_or_else(bad)?;
            let value = inner.get("value").ok_or_else(bad)?;
            Ok(Value::tagged(label, fixture_value(value)?))
        }
        _ => Err(bad()),
    }
}

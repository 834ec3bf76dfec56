//! Error taxonomy for the machine and its driver.
//!
//! Two layers:
//! - [`MachineError`]: fatal conditions raised while stepping (undefined
//!   names, type mismatches, malformed input). Stepping halts immediately.
//! - [`Failure`]: what the external driver reports to the host. It wraps a
//!   `MachineError` or describes an effect nobody handled.
//!
//! Recoverable domain errors (division by zero, failed parses) are not here:
//! they are ordinary `Error` tagged values the program branches on.

use thiserror::Error;

use crate::builtins::Builtin;
use crate::value::Value;

/// A fatal condition that stops the machine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MachineError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("undefined builtin: {0}{hint}", hint = format_suggestions(&Builtin::suggest(.0)))]
    UndefinedBuiltin(String),
    #[error("{operation}: expected {expected}, got {found}")]
    ArityOrTypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },
    #[error("cannot call a value of type {0}")]
    NotAFunction(&'static str),
    #[error("record has no field {0}")]
    MissingField(String),
    #[error("no case matched {0}")]
    NoCasesMatched(String),
    #[error("reached a vacant expression")]
    Vacant,
    #[error("integer overflow in {0}")]
    IntegerOverflow(&'static str),
    #[error("resumption already used")]
    ResumeReused,
    #[error("step limit of {0} exceeded")]
    StepLimitExceeded(u64),
    #[error("malformed expression: {0}")]
    Malformed(String),
    #[error("machine is not suspended on an effect")]
    NotSuspended,
    #[error("machine has already halted")]
    Halted,
}

impl MachineError {
    pub(crate) fn mismatch(operation: impl Into<String>, expected: impl Into<String>, found: &Value) -> Self {
        MachineError::ArityOrTypeMismatch {
            operation: operation.into(),
            expected: expected.into(),
            found: found.type_name().to_string(),
        }
    }

    /// Stable identifier used by fixture suites to name the expected break.
    pub fn code(&self) -> &'static str {
        match self {
            MachineError::UndefinedVariable(_) => "UndefinedVariable",
            MachineError::UndefinedBuiltin(_) => "UndefinedBuiltin",
            MachineError::ArityOrTypeMismatch { .. } => "ArityOrTypeMismatch",
            MachineError::NotAFunction(_) => "NotAFunction",
            MachineError::MissingField(_) => "MissingField",
            MachineError::NoCasesMatched(_) => "NoCasesMatched",
            MachineError::Vacant => "NotImplemented",
            MachineError::IntegerOverflow(_) => "IntegerOverflow",
            MachineError::ResumeReused => "ResumeReused",
            MachineError::StepLimitExceeded(_) => "StepLimitExceeded",
            MachineError::Malformed(_) => "Malformed",
            MachineError::NotSuspended => "NotSuspended",
            MachineError::Halted => "Halted",
        }
    }

    /// The name or label the error is about, when it has one.
    pub fn subject(&self) -> Option<&str> {
        match self {
            MachineError::UndefinedVariable(name)
            | MachineError::UndefinedBuiltin(name)
            | MachineError::MissingField(name) => Some(name),
            _ => None,
        }
    }
}

/// Terminal failure reported by the external driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Failure {
    #[error(transparent)]
    Fatal(#[from] MachineError),
    #[error("unhandled effect {label}({lift})")]
    UnhandledEffect { label: String, lift: Value },
    #[error("extrinsic {label} failed: {message}")]
    Extrinsic { label: String, message: String },
}

// ============================================================================
// "Did you mean?" suggestions
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}

/// Find up to three candidates within `max_distance` edits of `name`,
/// closest first.
pub fn find_similar<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    max_distance: usize,
) -> Vec<String> {
    let mut suggestions: Vec<(&str, usize)> = candidates
        .into_iter()
        .filter_map(|c| {
            let dist = levenshtein_distance(name, c);
            (dist > 0 && dist <= max_distance).then_some((c, dist))
        })
        .collect();

    suggestions.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
    suggestions.into_iter().take(3).map(|(s, _)| s.to_string()).collect()
}

fn format_suggestions(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [one] => format!(" (did you mean {}?)", one),
        many => format!(" (did you mean one of {}?)", many.join(", ")),
    }
}

//! Effect dispatch and resumable continuations.
//!
//! `perform` leaves the stack untouched and reports the effect. Resolution
//! then looks for the nearest `Delimit` frame with the same label:
//!
//! - found: the delimiter and every frame above it become a [`Resumption`],
//!   the stack is cut back to the frames below the delimiter, and the handler
//!   is called as `handler(lift)(resume)`;
//! - not found: the effect escapes to the host with the whole stack intact.
//!
//! The delimiter travels with the resumption, so resuming reinstalls the
//! handler around the rest of the computation (deep handlers). While the
//! handler body itself runs the delimiter is gone, so an effect performed
//! there reaches the next enclosing handler.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::config::ResumePolicy;
use crate::errors::MachineError;
use crate::machine::State;
use crate::stack::{Frame, Stack};
use crate::value::Value;

/// A captured slice of the stack, callable as a function.
#[derive(Debug)]
pub struct Resumption {
    /// Bottom first; the delimiter that captured them is `frames[0]`.
    frames: Vec<Frame>,
    policy: ResumePolicy,
    used: Cell<bool>,
}

impl Resumption {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Label of the handler this continuation reinstalls.
    pub fn label(&self) -> Option<&str> {
        match self.frames.first() {
            Some(Frame::Delimit { label, .. }) => Some(label),
            _ => None,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.policy == ResumePolicy::OneShot && self.used.get()
    }

    /// Push the captured frames back on top of `stack`.
    pub(crate) fn reinstate(&self, stack: &mut Stack) -> Result<(), MachineError> {
        if self.policy == ResumePolicy::OneShot && self.used.replace(true) {
            return Err(MachineError::ResumeReused);
        }
        trace!(label = ?self.label(), depth = self.depth(), "resuming continuation");
        stack.extend(self.frames.iter().cloned());
        Ok(())
    }
}

pub enum Resolution {
    /// A handler in the program takes over.
    Handled(State),
    /// No enclosing handler; the host has to answer.
    Escaped { lift: Value, stack: Stack },
}

pub fn resolve(label: &str, lift: Value, mut stack: Stack, policy: ResumePolicy) -> Resolution {
    let found = stack
        .find_delimiter(label)
        .map(|(at, handler)| (at, handler.clone()));
    let Some((at, handler)) = found else {
        trace!(label, "effect escapes to host");
        return Resolution::Escaped { lift, stack };
    };

    let frames = stack.split_off(at);
    trace!(label, captured = frames.len(), remaining = stack.len(), "effect handled");

    let resume = Value::Resume(Rc::new(Resumption {
        frames,
        policy,
        used: Cell::new(false),
    }));
    stack.push(Frame::Call { arg: resume });
    stack.push(Frame::Call { arg: lift });
    Resolution::Handled(State::Apply {
        value: handler,
        stack,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with_handler(label: &str) -> Stack {
        let mut stack = Stack::new();
        stack.push(Frame::Call { arg: Value::Int(0) });
        stack.push(Frame::Delimit {
            label: label.into(),
            handler: Value::string("handler"),
        });
        stack.push(Frame::Call { arg: Value::Int(1) });
        stack
    }

    #[test]
    fn test_unmatched_effect_escapes_with_stack() {
        match resolve("Alert", Value::Int(5), stack_with_handler("Log"), ResumePolicy::OneShot) {
            Resolution::Escaped { lift, stack } => {
                assert_eq!(lift, Value::Int(5));
                assert_eq!(stack.len(), 3);
            }
            Resolution::Handled(_) => panic!("no handler for Alert"),
        }
    }

    #[test]
    fn test_matched_effect_calls_handler_with_lift_then_resume() {
        match resolve("Log", Value::Int(5), stack_with_handler("Log"), ResumePolicy::OneShot) {
            Resolution::Handled(State::Apply { value, stack }) => {
                assert_eq!(value, Value::string("handler"));
                let frames = stack.frames();
                assert_eq!(frames.len(), 3);
                assert!(matches!(&frames[2], Frame::Call { arg } if *arg == Value::Int(5)));
                match &frames[1] {
                    Frame::Call { arg: Value::Resume(resumption) } => {
                        assert_eq!(resumption.depth(), 2);
                        assert_eq!(resumption.label(), Some("Log"));
                    }
                    other => panic!("expected resume frame, got {:?}", other),
                }
            }
            _ => panic!("Log is handled"),
        }
    }

    #[test]
    fn test_one_shot_resumption() {
        let resumption = Resumption {
            frames: vec![],
            policy: ResumePolicy::OneShot,
            used: Cell::new(false),
        };
        let mut stack = Stack::new();
        assert!(resumption.reinstate(&mut stack).is_ok());
        assert!(resumption.is_spent());
        assert_eq!(resumption.reinstate(&mut stack), Err(MachineError::ResumeReused));
    }

    #[test]
    fn test_multi_shot_resumption() {
        let resumption = Resumption {
            frames: vec![Frame::Call { arg: Value::unit() }],
            policy: ResumePolicy::MultiShot,
            used: Cell::new(false),
        };
        let mut stack = Stack::new();
        assert!(resumption.reinstate(&mut stack).is_ok());
        assert!(resumption.reinstate(&mut stack).is_ok());
        assert_eq!(stack.len(), 2);
        assert!(!resumption.is_spent());
    }
}

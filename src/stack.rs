//! Defunctionalized continuation stack.
//!
//! Each frame records "what to do next" with the value currently in control.
//! The stack is strictly LIFO; frames above a `Delimit` can be split off and
//! captured without touching the frames below it.

use std::rc::Rc;

use crate::ast::{Expr, Label};
use crate::env::Env;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Frame {
    /// Function evaluated; evaluate the argument next.
    Arg { arg: Rc<Expr>, env: Env },
    /// Argument evaluated; call `func` with it.
    Apply { func: Value },
    /// The incoming value is a function; call it with `arg`.
    Call { arg: Value },
    /// Bind the incoming value to `label` and continue with `then`.
    Assign {
        label: Label,
        then: Rc<Expr>,
        env: Env,
    },
    /// Boundary installed by `handle`. Transparent to normal returns.
    Delimit { label: Label, handler: Value },
}

impl Frame {
    pub fn is_delimiter_for(&self, effect: &str) -> bool {
        matches!(self, Frame::Delimit { label, .. } if label == effect)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Frames bottom first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Index (from the bottom) and handler of the nearest `Delimit` for `label`.
    pub fn find_delimiter(&self, label: &str) -> Option<(usize, &Value)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, frame)| match frame {
                Frame::Delimit { label: l, handler } if l == label => Some((i, handler)),
                _ => None,
            })
    }

    /// Remove and return the frames from `at` upward, bottom first.
    pub fn split_off(&mut self, at: usize) -> Vec<Frame> {
        self.frames.split_off(at)
    }
}

impl Extend<Frame> for Stack {
    fn extend<I: IntoIterator<Item = Frame>>(&mut self, iter: I) {
        self.frames.extend(iter);
    }
}

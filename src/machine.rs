//! The abstract machine.
//!
//! A state is either evaluating an expression or returning a value to the
//! top of the stack. [`step`] performs exactly one transition and never
//! recurses on the host stack, so program depth is bounded by heap alone.
//!
//! ```text
//! Eval(expr, env, k)   -- evaluate expr, result goes to k
//! Apply(value, k)      -- pop a frame of k and feed it value
//! ```
//!
//! [`Machine`] drives `step` in a loop, resolves effects against the
//! program's own handlers, and suspends when an effect has none.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{Expr, Label};
use crate::builtins::{self, Builtin, Op, Reduction};
use crate::config::MachineConfig;
use crate::effects::{self, Resolution};
use crate::env::Env;
use crate::errors::MachineError;
use crate::stack::{Frame, Stack};
use crate::value::Value;

/// Machine state - either evaluating an expression or returning a value
#[derive(Debug, Clone)]
pub enum State {
    /// Evaluate an expression in an environment
    Eval { expr: Rc<Expr>, env: Env, stack: Stack },
    /// Return a value to the top frame
    Apply { value: Value, stack: Stack },
}

impl State {
    /// Initial state for a closed program.
    pub fn start(expr: Rc<Expr>) -> Self {
        State::Eval {
            expr,
            env: Env::new(),
            stack: Stack::new(),
        }
    }
}

/// Result of a single step
#[derive(Debug)]
pub enum Step {
    /// Keep stepping with this new state
    Continue(State),
    /// The stack is empty and control holds the final value
    Done(Value),
    /// `perform` was called; the stack is exactly as it was
    Effect {
        label: Label,
        lift: Value,
        stack: Stack,
    },
    Fatal(MachineError),
}

/// Execute a single step of the machine
pub fn step(state: State) -> Step {
    match state {
        State::Eval { expr, env, stack } => step_eval(&expr, env, stack),
        State::Apply { value, stack } => step_apply(value, stack),
    }
}

fn step_eval(expr: &Expr, env: Env, mut stack: Stack) -> Step {
    let value = match expr {
        Expr::Var(label) => match env.lookup(label) {
            Some(value) => value.clone(),
            None => return Step::Fatal(MachineError::UndefinedVariable(label.clone())),
        },
        Expr::Lambda { param, body } => Value::Closure {
            param: param.clone(),
            body: body.clone(),
            env,
        },
        Expr::Apply { func, arg } => {
            stack.push(Frame::Arg {
                arg: arg.clone(),
                env: env.clone(),
            });
            return Step::Continue(State::Eval {
                expr: func.clone(),
                env,
                stack,
            });
        }
        Expr::Let { label, value, then } => {
            stack.push(Frame::Assign {
                label: label.clone(),
                then: then.clone(),
                env: env.clone(),
            });
            return Step::Continue(State::Eval {
                expr: value.clone(),
                env,
                stack,
            });
        }
        Expr::Vacant => return Step::Fatal(MachineError::Vacant),
        Expr::Int(n) => Value::Int(*n),
        Expr::Str(s) => Value::string(s),
        Expr::Binary(bytes) => Value::binary(bytes),
        Expr::Tail => Value::list([]),
        Expr::Cons => Value::partial(Op::Cons),
        Expr::Empty => Value::unit(),
        Expr::Extend(label) => Value::partial(Op::Extend(label.clone())),
        Expr::Overwrite(label) => Value::partial(Op::Overwrite(label.clone())),
        Expr::Select(label) => Value::partial(Op::Select(label.clone())),
        Expr::Tag(label) => Value::partial(Op::Tag(label.clone())),
        Expr::Case(label) => Value::partial(Op::Case(label.clone())),
        Expr::NoCases => Value::partial(Op::NoCases),
        Expr::Perform(label) => Value::partial(Op::Perform(label.clone())),
        Expr::Handle(label) => Value::partial(Op::Handle(label.clone())),
        Expr::Builtin(label) => match Builtin::lookup(label) {
            Ok(builtin) => Value::partial(Op::Builtin(builtin)),
            Err(error) => return Step::Fatal(error),
        },
    };
    Step::Continue(State::Apply { value, stack })
}

fn step_apply(value: Value, mut stack: Stack) -> Step {
    let frame = match stack.pop() {
        Some(frame) => frame,
        None => return Step::Done(value),
    };

    match frame {
        Frame::Arg { arg, env } => {
            stack.push(Frame::Apply { func: value });
            Step::Continue(State::Eval {
                expr: arg,
                env,
                stack,
            })
        }
        Frame::Apply { func } => call(func, value, stack),
        Frame::Call { arg } => call(value, arg, stack),
        Frame::Assign { label, then, env } => Step::Continue(State::Eval {
            expr: then,
            env: env.bind(label, value),
            stack,
        }),
        // A normal return passes straight through the handler boundary.
        Frame::Delimit { .. } => Step::Continue(State::Apply { value, stack }),
    }
}

fn call(mut func: Value, arg: Value, mut stack: Stack) -> Step {
    match &mut func {
        Value::Closure { param, body, env } => Step::Continue(State::Eval {
            expr: Rc::clone(body),
            env: env.bind(param.clone(), arg),
            stack,
        }),
        Value::Partial { op, applied } => {
            let mut applied = std::mem::take(applied);
            applied.push(arg);
            if applied.len() < op.arity() {
                return Step::Continue(State::Apply {
                    value: Value::Partial {
                        op: op.clone(),
                        applied,
                    },
                    stack,
                });
            }
            match builtins::invoke(op, applied) {
                Ok(reduction) => reduce(reduction, stack),
                Err(error) => Step::Fatal(error),
            }
        }
        Value::Resume(resumption) => match resumption.reinstate(&mut stack) {
            Ok(()) => Step::Continue(State::Apply { value: arg, stack }),
            Err(error) => Step::Fatal(error),
        },
        other => Step::Fatal(MachineError::NotAFunction(other.type_name())),
    }
}

fn reduce(reduction: Reduction, mut stack: Stack) -> Step {
    match reduction {
        Reduction::Value(value) => Step::Continue(State::Apply { value, stack }),
        // Routed through frames so nested primitive calls never recurse here.
        Reduction::Call { func, arg, then } => {
            stack.extend(then);
            stack.push(Frame::Call { arg });
            Step::Continue(State::Apply { value: func, stack })
        }
        Reduction::Perform { label, lift } => Step::Effect { label, lift, stack },
    }
}

// ============================================================================
// Driving the machine
// ============================================================================

/// Why [`Machine::run`] stopped without a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Break {
    Fatal(MachineError),
    /// No handler in the program; answer with [`Machine::resume`].
    Effect { label: Label, lift: Value },
}

impl From<MachineError> for Break {
    fn from(error: MachineError) -> Self {
        Break::Fatal(error)
    }
}

enum Status {
    Ready(State),
    Suspended {
        label: Label,
        lift: Value,
        stack: Stack,
    },
    Halted,
}

pub struct Machine {
    status: Status,
    config: MachineConfig,
    steps: u64,
}

impl Machine {
    pub fn new(expr: impl Into<Rc<Expr>>) -> Self {
        Self::with_config(expr, MachineConfig::default())
    }

    pub fn with_config(expr: impl Into<Rc<Expr>>, config: MachineConfig) -> Self {
        Machine {
            status: Status::Ready(State::start(expr.into())),
            config,
            steps: 0,
        }
    }

    /// Steps taken so far, across every resume.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.status, Status::Suspended { .. })
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, Status::Halted)
    }

    /// Run until the program finishes, fails, or performs an effect
    /// nobody in the program handles.
    pub fn run(&mut self) -> Result<Value, Break> {
        let mut state = match std::mem::replace(&mut self.status, Status::Halted) {
            Status::Ready(state) => state,
            Status::Suspended { label, lift, stack } => {
                let pending = Break::Effect {
                    label: label.clone(),
                    lift: lift.clone(),
                };
                self.status = Status::Suspended { label, lift, stack };
                return Err(pending);
            }
            Status::Halted => return Err(Break::Fatal(MachineError::Halted)),
        };

        loop {
            if let Some(limit) = self.config.step_limit {
                if self.steps >= limit {
                    debug!(limit, "step limit reached");
                    return Err(Break::Fatal(MachineError::StepLimitExceeded(limit)));
                }
            }
            self.steps += 1;

            match step(state) {
                Step::Continue(next) => state = next,
                Step::Done(value) => {
                    trace!(steps = self.steps, "machine finished");
                    return Ok(value);
                }
                Step::Fatal(error) => {
                    debug!(%error, steps = self.steps, "machine failed");
                    return Err(Break::Fatal(error));
                }
                Step::Effect { label, lift, stack } => {
                    match effects::resolve(&label, lift, stack, self.config.resume_policy) {
                        Resolution::Handled(next) => state = next,
                        Resolution::Escaped { lift, stack } => {
                            self.status = Status::Suspended {
                                label: label.clone(),
                                lift: lift.clone(),
                                stack,
                            };
                            return Err(Break::Effect { label, lift });
                        }
                    }
                }
            }
        }
    }

    /// Answer a suspended effect: `reply` becomes the value of the `perform`.
    pub fn resume(&mut self, reply: Value) -> Result<(), MachineError> {
        match std::mem::replace(&mut self.status, Status::Halted) {
            Status::Suspended { stack, .. } => {
                self.status = Status::Ready(State::Apply {
                    value: reply,
                    stack,
                });
                Ok(())
            }
            other => {
                self.status = other;
                Err(MachineError::NotSuspended)
            }
        }
    }
}

/// Evaluate a closed program with no host effects.
pub fn eval(expr: Expr) -> Result<Value, Break> {
    Machine::new(expr).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: Expr, b: Expr) -> Expr {
        Expr::call(Expr::builtin("int_add"), [a, b])
    }

    #[test]
    fn test_identity() {
        let expr = Expr::apply(Expr::lambda("x", Expr::var("x")), Expr::int(5));
        assert_eq!(eval(expr), Ok(Value::Int(5)));
    }

    #[test]
    fn test_let_binds_in_body() {
        let expr = Expr::let_("x", Expr::int(2), add(Expr::var("x"), Expr::var("x")));
        assert_eq!(eval(expr), Ok(Value::Int(4)));
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            eval(Expr::var("nope")),
            Err(Break::Fatal(MachineError::UndefinedVariable("nope".into())))
        );
    }

    #[test]
    fn test_partial_application_is_a_value() {
        let expr = Expr::apply(Expr::builtin("int_add"), Expr::int(1));
        match &eval(expr) {
            Ok(Value::Partial { op, applied }) => {
                assert_eq!(op, &Op::Builtin(Builtin::IntAdd));
                assert_eq!(applied, &vec![Value::Int(1)]);
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_calling_an_integer() {
        let expr = Expr::apply(Expr::int(1), Expr::int(2));
        assert_eq!(
            eval(expr),
            Err(Break::Fatal(MachineError::NotAFunction("Integer")))
        );
    }

    #[test]
    fn test_step_is_single_transition() {
        let state = State::start(Rc::new(Expr::apply(Expr::var("f"), Expr::int(1))));
        match step(state) {
            Step::Continue(State::Eval { expr, stack, .. }) => {
                assert_eq!(*expr, Expr::var("f"));
                assert_eq!(stack.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_escaped_effect_suspends_and_resumes() {
        let expr = add(Expr::int(1), Expr::apply(Expr::perform("Ask"), Expr::Empty));
        let mut machine = Machine::new(expr);

        assert_eq!(
            machine.run(),
            Err(Break::Effect {
                label: "Ask".into(),
                lift: Value::unit()
            })
        );
        assert!(machine.is_suspended());
        machine.resume(Value::Int(41)).unwrap();
        assert_eq!(machine.run(), Ok(Value::Int(42)));
        assert!(machine.is_halted());
        assert_eq!(machine.resume(Value::unit()), Err(MachineError::NotSuspended));
        assert_eq!(machine.run(), Err(Break::Fatal(MachineError::Halted)));
    }

    #[test]
    fn test_step_limit() {
        let spin = Expr::lambda("f", Expr::apply(Expr::var("f"), Expr::var("f")));
        let expr = Expr::apply(spin.clone(), spin);
        let mut machine = Machine::with_config(expr, MachineConfig::new().with_step_limit(500));
        assert_eq!(
            machine.run(),
            Err(Break::Fatal(MachineError::StepLimitExceeded(500)))
        );
        assert_eq!(machine.steps(), 500);
    }

    #[test]
    fn test_deep_let_chain_runs_in_constant_host_stack() {
        let mut expr = Expr::var("x");
        for _ in 0..1_000 {
            expr = Expr::let_("x", add(Expr::var("x"), Expr::int(1)), expr);
        }
        let expr = Expr::let_("x", Expr::int(0), expr);
        assert_eq!(eval(expr), Ok(Value::Int(1_000)));
    }
}

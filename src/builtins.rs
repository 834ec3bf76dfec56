//! Primitive operations.
//!
//! Every primitive is an [`Op`] with a fixed arity. Evaluating one yields a
//! `Partial` with no arguments; the stepper appends one argument per call and
//! calls [`invoke`] once the arity is reached. Most operations produce a value
//! directly. The few that must run user code (`case`, `handle`, `fix`, the
//! folds) return a [`Reduction::Call`] with the frames that should receive the
//! result, so the host stack never grows with the program.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::ast::Label;
use crate::errors::{find_similar, MachineError};
use crate::stack::Frame;
use crate::value::{Shared, Value};

/// Builtin functions reachable through `Expr::Builtin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Equal,
    Fix,
    /// The unrolled form of `fix`: `fixed(f, x) = f(fixed(f), x)`.
    Fixed,
    IntCompare,
    IntAdd,
    IntSubtract,
    IntMultiply,
    IntDivide,
    IntAbsolute,
    IntParse,
    IntToString,
    StringAppend,
    StringSplit,
    StringSplitOnce,
    StringReplace,
    StringUppercase,
    StringLowercase,
    StringStartsWith,
    StringEndsWith,
    StringLength,
    StringToBinary,
    StringFromBinary,
    ListPop,
    ListFold,
    BinaryFromIntegers,
    BinaryFold,
}

impl Builtin {
    pub fn arity(self) -> usize {
        match self {
            Builtin::Fix
            | Builtin::IntAbsolute
            | Builtin::IntParse
            | Builtin::IntToString
            | Builtin::StringUppercase
            | Builtin::StringLowercase
            | Builtin::StringLength
            | Builtin::StringToBinary
            | Builtin::StringFromBinary
            | Builtin::ListPop
            | Builtin::BinaryFromIntegers => 1,
            Builtin::Equal
            | Builtin::Fixed
            | Builtin::IntCompare
            | Builtin::IntAdd
            | Builtin::IntSubtract
            | Builtin::IntMultiply
            | Builtin::IntDivide
            | Builtin::StringAppend
            | Builtin::StringSplit
            | Builtin::StringSplitOnce
            | Builtin::StringStartsWith
            | Builtin::StringEndsWith => 2,
            Builtin::StringReplace | Builtin::ListFold | Builtin::BinaryFold => 3,
        }
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn lookup(label: &str) -> Result<Builtin, MachineError> {
        label
            .parse()
            .map_err(|_| MachineError::UndefinedBuiltin(label.to_string()))
    }

    /// Known labels close to `label`.
    pub fn suggest(label: &str) -> Vec<String> {
        find_similar(label, Builtin::iter().map(Builtin::label), 2)
    }
}

/// Anything the machine can hold as a `Partial`.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Cons,
    Extend(Label),
    Overwrite(Label),
    Select(Label),
    Tag(Label),
    Case(Label),
    NoCases,
    Perform(Label),
    Handle(Label),
    Builtin(Builtin),
}

impl Op {
    pub fn arity(&self) -> usize {
        match self {
            Op::Select(_) | Op::Tag(_) | Op::NoCases | Op::Perform(_) => 1,
            Op::Cons | Op::Extend(_) | Op::Overwrite(_) | Op::Handle(_) => 2,
            Op::Case(_) => 3,
            Op::Builtin(builtin) => builtin.arity(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Cons => write!(f, "cons"),
            Op::Extend(label) => write!(f, "extend {}", label),
            Op::Overwrite(label) => write!(f, "overwrite {}", label),
            Op::Select(label) => write!(f, "select {}", label),
            Op::Tag(label) => write!(f, "tag {}", label),
            Op::Case(label) => write!(f, "case {}", label),
            Op::NoCases => write!(f, "nocases"),
            Op::Perform(label) => write!(f, "perform {}", label),
            Op::Handle(label) => write!(f, "handle {}", label),
            Op::Builtin(builtin) => write!(f, "{}", builtin.label()),
        }
    }
}

/// What a saturated primitive asks the machine to do next.
#[derive(Debug)]
pub enum Reduction {
    Value(Value),
    /// Call `func` with `arg`. `then` is pushed first (bottom first) and
    /// receives the result.
    Call {
        func: Value,
        arg: Value,
        then: Vec<Frame>,
    },
    /// Suspend with an effect.
    Perform { label: Label, lift: Value },
}

impl From<Value> for Reduction {
    fn from(value: Value) -> Self {
        Reduction::Value(value)
    }
}

/// Run a primitive whose arguments are all present.
pub fn invoke(op: &Op, args: Vec<Value>) -> Result<Reduction, MachineError> {
    match op {
        Op::Cons => {
            let [item, tail] = take(op, args)?;
            let tail = list(op, &tail)?;
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(item);
            items.extend(tail.iter().cloned());
            Ok(Value::list(items).into())
        }
        Op::Extend(label) | Op::Overwrite(label) => {
            let [value, rest] = take(op, args)?;
            let fields = match &rest {
                Value::Record(fields) => fields,
                other => return Err(MachineError::mismatch(op.to_string(), "Record", other)),
            };
            if matches!(op, Op::Overwrite(_)) && !fields.contains_key(label) {
                return Err(MachineError::MissingField(label.clone()));
            }
            let mut fields = (**fields).clone();
            fields.insert(label.clone(), value);
            Ok(Value::Record(Rc::new(fields)).into())
        }
        Op::Select(label) => {
            let [record] = take(op, args)?;
            match &record {
                Value::Record(fields) => fields
                    .get(label)
                    .cloned()
                    .map(Reduction::Value)
                    .ok_or_else(|| MachineError::MissingField(label.clone())),
                other => Err(MachineError::mismatch(op.to_string(), "Record", other)),
            }
        }
        Op::Tag(label) => {
            let [payload] = take(op, args)?;
            Ok(Value::tagged(label, payload).into())
        }
        Op::Case(label) => {
            let [branch, otherwise, scrutinee] = take(op, args)?;
            match &scrutinee {
                Value::Tagged { tag, payload } if **tag == **label => Ok(Reduction::Call {
                    func: branch,
                    arg: (**payload).clone(),
                    then: Vec::new(),
                }),
                Value::Tagged { .. } => Ok(Reduction::Call {
                    func: otherwise,
                    arg: scrutinee,
                    then: Vec::new(),
                }),
                other => Err(MachineError::mismatch(op.to_string(), "Tagged", other)),
            }
        }
        Op::NoCases => {
            let [scrutinee] = take(op, args)?;
            Err(MachineError::NoCasesMatched(scrutinee.to_string()))
        }
        Op::Perform(label) => {
            let [lift] = take(op, args)?;
            Ok(Reduction::Perform {
                label: label.clone(),
                lift,
            })
        }
        Op::Handle(label) => {
            let [handler, thunk] = take(op, args)?;
            Ok(Reduction::Call {
                func: thunk,
                arg: Value::unit(),
                then: vec![Frame::Delimit {
                    label: label.clone(),
                    handler,
                }],
            })
        }
        Op::Builtin(builtin) => call_builtin(op, *builtin, args),
    }
}

fn call_builtin(op: &Op, builtin: Builtin, args: Vec<Value>) -> Result<Reduction, MachineError> {
    let value = match builtin {
        Builtin::Equal => {
            let [a, b] = take(op, args)?;
            Value::bool(a == b)
        }
        Builtin::Fix => {
            let [f] = take(op, args)?;
            return Ok(Reduction::Call {
                func: f.clone(),
                arg: fixed(f),
                then: Vec::new(),
            });
        }
        Builtin::Fixed => {
            let [f, x] = take(op, args)?;
            return Ok(Reduction::Call {
                func: f.clone(),
                arg: fixed(f),
                then: vec![Frame::Call { arg: x }],
            });
        }
        Builtin::IntCompare => {
            let [a, b] = take(op, args)?;
            let tag = match int(op, &a)?.cmp(&int(op, &b)?) {
                Ordering::Less => "Lt",
                Ordering::Equal => "Eq",
                Ordering::Greater => "Gt",
            };
            Value::tagged(tag, Value::unit())
        }
        Builtin::IntAdd => arithmetic(op, args, i64::checked_add, "int_add")?,
        Builtin::IntSubtract => arithmetic(op, args, i64::checked_sub, "int_subtract")?,
        Builtin::IntMultiply => arithmetic(op, args, i64::checked_mul, "int_multiply")?,
        Builtin::IntDivide => {
            let [a, b] = take(op, args)?;
            match int(op, &a)?.checked_div(int(op, &b)?) {
                Some(quotient) => Value::ok(Value::Int(quotient)),
                None => Value::error(Value::unit()),
            }
        }
        Builtin::IntAbsolute => {
            let [a] = take(op, args)?;
            let n = int(op, &a)?
                .checked_abs()
                .ok_or(MachineError::IntegerOverflow("int_absolute"))?;
            Value::Int(n)
        }
        Builtin::IntParse => {
            let [s] = take(op, args)?;
            let text = string(op, &s)?;
            // Only the canonical rendering parses: no sign prefix, padding or zeros.
            match text.parse::<i64>() {
                Ok(n) if n.to_string() == text => Value::ok(Value::Int(n)),
                _ => Value::error(Value::unit()),
            }
        }
        Builtin::IntToString => {
            let [a] = take(op, args)?;
            Value::string(int(op, &a)?.to_string())
        }
        Builtin::StringAppend => {
            let [a, b] = take(op, args)?;
            Value::string(format!("{}{}", string(op, &a)?, string(op, &b)?))
        }
        Builtin::StringSplit => {
            let [s, sep] = take(op, args)?;
            split(string(op, &s)?, string(op, &sep)?)
        }
        Builtin::StringSplitOnce => {
            let [s, sep] = take(op, args)?;
            match string(op, &s)?.split_once(string(op, &sep)?) {
                Some((pre, post)) => Value::ok(Value::record([
                    ("pre", Value::string(pre)),
                    ("post", Value::string(post)),
                ])),
                None => Value::error(Value::unit()),
            }
        }
        Builtin::StringReplace => {
            let [s, from, to] = take(op, args)?;
            Value::string(string(op, &s)?.replace(string(op, &from)?, string(op, &to)?))
        }
        Builtin::StringUppercase => {
            let [s] = take(op, args)?;
            Value::string(string(op, &s)?.to_uppercase())
        }
        Builtin::StringLowercase => {
            let [s] = take(op, args)?;
            Value::string(string(op, &s)?.to_lowercase())
        }
        Builtin::StringStartsWith => {
            let [s, prefix] = take(op, args)?;
            Value::bool(string(op, &s)?.starts_with(string(op, &prefix)?))
        }
        Builtin::StringEndsWith => {
            let [s, suffix] = take(op, args)?;
            Value::bool(string(op, &s)?.ends_with(string(op, &suffix)?))
        }
        Builtin::StringLength => {
            let [s] = take(op, args)?;
            Value::Int(string(op, &s)?.len() as i64)
        }
        Builtin::StringToBinary => {
            let [s] = take(op, args)?;
            Value::binary(string(op, &s)?.as_bytes())
        }
        Builtin::StringFromBinary => {
            let [b] = take(op, args)?;
            match std::str::from_utf8(binary(op, &b)?.as_slice()) {
                Ok(text) => Value::ok(Value::string(text)),
                Err(_) => Value::error(Value::unit()),
            }
        }
        Builtin::ListPop => {
            let [l] = take(op, args)?;
            match list(op, &l)?.uncons() {
                Some((head, tail)) => Value::ok(Value::record([
                    ("head", head.clone()),
                    ("tail", Value::List(tail)),
                ])),
                None => Value::error(Value::unit()),
            }
        }
        Builtin::ListFold => {
            let [l, state, f] = take(op, args)?;
            return Ok(match list(op, &l)?.uncons() {
                None => Reduction::Value(state),
                Some((head, tail)) => fold_step(
                    Builtin::ListFold,
                    head.clone(),
                    Value::List(tail),
                    state,
                    f,
                ),
            });
        }
        Builtin::BinaryFromIntegers => {
            let [l] = take(op, args)?;
            let bytes = list(op, &l)?
                .iter()
                .map(|item| match item {
                    Value::Int(n) => u8::try_from(*n)
                        .map_err(|_| MachineError::mismatch(op.to_string(), "integer in 0..=255", item)),
                    other => Err(MachineError::mismatch(op.to_string(), "Integer", other)),
                })
                .collect::<Result<Vec<u8>, _>>()?;
            Value::binary(bytes)
        }
        Builtin::BinaryFold => {
            let [b, state, f] = take(op, args)?;
            return Ok(match binary(op, &b)?.uncons() {
                None => Reduction::Value(state),
                Some((head, tail)) => fold_step(
                    Builtin::BinaryFold,
                    Value::Int(i64::from(*head)),
                    Value::Binary(tail),
                    state,
                    f,
                ),
            });
        }
    };
    Ok(Reduction::Value(value))
}

fn fixed(f: Value) -> Value {
    Value::Partial {
        op: Op::Builtin(Builtin::Fixed),
        applied: vec![f],
    }
}

/// One iteration of a fold: `fold(rest, f(item)(state), f)`.
fn fold_step(fold: Builtin, item: Value, rest: Value, state: Value, f: Value) -> Reduction {
    Reduction::Call {
        func: f.clone(),
        arg: item,
        then: vec![
            Frame::Call { arg: f },
            Frame::Apply {
                func: Value::Partial {
                    op: Op::Builtin(fold),
                    applied: vec![rest],
                },
            },
            Frame::Call { arg: state },
        ],
    }
}

/// `string_split` returns the first piece as `head` and the remaining
/// pieces as `tail`. An empty separator splits into characters.
fn split(s: &str, sep: &str) -> Value {
    let (head, tail): (String, Vec<Value>) = if sep.is_empty() {
        let mut chars = s.chars();
        let head = chars.next().map(String::from).unwrap_or_default();
        (head, chars.map(|c| Value::string(c.to_string())).collect())
    } else {
        match s.split_once(sep) {
            None => (s.to_string(), Vec::new()),
            Some((head, "")) => (head.to_string(), Vec::new()),
            Some((head, rest)) => (head.to_string(), rest.split(sep).map(Value::string).collect()),
        }
    };
    Value::record([("head", Value::string(head)), ("tail", Value::list(tail))])
}

fn arithmetic(
    op: &Op,
    args: Vec<Value>,
    f: fn(i64, i64) -> Option<i64>,
    name: &'static str,
) -> Result<Value, MachineError> {
    let [a, b] = take(op, args)?;
    f(int(op, &a)?, int(op, &b)?)
        .map(Value::Int)
        .ok_or(MachineError::IntegerOverflow(name))
}

// ============================================================================
// Argument extraction
// ============================================================================

fn take<const N: usize>(op: &Op, args: Vec<Value>) -> Result<[Value; N], MachineError> {
    args.try_into().map_err(|args: Vec<Value>| MachineError::ArityOrTypeMismatch {
        operation: op.to_string(),
        expected: format!("{} arguments", N),
        found: format!("{} arguments", args.len()),
    })
}

fn int(op: &Op, value: &Value) -> Result<i64, MachineError> {
    value
        .as_int()
        .ok_or_else(|| MachineError::mismatch(op.to_string(), "Integer", value))
}

fn string<'a>(op: &Op, value: &'a Value) -> Result<&'a str, MachineError> {
    value
        .as_str()
        .ok_or_else(|| MachineError::mismatch(op.to_string(), "String", value))
}

fn list<'a>(op: &Op, value: &'a Value) -> Result<&'a Shared<Value>, MachineError> {
    value
        .as_list()
        .ok_or_else(|| MachineError::mismatch(op.to_string(), "List", value))
}

fn binary<'a>(op: &Op, value: &'a Value) -> Result<&'a Shared<u8>, MachineError> {
    value
        .as_binary()
        .ok_or_else(|| MachineError::mismatch(op.to_string(), "Binary", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(builtin: Builtin, args: Vec<Value>) -> Value {
        match invoke(&Op::Builtin(builtin), args) {
            Ok(Reduction::Value(value)) => value,
            other => panic!("expected a value from {}, got {:?}", builtin.label(), other),
        }
    }

    #[test]
    fn test_labels_round_trip() {
        for builtin in Builtin::iter() {
            assert_eq!(Builtin::lookup(builtin.label()), Ok(builtin));
        }
        assert_eq!(Builtin::StringSplitOnce.label(), "string_split_once");
        assert_eq!(Builtin::BinaryFromIntegers.label(), "binary_from_integers");
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(
            Builtin::lookup("int_power"),
            Err(MachineError::UndefinedBuiltin("int_power".into()))
        );
    }

    #[test]
    fn test_arities() {
        assert_eq!(Op::Case("Ok".into()).arity(), 3);
        assert_eq!(Op::Handle("Log".into()).arity(), 2);
        assert_eq!(Op::Perform("Log".into()).arity(), 1);
        assert_eq!(Builtin::StringReplace.arity(), 3);
        assert_eq!(Builtin::Fix.arity(), 1);
    }

    #[test]
    fn test_divide() {
        assert_eq!(
            value_of(Builtin::IntDivide, vec![Value::Int(7), Value::Int(2)]),
            Value::ok(Value::Int(3))
        );
        assert_eq!(
            value_of(Builtin::IntDivide, vec![Value::Int(1), Value::Int(0)]),
            Value::error(Value::unit())
        );
        assert_eq!(
            value_of(Builtin::IntDivide, vec![Value::Int(i64::MIN), Value::Int(-1)]),
            Value::error(Value::unit())
        );
    }

    #[test]
    fn test_add_overflow_is_fatal() {
        let result = invoke(&Op::Builtin(Builtin::IntAdd), vec![Value::Int(i64::MAX), Value::Int(1)]);
        assert!(matches!(result, Err(MachineError::IntegerOverflow("int_add"))));
    }

    #[test]
    fn test_parse_is_strict() {
        let parse = |s: &str| value_of(Builtin::IntParse, vec![Value::string(s)]);
        assert_eq!(parse("42"), Value::ok(Value::Int(42)));
        assert_eq!(parse("-7"), Value::ok(Value::Int(-7)));
        assert_eq!(parse("007"), Value::error(Value::unit()));
        assert_eq!(parse("+1"), Value::error(Value::unit()));
        assert_eq!(parse("1.5"), Value::error(Value::unit()));
        assert_eq!(parse(""), Value::error(Value::unit()));
    }

    #[test]
    fn test_compare() {
        let cmp = |a, b| value_of(Builtin::IntCompare, vec![Value::Int(a), Value::Int(b)]);
        assert_eq!(cmp(1, 2), Value::tagged("Lt", Value::unit()));
        assert_eq!(cmp(2, 2), Value::tagged("Eq", Value::unit()));
        assert_eq!(cmp(3, 2), Value::tagged("Gt", Value::unit()));
    }

    #[test]
    fn test_split() {
        let split = |s: &str, sep: &str| {
            value_of(Builtin::StringSplit, vec![Value::string(s), Value::string(sep)])
        };
        let strings = |items: &[&str]| Value::list(items.iter().map(Value::string));

        assert_eq!(
            split("a,b,c", ","),
            Value::record([("head", Value::string("a")), ("tail", strings(&["b", "c"]))])
        );
        assert_eq!(
            split("abc", ""),
            Value::record([("head", Value::string("a")), ("tail", strings(&["b", "c"]))])
        );
        assert_eq!(
            split("abc", "-"),
            Value::record([("head", Value::string("abc")), ("tail", strings(&[]))])
        );
        assert_eq!(
            split("a,", ","),
            Value::record([("head", Value::string("a")), ("tail", strings(&[]))])
        );
        assert_eq!(
            split("", ""),
            Value::record([("head", Value::string("")), ("tail", strings(&[]))])
        );
    }

    #[test]
    fn test_split_once() {
        assert_eq!(
            value_of(Builtin::StringSplitOnce, vec![Value::string("k=v=w"), Value::string("=")]),
            Value::ok(Value::record([
                ("pre", Value::string("k")),
                ("post", Value::string("v=w")),
            ]))
        );
        assert_eq!(
            value_of(Builtin::StringSplitOnce, vec![Value::string("kv"), Value::string("=")]),
            Value::error(Value::unit())
        );
    }

    #[test]
    fn test_string_builtins() {
        assert_eq!(
            value_of(
                Builtin::StringReplace,
                vec![Value::string("a-b-c"), Value::string("-"), Value::string("+")]
            ),
            Value::string("a+b+c")
        );
        assert_eq!(
            value_of(Builtin::StringUppercase, vec![Value::string("Hey")]),
            Value::string("HEY")
        );
        assert_eq!(
            value_of(Builtin::StringLength, vec![Value::string("héllo")]),
            Value::Int(6)
        );
        assert_eq!(
            value_of(Builtin::StringEndsWith, vec![Value::string("main.rs"), Value::string(".rs")]),
            Value::bool(true)
        );
    }

    #[test]
    fn test_binary_round_trip_through_strings() {
        let bytes = value_of(Builtin::StringToBinary, vec![Value::string("hi")]);
        assert_eq!(bytes, Value::binary(b"hi"));
        assert_eq!(
            value_of(Builtin::StringFromBinary, vec![bytes]),
            Value::ok(Value::string("hi"))
        );
        assert_eq!(
            value_of(Builtin::StringFromBinary, vec![Value::binary([0xffu8, 0xfe])]),
            Value::error(Value::unit())
        );
    }

    #[test]
    fn test_binary_from_integers_rejects_out_of_range() {
        assert_eq!(
            value_of(Builtin::BinaryFromIntegers, vec![Value::list([Value::Int(1), Value::Int(255)])]),
            Value::binary([1u8, 255])
        );
        let result = invoke(
            &Op::Builtin(Builtin::BinaryFromIntegers),
            vec![Value::list([Value::Int(256)])],
        );
        assert!(matches!(result, Err(MachineError::ArityOrTypeMismatch { .. })));
    }

    #[test]
    fn test_list_pop() {
        assert_eq!(
            value_of(Builtin::ListPop, vec![Value::list([Value::Int(1), Value::Int(2)])]),
            Value::ok(Value::record([
                ("head", Value::Int(1)),
                ("tail", Value::list([Value::Int(2)])),
            ]))
        );
        assert_eq!(
            value_of(Builtin::ListPop, vec![Value::list([])]),
            Value::error(Value::unit())
        );
    }

    #[test]
    fn test_pop_and_fold_share_the_tail() {
        let items = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let after_first = items.as_list().unwrap()[1..].as_ptr();

        let popped = value_of(Builtin::ListPop, vec![items.clone()]);
        match &popped {
            Value::Tagged { payload, .. } => match &**payload {
                Value::Record(fields) => {
                    let tail = fields["tail"].as_list().unwrap();
                    assert_eq!(tail.as_ptr(), after_first);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }

        match invoke(&Op::Builtin(Builtin::ListFold), vec![items.clone(), Value::Int(0), Value::unit()]) {
            Ok(Reduction::Call { arg, then, .. }) => {
                assert_eq!(arg, Value::Int(1));
                match &then[1] {
                    Frame::Apply { func: Value::Partial { applied, .. } } => {
                        assert_eq!(applied[0], Value::list([Value::Int(2), Value::Int(3)]));
                        assert_eq!(applied[0].as_list().unwrap().as_ptr(), after_first);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_binary_fold_walks_without_copying() {
        let bytes = Value::binary([7u8, 8, 9]);
        let after_first = bytes.as_binary().unwrap()[1..].as_ptr();
        match invoke(&Op::Builtin(Builtin::BinaryFold), vec![bytes, Value::Int(0), Value::unit()]) {
            Ok(Reduction::Call { arg, then, .. }) => {
                assert_eq!(arg, Value::Int(7));
                match &then[1] {
                    Frame::Apply { func: Value::Partial { applied, .. } } => {
                        assert_eq!(applied[0], Value::binary([8u8, 9]));
                        assert_eq!(applied[0].as_binary().unwrap().as_ptr(), after_first);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fold_over_empty_returns_state() {
        assert_eq!(
            value_of(Builtin::ListFold, vec![Value::list([]), Value::Int(9), Value::unit()]),
            Value::Int(9)
        );
        assert_eq!(
            value_of(Builtin::BinaryFold, vec![Value::binary(b""), Value::Int(9), Value::unit()]),
            Value::Int(9)
        );
    }

    #[test]
    fn test_case_dispatch() {
        let branch = Value::string("branch");
        let otherwise = Value::string("otherwise");
        let op = Op::Case("Ok".into());

        match invoke(&op, vec![branch.clone(), otherwise.clone(), Value::ok(Value::Int(1))]) {
            Ok(Reduction::Call { func, arg, then }) => {
                assert_eq!(func, branch);
                assert_eq!(arg, Value::Int(1));
                assert!(then.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        match invoke(&op, vec![branch, otherwise.clone(), Value::error(Value::Int(1))]) {
            Ok(Reduction::Call { func, arg, .. }) => {
                assert_eq!(func, otherwise);
                assert_eq!(arg, Value::error(Value::Int(1)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_record_ops() {
        let record = Value::record([("a", Value::Int(1))]);
        let extended = value_of_op(&Op::Extend("b".into()), vec![Value::Int(2), record.clone()]);
        assert_eq!(extended, Value::record([("a", Value::Int(1)), ("b", Value::Int(2))]));

        let overwritten = value_of_op(&Op::Overwrite("a".into()), vec![Value::Int(5), record.clone()]);
        assert_eq!(overwritten, Value::record([("a", Value::Int(5))]));
        // the input record is untouched
        assert_eq!(record, Value::record([("a", Value::Int(1))]));

        assert!(matches!(
            invoke(&Op::Select("z".into()), vec![record]),
            Err(MachineError::MissingField(label)) if label == "z"
        ));
    }

    fn value_of_op(op: &Op, args: Vec<Value>) -> Value {
        match invoke(op, args) {
            Ok(Reduction::Value(value)) => value,
            other => panic!("expected a value from {}, got {:?}", op, other),
        }
    }
}

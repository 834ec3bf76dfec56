//! JSON IR codec.
//!
//! Programs arrive as nested objects whose `"0"` key names the node:
//!
//! | tag  | node      | fields          |
//! |------|-----------|-----------------|
//! | `v`  | variable  | `l`             |
//! | `f`  | lambda    | `l`, `b`        |
//! | `a`  | apply     | `f`, `a`        |
//! | `l`  | let       | `l`, `v`, `t`   |
//! | `z`  | vacant    |                 |
//! | `x`  | binary    | `v`             |
//! | `i`  | integer   | `v`             |
//! | `s`  | string    | `v`             |
//! | `ta` | tail      |                 |
//! | `c`  | cons      |                 |
//! | `u`  | empty     |                 |
//! | `e`  | extend    | `l`             |
//! | `o`  | overwrite | `l`             |
//! | `g`  | select    | `l`             |
//! | `t`  | tag       | `l`             |
//! | `m`  | case      | `l`             |
//! | `n`  | nocases   |                 |
//! | `p`  | perform   | `l`             |
//! | `h`  | handle    | `l`             |
//! | `b`  | builtin   | `l`             |
//!
//! Binary literals are `{"/": {"bytes": "<base64>"}}`; padding is optional.

use std::rc::Rc;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value as Json};

use crate::ast::{Expr, Label};
use crate::errors::MachineError;
use crate::value::Value;

const BYTES: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parse IR text.
///
/// Nesting depth is bounded by heap only: the JSON reader grows its stack on
/// demand and the decoder keeps its own work list.
pub fn parse(text: &str) -> Result<Expr, MachineError> {
    let json: Json = read(text).map_err(|e| MachineError::Malformed(e.to_string()))?;
    let expr = decode(&json);
    discard(json);
    expr
}

/// Reads JSON of any nesting depth.
pub(crate) fn read<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Drops a document without recursing on its depth.
pub(crate) fn discard(json: Json) {
    let mut pending = vec![json];
    while let Some(json) = pending.pop() {
        match json {
            Json::Array(items) => pending.extend(items),
            Json::Object(fields) => pending.extend(fields.into_iter().map(|(_, value)| value)),
            _ => {}
        }
    }
}

/// Work left while decoding: a node still to read, or a compound node
/// waiting for its children on the output stack.
enum Task<'a> {
    Decode(&'a Json),
    Lambda(Label),
    Apply,
    Let(Label),
}

/// Decode an IR node and everything under it.
pub fn decode(json: &Json) -> Result<Expr, MachineError> {
    let mut tasks = vec![Task::Decode(json)];
    let mut done: Vec<Expr> = Vec::new();

    while let Some(task) = tasks.pop() {
        let expr = match task {
            Task::Decode(json) => {
                let (node, tag) = node(json)?;
                // Children are pushed last-first so they finish in order.
                match tag {
                    "f" => {
                        tasks.push(Task::Lambda(label(node, tag)?));
                        tasks.push(Task::Decode(field(node, tag, "b")?));
                    }
                    "a" => {
                        let (func, arg) = (field(node, tag, "f")?, field(node, tag, "a")?);
                        tasks.push(Task::Apply);
                        tasks.push(Task::Decode(arg));
                        tasks.push(Task::Decode(func));
                    }
                    "l" => {
                        let name = label(node, tag)?;
                        let (value, then) = (field(node, tag, "v")?, field(node, tag, "t")?);
                        tasks.push(Task::Let(name));
                        tasks.push(Task::Decode(then));
                        tasks.push(Task::Decode(value));
                    }
                    _ => done.push(leaf(node, tag)?),
                }
                continue;
            }
            Task::Lambda(param) => {
                let body = finished(&mut done)?;
                Expr::Lambda { param, body }
            }
            Task::Apply => {
                let arg = finished(&mut done)?;
                let func = finished(&mut done)?;
                Expr::Apply { func, arg }
            }
            Task::Let(label) => {
                let then = finished(&mut done)?;
                let value = finished(&mut done)?;
                Expr::Let { label, value, then }
            }
        };
        done.push(expr);
    }

    match (done.pop(), done.is_empty()) {
        (Some(expr), true) => Ok(expr),
        _ => Err(malformed("unbalanced node stack")),
    }
}

fn finished(done: &mut Vec<Expr>) -> Result<Rc<Expr>, MachineError> {
    done.pop()
        .map(Rc::new)
        .ok_or_else(|| malformed("unbalanced node stack"))
}

fn node(json: &Json) -> Result<(&Map<String, Json>, &str), MachineError> {
    let node = json
        .as_object()
        .ok_or_else(|| malformed("expected an object node"))?;
    let tag = node
        .get("0")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("node has no \"0\" tag"))?;
    Ok((node, tag))
}

/// A node with no expression children.
fn leaf(node: &Map<String, Json>, tag: &str) -> Result<Expr, MachineError> {
    let expr = match tag {
        "v" => Expr::Var(label(node, tag)?),
        "z" => Expr::Vacant,
        "x" => Expr::Binary(bytes(field(node, tag, "v")?).map_err(|e| malformed(format!("x.v: {}", e)))?),
        "i" => Expr::Int(integer(field(node, tag, "v")?)?),
        "s" => Expr::Str(
            field(node, tag, "v")?
                .as_str()
                .ok_or_else(|| malformed("s.v: expected a string"))?
                .to_string(),
        ),
        "ta" => Expr::Tail,
        "c" => Expr::Cons,
        "u" => Expr::Empty,
        "e" => Expr::Extend(label(node, tag)?),
        "o" => Expr::Overwrite(label(node, tag)?),
        "g" => Expr::Select(label(node, tag)?),
        "t" => Expr::Tag(label(node, tag)?),
        "m" => Expr::Case(label(node, tag)?),
        "n" => Expr::NoCases,
        "p" => Expr::Perform(label(node, tag)?),
        "h" => Expr::Handle(label(node, tag)?),
        "b" => Expr::Builtin(label(node, tag)?),
        other => return Err(malformed(format!("unknown node tag {:?}", other))),
    };
    Ok(expr)
}

fn malformed(message: impl Into<String>) -> MachineError {
    MachineError::Malformed(message.into())
}

fn field<'a>(node: &'a Map<String, Json>, tag: &str, key: &str) -> Result<&'a Json, MachineError> {
    node.get(key)
        .ok_or_else(|| malformed(format!("{}.{}: missing", tag, key)))
}

fn label(node: &Map<String, Json>, tag: &str) -> Result<String, MachineError> {
    field(node, tag, "l")?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("{}.l: expected a string", tag)))
}

fn integer(json: &Json) -> Result<i64, MachineError> {
    if let Some(n) = json.as_i64() {
        return Ok(n);
    }
    // Some exporters write integers as floats.
    match json.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(malformed(format!("i.v: expected an integer, got {}", json))),
    }
}

/// Bytes from `{"/": {"bytes": "..."}}` or a bare base64 string.
pub fn bytes(json: &Json) -> Result<Vec<u8>, String> {
    let encoded = json
        .pointer("/~1/bytes")
        .or(Some(json))
        .and_then(Json::as_str)
        .ok_or_else(|| format!("expected base64 bytes, got {}", json))?;
    BYTES.decode(encoded).map_err(|e| e.to_string())
}

pub fn bytes_to_json(bytes: &[u8]) -> Json {
    json!({ "/": { "bytes": BYTES.encode(bytes) } })
}

// ============================================================================
// Native rendering
// ============================================================================

/// Plain JSON for host output. Recurses on the value's depth.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Int(n) => json!(n),
        Value::Str(s) => json!(&**s),
        Value::Binary(bytes) => bytes_to_json(bytes),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Record(fields) => Json::Object(
            fields
                .iter()
                .map(|(label, value)| (label.clone(), to_json(value)))
                .collect(),
        ),
        Value::Tagged { tag, payload } => json!({ "tag": &**tag, "value": to_json(payload) }),
        Value::Closure { .. } | Value::Partial { .. } | Value::Resume(_) => {
            Json::String(value.to_string())
        }
    }
}

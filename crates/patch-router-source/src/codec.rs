//! JSON codec for patches.
//!
//! A patch is encoded as `{"op", "path", "value"?, "oldValue"?, "id"?}` with
//! the path as an array of strings (object keys) and numbers (array indices).

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::types::{Key, Patch, PatchOp, PathSegment};

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("patch must be an object")]
    NotAnObject,
    #[error("unknown op: {0}")]
    UnknownOp(String),
    #[error("path must be an array of strings and non-negative integers")]
    InvalidPath,
    #[error("id must be a string or an integer")]
    InvalidId,
    #[error("patches must be an array")]
    NotAnArray,
}

// ── Path helpers ──────────────────────────────────────────────────────────

fn encode_path(path: &[PathSegment]) -> Value {
    Value::Array(
        path.iter()
            .map(|step| match step {
                PathSegment::Key(key) => Value::String(key.clone()),
                PathSegment::Index(idx) => Value::from(*idx),
            })
            .collect(),
    )
}

fn decode_path(v: &Value) -> Result<Vec<PathSegment>, CodecError> {
    let arr = v.as_array().ok_or(CodecError::InvalidPath)?;
    arr.iter()
        .map(|step| match step {
            Value::String(s) => Ok(PathSegment::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(PathSegment::Index)
                .ok_or(CodecError::InvalidPath),
            _ => Err(CodecError::InvalidPath),
        })
        .collect()
}

fn decode_op(v: Option<&Value>) -> Result<PatchOp, CodecError> {
    match v.and_then(Value::as_str) {
        Some("add") => Ok(PatchOp::Add),
        Some("replace") => Ok(PatchOp::Replace),
        Some("remove") => Ok(PatchOp::Remove),
        Some(other) => Err(CodecError::UnknownOp(other.to_string())),
        None => Err(CodecError::UnknownOp(String::new())),
    }
}

// ── Serialization ─────────────────────────────────────────────────────────

/// Serialize a patch to a `serde_json::Value`.
pub fn to_json(patch: &Patch) -> Value {
    let mut out = Map::new();
    out.insert("op".into(), json!(patch.op.as_str()));
    out.insert("path".into(), encode_path(&patch.path));
    if let Some(value) = &patch.value {
        out.insert("value".into(), value.clone());
    }
    if let Some(old) = &patch.old_value {
        out.insert("oldValue".into(), old.clone());
    }
    if let Some(id) = &patch.id {
        out.insert("id".into(), id.to_value());
    }
    Value::Object(out)
}

/// Serialize a patch list to a JSON array.
pub fn to_json_patches(patches: &[Patch]) -> Value {
    Value::Array(patches.iter().map(to_json).collect())
}

// ── Deserialization ───────────────────────────────────────────────────────

pub fn from_json(v: &Value) -> Result<Patch, CodecError> {
    let obj = v.as_object().ok_or(CodecError::NotAnObject)?;
    let op = decode_op(obj.get("op"))?;
    let path = decode_path(obj.get("path").unwrap_or(&Value::Null))?;
    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(Key::from_value(raw).ok_or(CodecError::InvalidId)?),
    };
    Ok(Patch {
        path,
        op,
        value: obj.get("value").cloned(),
        old_value: obj.get("oldValue").cloned(),
        id,
    })
}

pub fn from_json_patches(v: &Value) -> Result<Vec<Patch>, CodecError> {
    v.as_array().ok_or(CodecError::NotAnArray)?.iter().map(from_json).collect()
}

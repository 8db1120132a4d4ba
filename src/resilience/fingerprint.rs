//! Deterministic cache keys for wrapped calls.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of
//! `{operation, positional args, keyword args}`. Object keys are sorted at
//! every depth, so keyword order never matters; positional order does.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::Result;

/// Argument set of one call: positional values plus keyword values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `value` cannot be rendered as JSON.
    pub fn arg(mut self, value: impl Serialize) -> Result<Self> {
        self.positional.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Set a keyword argument, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `value` cannot be rendered as JSON.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Serialize) -> Result<Self> {
        self.keyword.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Use every field of a serializable struct as a keyword argument.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `fields` does not serialize to a
    /// JSON object.
    pub fn from_fields(fields: &impl Serialize) -> Result<Self> {
        match serde_json::to_value(fields)? {
            Value::Object(map) => Ok(Self {
                positional: Vec::new(),
                keyword: map.into_iter().collect(),
            }),
            other => Err(crate::AppError::BadRequest(format!(
                "keyword arguments must be an object, got {other}"
            ))),
        }
    }
}

/// Fingerprint of `operation` called with `args`, as lowercase hex.
#[must_use]
pub fn fingerprint(operation: &str, args: &CallArgs) -> String {
    let mut keyword = Map::new();
    for (name, value) in &args.keyword {
        keyword.insert(name.clone(), canonicalize(value));
    }
    let mut document = Map::new();
    document.insert(
        "args".into(),
        Value::Array(args.positional.iter().map(canonicalize).collect()),
    );
    document.insert("kwargs".into(), Value::Object(keyword));
    document.insert("op".into(), Value::String(operation.to_owned()));

    let rendered = Value::Object(document).to_string();
    format!("{:x}", Sha256::digest(rendered.as_bytes()))
}

// Rebuild objects in key order at every depth.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(key, inner)| (key, canonicalize(inner))).collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), inner))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

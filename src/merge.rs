//! Config Merger
//!
//! Deep-merges two JSON configuration documents with name-aware array
//! reconciliation: array elements that are objects carrying a `name` field
//! are matched by that name and merged individually, instead of the array
//! being replaced or concatenated wholesale. This is what lets a freshly
//! discovered accessory fragment update an existing `config.json` entry in
//! place while leaving unrelated entries and hand-edited fields untouched.

use crate::error::{ConfigError, PersistenceError};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A merge input: either an in-memory document or a path to a JSON file.
pub enum ConfigSource {
    Path(PathBuf),
    Value(Value),
}

impl ConfigSource {
    fn resolve(self) -> Result<Value, ConfigError> {
        match self {
            ConfigSource::Value(value) => Ok(value),
            ConfigSource::Path(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
            }
        }
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::Path(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

/// Merge two configuration documents, `source` overriding `base`.
///
/// Path arguments are read and parsed before merging; a malformed file
/// fails with [`ConfigError::Parse`] carrying the offending path.
pub fn merge_documents(
    base: impl Into<ConfigSource>,
    source: impl Into<ConfigSource>,
) -> Result<Value, ConfigError> {
    let base = base.into().resolve()?;
    let source = source.into().resolve()?;
    Ok(deep_merge(base, source))
}

/// Recursive merge rule. Objects merge by key union, arrays reconcile by
/// name, everything else (scalars, type mismatches) resolves to `source`.
fn deep_merge(base: Value, source: Value) -> Value {
    match (base, source) {
        (Value::Object(mut base), Value::Object(source)) => {
            for (key, value) in source {
                match base.get_mut(&key) {
                    Some(slot) => {
                        let existing = slot.take();
                        *slot = deep_merge(existing, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Object(base)
        }
        (Value::Array(dest), Value::Array(source)) => Value::Array(reconcile(dest, source)),
        (_, source) => source,
    }
}

/// An array element, classified once at ingestion. Only objects with a
/// scalar `name` field take part in reconciliation; object- or
/// array-valued names carry no usable identity.
enum Element {
    Named { name: Value, value: Value },
    Anonymous(Value),
}

impl Element {
    fn classify(value: Value) -> Self {
        let name = match value.get("name") {
            Some(name) if name.is_string() || name.is_number() || name.is_boolean() => {
                Some(name.clone())
            }
            _ => None,
        };
        match name {
            Some(name) => Element::Named { name, value },
            None => Element::Anonymous(value),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Element::Named { value, .. } => value,
            Element::Anonymous(value) => value,
        }
    }
}

/// Take the first not-yet-consumed source element with a matching name.
/// Duplicate names pair one-to-one in positional order.
fn take_named(pool: &mut [Option<Element>], name: &Value) -> Option<Value> {
    let index = pool.iter().position(|slot| {
        matches!(slot, Some(Element::Named { name: candidate, .. }) if candidate == name)
    })?;
    pool[index].take().map(Element::into_value)
}

/// Name-aware array reconciliation.
///
/// Destination elements are emitted in order; each named one consumes and
/// merges its first name match from the source pool. Everything left in
/// the pool is appended afterwards in its original relative order.
fn reconcile(dest: Vec<Value>, source: Vec<Value>) -> Vec<Value> {
    let mut pool: Vec<Option<Element>> = source
        .into_iter()
        .map(|value| Some(Element::classify(value)))
        .collect();

    let mut merged = Vec::with_capacity(dest.len() + pool.len());
    for element in dest.into_iter().map(Element::classify) {
        match element {
            Element::Anonymous(value) => merged.push(value),
            Element::Named { name, value } => match take_named(&mut pool, &name) {
                Some(matched) => merged.push(deep_merge(value, matched)),
                None => merged.push(value),
            },
        }
    }
    merged.extend(pool.into_iter().flatten().map(Element::into_value));
    merged
}

/// Serialize a document the way the config file is written: 4-space indent.
pub fn to_pretty_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Merge `fragment` into the JSON config at `path` and rewrite the file.
///
/// The write only happens after a fully successful read+merge, so a
/// failure anywhere leaves the previous file contents untouched. There is
/// no locking; callers must serialize invocations themselves.
pub fn merge_into_config_at(path: &Path, fragment: Value) -> Result<(), PersistenceError> {
    debug!("merging discovered fragment into {:?}", path);
    let merged = merge_documents(path, fragment)?;
    let text = to_pretty_json(&merged)?;
    std::fs::write(path, text).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Well-known location of the persisted Homebridge config.
pub fn persisted_config_path() -> Result<PathBuf, PersistenceError> {
    let dirs = directories::BaseDirs::new().ok_or(PersistenceError::NoHomeDir)?;
    Ok(dirs.home_dir().join(".homebridge").join("config.json"))
}

/// Merge `fragment` into `~/.homebridge/config.json`.
pub fn merge_into_persisted_config(fragment: Value) -> Result<(), PersistenceError> {
    merge_into_config_at(&persisted_config_path()?, fragment)
}

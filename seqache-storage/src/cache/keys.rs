//! Group and field key derivation.
//!
//! A cached query lives at `(GroupKey, FieldKey)`: the group names the
//! dataset's bucket, the field names one query inside it. Both keys can
//! only be built through the derivation functions below, so a field key
//! always reflects the canonical form of its arguments.

use std::fmt;
use std::io::Write;

use seqache_core::{Dataset, QueryArgs, SeqacheResult, SerializationError};
use serde_json::Value;

/// Separator between group key segments.
const SEPARATOR: char = ':';

/// Hex length of a 128-bit digest.
pub const FIELD_KEY_LEN: usize = 32;

/// Bucket identity for one dataset: `prefix:namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of one query inside a group: lowercase hex MD5 of the
/// canonical argument bytes. Always [`FIELD_KEY_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the group key for a dataset.
pub fn derive_group_key(prefix: &str, dataset: &Dataset) -> GroupKey {
    GroupKey(format!(
        "{prefix}{SEPARATOR}{}{SEPARATOR}{}",
        dataset.namespace, dataset.name
    ))
}

/// Derive the field key for a set of query arguments.
///
/// The raw-mode flag is excluded, so the key only depends on what the
/// query selects.
pub fn derive_field_key(args: &QueryArgs) -> SeqacheResult<FieldKey> {
    let bytes = canonical_json(&args.without_raw_flag())?;
    let digest = md5::compute(&bytes);
    Ok(FieldKey(hex::encode(digest.0)))
}

/// Serialize values as JSON with object keys sorted at every depth.
///
/// The output does not depend on map insertion order or on which
/// `serde_json` map features the build enables. Array order is kept.
pub fn canonical_json(values: &[Value]) -> SeqacheResult<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    write_array(&mut out, values)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> SeqacheResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write!(out, "{n}").map_err(arguments_error)?,
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => write_array(out, items)?,
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key)?;
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_array(out: &mut Vec<u8>, items: &[Value]) -> SeqacheResult<()> {
    out.push(b'[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_value(out, item)?;
    }
    out.push(b']');
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> SeqacheResult<()> {
    serde_json::to_writer(out, s).map_err(arguments_error)?;
    Ok(())
}

fn arguments_error(e: impl fmt::Display) -> SerializationError {
    SerializationError::Arguments {
        reason: e.to_string(),
    }
}

//! Encoding of [`ExtraMetadata`] into the generic metadata column.
//!
//! The envelope lives under a reserved key next to whatever else the column
//! holds. Writers always emit canonical field names; readers also accept the
//! names used by older ingestion scripts, listed in the alias tables below.

use serde_json::{Map, Value};
use validator::Validate;

use crate::error::{KbError, Result};
use crate::models::{ExtraMetadata, Metadata};

/// `(canonical, external)` names at the envelope level.
pub const ENVELOPE_ALIASES: &[(&str, &str)] =
    &[("auth", "permissions"), ("metadata", "item_metadata")];

/// `(canonical, external)` names inside `auth`.
pub const PERMISSION_ALIASES: &[(&str, &str)] =
    &[("users", "user_ids"), ("groups", "group_ids")];

/// `(canonical, external)` names inside `metadata`.
pub const ITEM_ALIASES: &[(&str, &str)] =
    &[("context_url", "contextUrl"), ("url", "item_url")];

/// The envelope nested under `key`, ready to be stored as the column value.
pub fn encode(extra: &ExtraMetadata, key: &str) -> Result<Value> {
    let mut column = Metadata::new();
    merge_into(&mut column, extra, key)?;
    Ok(Value::Object(column))
}

/// Write the envelope under `key`, keeping all unrelated keys of `column`.
pub fn merge_into(column: &mut Metadata, extra: &ExtraMetadata, key: &str) -> Result<()> {
    column.insert(key.to_string(), serde_json::to_value(extra)?);
    Ok(())
}

/// Read the envelope back out of a metadata column value.
///
/// A missing reserved key and any required-field violation are both
/// reported as [`KbError::MalformedMetadata`]; such rows carry no usable
/// ACL.
pub fn decode(column: &Value, key: &str) -> Result<ExtraMetadata> {
    let object = column
        .as_object()
        .ok_or_else(|| KbError::MalformedMetadata("metadata column is not an object".into()))?;
    let envelope = object
        .get(key)
        .ok_or_else(|| KbError::MalformedMetadata(format!("reserved key '{key}' is missing")))?;
    decode_envelope(envelope).map_err(KbError::MalformedMetadata)
}

pub fn decode_str(raw: &str, key: &str) -> Result<ExtraMetadata> {
    let column: Value = serde_json::from_str(raw)
        .map_err(|e| KbError::MalformedMetadata(format!("metadata column is not JSON: {e}")))?;
    decode(&column, key)
}

/// Parse an inbound ingestion payload.
///
/// The payload is either the bare envelope or an object nesting it under
/// `key`. Failures are caller errors and map to [`KbError::Validation`].
pub fn decode_payload(raw: &str, key: &str) -> Result<ExtraMetadata> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| KbError::Validation(format!("invalid metadata payload: {e}")))?;
    decode_payload_value(&value, key)
}

pub fn decode_payload_value(value: &Value, key: &str) -> Result<ExtraMetadata> {
    let envelope = match value.as_object() {
        Some(object) if object.contains_key(key) => &object[key],
        Some(_) => value,
        None => {
            return Err(KbError::Validation(
                "metadata payload must be a JSON object".to_string(),
            ))
        }
    };
    decode_envelope(envelope).map_err(KbError::Validation)
}

/// Render the envelope with external field names.
pub fn to_external(extra: &ExtraMetadata) -> Result<Value> {
    let mut value = serde_json::to_value(extra)?;
    if let Some(envelope) = value.as_object_mut() {
        for (canonical, _) in ENVELOPE_ALIASES {
            let aliases = match *canonical {
                "auth" => PERMISSION_ALIASES,
                _ => ITEM_ALIASES,
            };
            if let Some(Value::Object(inner)) = envelope.get_mut(*canonical) {
                rename_keys(inner, aliases, Direction::ToExternal);
            }
        }
        rename_keys(envelope, ENVELOPE_ALIASES, Direction::ToExternal);
    }
    Ok(value)
}

fn decode_envelope(envelope: &Value) -> std::result::Result<ExtraMetadata, String> {
    let Value::Object(object) = envelope else {
        return Err("envelope is not an object".to_string());
    };
    let mut object = object.clone();
    rename_keys(&mut object, ENVELOPE_ALIASES, Direction::ToCanonical);
    if let Some(Value::Object(auth)) = object.get_mut("auth") {
        rename_keys(auth, PERMISSION_ALIASES, Direction::ToCanonical);
    }
    if let Some(Value::Object(item)) = object.get_mut("metadata") {
        rename_keys(item, ITEM_ALIASES, Direction::ToCanonical);
    }

    let extra: ExtraMetadata =
        serde_json::from_value(Value::Object(object)).map_err(|e| e.to_string())?;
    extra.validate().map_err(|e| e.to_string())?;
    Ok(extra)
}

#[derive(Clone, Copy)]
enum Direction {
    ToCanonical,
    ToExternal,
}

/// Canonical wins when both names are present; the alias is dropped.
fn rename_keys(object: &mut Map<String, Value>, aliases: &[(&str, &str)], direction: Direction) {
    for (canonical, external) in aliases {
        let (from, to) = match direction {
            Direction::ToCanonical => (*external, *canonical),
            Direction::ToExternal => (*canonical, *external),
        };
        if let Some(value) = object.remove(from) {
            if !object.contains_key(to) {
                object.insert(to.to_string(), value);
            }
        }
    }
}

//! Lossless JSON conversion for the HTTP wire.
//!
//! Canonical bytes stay CBOR; this module maps field values to and from
//! `serde_json::Value` using the same `$`-tagged objects as the packed form
//! (`$ref`, `$type`, `$res`) plus `$bytes` for base64-encoded byte strings.

use base64::prelude::*;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use weft_cbor::Digest;

use crate::error::ResourceError;
use crate::registry;
use crate::resource::ResourceValue;
use crate::value::{FieldValue, Ref, TypeId};

fn type_id_to_json(type_id: &TypeId) -> JsonValue {
    json!({
        "digest": type_id.digest().to_hex(),
        "name": type_id.name(),
    })
}

fn type_id_from_json(value: &JsonValue) -> Result<TypeId, ResourceError> {
    let digest = Digest::from_hex(expect_str(&value["digest"], "type digest")?)?;
    TypeId::from_parts(expect_str(&value["name"], "type name")?, digest)
}

/// Renders a field value as JSON.
pub fn value_to_json(value: &FieldValue) -> Result<JsonValue, ResourceError> {
    Ok(match value {
        FieldValue::Null => JsonValue::Null,
        FieldValue::Int(v) => json!(v),
        FieldValue::Float(v) => json!(v),
        FieldValue::Bool(v) => json!(v),
        FieldValue::Str(v) => json!(v),
        FieldValue::Bytes(v) => json!({ "$bytes": BASE64_STANDARD.encode(v) }),
        FieldValue::Ref(r) => json!({
            "$ref": { "digest": r.digest().to_hex(), "type_id": type_id_to_json(r.type_id()) }
        }),
        FieldValue::Type(t) => json!({ "$type": type_id_to_json(t) }),
        FieldValue::List(items) => JsonValue::Array(
            items
                .iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        FieldValue::Map(entries) => {
            let mut map = JsonMap::new();
            for (key, item) in entries {
                if key.starts_with('$') {
                    return Err(ResourceError::ReservedMapKey(key.clone()));
                }
                map.insert(key.clone(), value_to_json(item)?);
            }
            JsonValue::Object(map)
        }
        FieldValue::Resource(inner) => json!({ "$res": resource_to_json(inner)? }),
    })
}

/// Parses a field value from JSON.
pub fn value_from_json(value: &JsonValue) -> Result<FieldValue, ResourceError> {
    Ok(match value {
        JsonValue::Null => FieldValue::Null,
        JsonValue::Bool(v) => FieldValue::Bool(*v),
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                FieldValue::Int(v)
            } else if let Some(v) = n.as_f64() {
                FieldValue::Float(v)
            } else {
                return Err(ResourceError::IntRange);
            }
        }
        JsonValue::String(v) => FieldValue::Str(v.clone()),
        JsonValue::Array(items) => FieldValue::List(
            items
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        JsonValue::Object(map) => {
            if map.len() == 1 {
                let (tag, body) = map.iter().next().expect("single entry");
                match tag.as_str() {
                    "$bytes" => {
                        let decoded = BASE64_STANDARD
                            .decode(expect_str(body, "$bytes payload")?)
                            .map_err(|e| ResourceError::Malformed(format!("bad base64: {e}")))?;
                        return Ok(FieldValue::Bytes(decoded));
                    }
                    "$ref" => {
                        let digest =
                            Digest::from_hex(expect_str(&body["digest"], "ref digest")?)?;
                        let type_id = type_id_from_json(&body["type_id"])?;
                        return Ok(FieldValue::Ref(Ref::new(type_id, digest)));
                    }
                    "$type" => return Ok(FieldValue::Type(type_id_from_json(body)?)),
                    "$res" => {
                        let inner = resource_from_json_tagged(body)?;
                        return Ok(FieldValue::Resource(Box::new(inner)));
                    }
                    other if other.starts_with('$') => {
                        return Err(ResourceError::Malformed(format!("unknown tag '{other}'")))
                    }
                    _ => {}
                }
            }
            let mut entries = std::collections::BTreeMap::new();
            for (key, item) in map {
                if key.starts_with('$') {
                    return Err(ResourceError::ReservedMapKey(key.clone()));
                }
                entries.insert(key.clone(), value_from_json(item)?);
            }
            FieldValue::Map(entries)
        }
    })
}

/// Renders a resource as `{"type_id": ..., "fields": {...}}`. JSON objects
/// do not preserve field order; consumers rebuild it from the registry.
pub fn resource_to_json(resource: &ResourceValue) -> Result<JsonValue, ResourceError> {
    let mut fields = JsonMap::new();
    for (name, value) in resource.fields() {
        fields.insert(name.clone(), value_to_json(value)?);
    }
    Ok(json!({
        "fields": fields,
        "type_id": type_id_to_json(resource.type_id()),
    }))
}

fn resource_from_json_tagged(value: &JsonValue) -> Result<ResourceValue, ResourceError> {
    let type_id = type_id_from_json(&value["type_id"])?;
    let fields = value
        .get("fields")
        .ok_or_else(|| ResourceError::Malformed("missing 'fields'".into()))?;
    resource_from_json(&type_id, fields)
}

/// Builds a resource of the given type from a JSON object of field values.
pub fn resource_from_json(
    type_id: &TypeId,
    fields: &JsonValue,
) -> Result<ResourceValue, ResourceError> {
    let entry = registry::lookup(type_id)?;
    let object = match fields {
        JsonValue::Object(map) => map,
        other => {
            return Err(ResourceError::Malformed(format!(
                "fields must be a JSON object, got {other}"
            )))
        }
    };
    let mut values = Vec::with_capacity(entry.field_names().len());
    for name in entry.field_names() {
        let item = object
            .get(*name)
            .ok_or_else(|| ResourceError::FieldMissing((*name).to_owned()))?;
        values.push(((*name).to_owned(), value_from_json(item)?));
    }
    for key in object.keys() {
        if !entry.field_names().iter().any(|name| *name == key.as_str()) {
            return Err(ResourceError::UnexpectedField(key.clone()));
        }
    }
    entry.canonicalize(ResourceValue::new(entry.type_id().clone(), values)?)
}

fn expect_str<'a>(value: &'a JsonValue, what: &str) -> Result<&'a str, ResourceError> {
    value
        .as_str()
        .ok_or_else(|| ResourceError::Malformed(format!("{what} must be a string")))
}

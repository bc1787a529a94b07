//! Packing between field values and the canonical wire form.
//!
//! The packed form is a CBOR value: a resource becomes a map
//! `{"fields": {...}, "type_id": {"digest": ..., "name": ...}}` and tagged
//! single-key maps (`$ref`, `$type`, `$res`) carry the non-primitive field
//! values. Map keys beginning with `$` are reserved for those tags.

use std::collections::BTreeMap;

use serde_cbor::Value as CborValue;
use weft_cbor::Digest;

use crate::error::ResourceError;
use crate::registry;
use crate::resource::ResourceValue;
use crate::value::{FieldValue, Ref, TypeId};

const TAG_REF: &str = "$ref";
const TAG_TYPE: &str = "$type";
const TAG_RES: &str = "$res";

fn text(value: impl Into<String>) -> CborValue {
    CborValue::Text(value.into())
}

fn type_id_to_cbor(type_id: &TypeId) -> CborValue {
    let mut map = BTreeMap::new();
    map.insert(text("digest"), text(type_id.digest().to_hex()));
    map.insert(text("name"), text(type_id.name()));
    CborValue::Map(map)
}

fn type_id_from_cbor(value: &CborValue) -> Result<TypeId, ResourceError> {
    let map = expect_map(value, "type id")?;
    let digest = Digest::from_hex(expect_text(require(map, "digest")?, "type digest")?)?;
    let name = expect_text(require(map, "name")?, "type name")?;
    TypeId::from_parts(name, digest)
}

/// Packs a single field value.
pub fn pack_value(value: &FieldValue) -> Result<CborValue, ResourceError> {
    Ok(match value {
        FieldValue::Null => CborValue::Null,
        FieldValue::Int(v) => CborValue::Integer(*v as i128),
        FieldValue::Float(v) => CborValue::Float(*v),
        FieldValue::Bool(v) => CborValue::Bool(*v),
        FieldValue::Str(v) => text(v.clone()),
        FieldValue::Bytes(v) => CborValue::Bytes(v.clone()),
        FieldValue::Ref(r) => {
            let mut body = BTreeMap::new();
            body.insert(text("digest"), text(r.digest().to_hex()));
            body.insert(text("type_id"), type_id_to_cbor(r.type_id()));
            tagged(TAG_REF, CborValue::Map(body))
        }
        FieldValue::Type(t) => tagged(TAG_TYPE, type_id_to_cbor(t)),
        FieldValue::List(items) => CborValue::Array(
            items
                .iter()
                .map(pack_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        FieldValue::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, item) in entries {
                if key.starts_with('$') {
                    return Err(ResourceError::ReservedMapKey(key.clone()));
                }
                map.insert(text(key.clone()), pack_value(item)?);
            }
            CborValue::Map(map)
        }
        FieldValue::Resource(inner) => tagged(TAG_RES, pack_body(inner)?),
    })
}

fn tagged(tag: &str, body: CborValue) -> CborValue {
    let mut map = BTreeMap::new();
    map.insert(text(tag), body);
    CborValue::Map(map)
}

fn pack_body(resource: &ResourceValue) -> Result<CborValue, ResourceError> {
    if !registry::is_registered(resource.type_id()) {
        return Err(ResourceError::UnknownType {
            name: resource.type_id().name().to_owned(),
            digest: *resource.type_id().digest(),
        });
    }
    let mut fields = BTreeMap::new();
    for (name, value) in resource.fields() {
        fields.insert(text(name.clone()), pack_value(value)?);
    }
    let mut map = BTreeMap::new();
    map.insert(text("fields"), CborValue::Map(fields));
    map.insert(text("type_id"), type_id_to_cbor(resource.type_id()));
    Ok(CborValue::Map(map))
}

/// Packs a resource into its canonical wire form.
pub fn pack(resource: &ResourceValue) -> Result<CborValue, ResourceError> {
    pack_body(resource)
}

/// Canonical bytes of the packed form; the input to content digesting.
pub fn canonical_bytes(resource: &ResourceValue) -> Result<Vec<u8>, ResourceError> {
    Ok(weft_cbor::to_canonical_cbor(&pack(resource)?)?)
}

/// Content digest of a resource.
pub fn digest_of(resource: &ResourceValue) -> Result<Digest, ResourceError> {
    Ok(Digest::of_bytes(&canonical_bytes(resource)?))
}

/// Commits-side helper: the reference a resource would commit to.
pub fn ref_of(resource: &ResourceValue) -> Result<Ref, ResourceError> {
    Ok(Ref::new(resource.type_id().clone(), digest_of(resource)?))
}

/// Unpacks a single field value.
pub fn unpack_value(value: &CborValue) -> Result<FieldValue, ResourceError> {
    Ok(match value {
        CborValue::Null => FieldValue::Null,
        CborValue::Bool(v) => FieldValue::Bool(*v),
        CborValue::Integer(v) => {
            FieldValue::Int(i64::try_from(*v).map_err(|_| ResourceError::IntRange)?)
        }
        CborValue::Float(v) => FieldValue::Float(*v),
        CborValue::Text(v) => FieldValue::Str(v.clone()),
        CborValue::Bytes(v) => FieldValue::Bytes(v.clone()),
        CborValue::Array(items) => FieldValue::List(
            items
                .iter()
                .map(unpack_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        CborValue::Map(map) => return unpack_map(map),
        other => {
            return Err(ResourceError::Malformed(format!(
                "value {other:?} is outside the field value universe"
            )))
        }
    })
}

fn unpack_map(map: &BTreeMap<CborValue, CborValue>) -> Result<FieldValue, ResourceError> {
    if map.len() == 1 {
        let (key, body) = map.iter().next().expect("single entry");
        if let CborValue::Text(tag) = key {
            match tag.as_str() {
                TAG_REF => {
                    let body = expect_map(body, "ref")?;
                    let digest =
                        Digest::from_hex(expect_text(require(body, "digest")?, "ref digest")?)?;
                    let type_id = type_id_from_cbor(require(body, "type_id")?)?;
                    return Ok(FieldValue::Ref(Ref::new(type_id, digest)));
                }
                TAG_TYPE => return Ok(FieldValue::Type(type_id_from_cbor(body)?)),
                TAG_RES => return Ok(FieldValue::Resource(Box::new(unpack(body)?))),
                other if other.starts_with('$') => {
                    return Err(ResourceError::Malformed(format!("unknown tag '{other}'")))
                }
                _ => {}
            }
        }
    }
    let mut entries = BTreeMap::new();
    for (key, item) in map {
        let key = match key {
            CborValue::Text(k) => k.clone(),
            other => {
                return Err(ResourceError::Malformed(format!(
                    "map key {other:?} is not a string"
                )))
            }
        };
        if key.starts_with('$') {
            return Err(ResourceError::ReservedMapKey(key));
        }
        entries.insert(key, unpack_value(item)?);
    }
    Ok(FieldValue::Map(entries))
}

/// Unpacks a packed resource, resolving its type through the registry.
pub fn unpack(value: &CborValue) -> Result<ResourceValue, ResourceError> {
    let map = expect_map(value, "packed resource")?;
    if map.len() != 2 {
        return Err(ResourceError::Malformed(
            "packed resource must have exactly 'fields' and 'type_id'".into(),
        ));
    }
    let type_id = type_id_from_cbor(require(map, "type_id")?)?;
    let entry = registry::lookup(&type_id)?;
    let packed_fields = expect_map(require(map, "fields")?, "fields")?;

    let mut remaining: BTreeMap<String, &CborValue> = BTreeMap::new();
    for (key, item) in packed_fields {
        match key {
            CborValue::Text(k) => {
                remaining.insert(k.clone(), item);
            }
            other => {
                return Err(ResourceError::Malformed(format!(
                    "field name {other:?} is not a string"
                )))
            }
        }
    }

    let mut fields = Vec::with_capacity(entry.field_names().len());
    for name in entry.field_names() {
        let item = remaining
            .remove(*name)
            .ok_or_else(|| ResourceError::FieldMissing((*name).to_owned()))?;
        fields.push(((*name).to_owned(), unpack_value(item)?));
    }
    if let Some((extra, _)) = remaining.into_iter().next() {
        return Err(ResourceError::UnexpectedField(extra));
    }

    entry.canonicalize(ResourceValue::new(type_id, fields)?)
}

/// Unpacks canonical bytes back into a resource.
pub fn unpack_bytes(bytes: &[u8]) -> Result<ResourceValue, ResourceError> {
    let value: CborValue = serde_cbor::from_slice(bytes)?;
    unpack(&value)
}

fn expect_map<'a>(
    value: &'a CborValue,
    what: &str,
) -> Result<&'a BTreeMap<CborValue, CborValue>, ResourceError> {
    match value {
        CborValue::Map(map) => Ok(map),
        other => Err(ResourceError::Malformed(format!(
            "{what} must be a map, got {other:?}"
        ))),
    }
}

fn expect_text<'a>(value: &'a CborValue, what: &str) -> Result<&'a str, ResourceError> {
    match value {
        CborValue::Text(v) => Ok(v),
        other => Err(ResourceError::Malformed(format!(
            "{what} must be text, got {other:?}"
        ))),
    }
}

fn require<'a>(
    map: &'a BTreeMap<CborValue, CborValue>,
    key: &str,
) -> Result<&'a CborValue, ResourceError> {
    map.get(&CborValue::Text(key.to_owned()))
        .ok_or_else(|| ResourceError::Malformed(format!("missing '{key}'")))
}

use std::collections::BTreeMap;
use std::fmt;

use weft_cbor::Digest;

use crate::error::ResourceError;
use crate::resource::ResourceValue;

/// Stable identity of a registered resource type.
///
/// The digest is derived from the registered name string, so two processes
/// that register the same name agree on the identity without coordination.
#[derive(Clone)]
pub struct TypeId {
    name: String,
    digest: Digest,
}

impl TypeId {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let digest = Digest::of_bytes(name.as_bytes());
        TypeId { name, digest }
    }

    /// Reconstructs a type id from its parts, checking the digest matches.
    pub fn from_parts(name: impl Into<String>, digest: Digest) -> Result<Self, ResourceError> {
        let id = Self::named(name);
        if id.digest != digest {
            return Err(ResourceError::Malformed(format!(
                "type digest {} does not match name '{}'",
                digest, id.name
            )));
        }
        Ok(id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

impl PartialEq for TypeId {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for TypeId {}

impl PartialOrd for TypeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.digest.cmp(&other.digest)
    }
}

impl std::hash::Hash for TypeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, &self.digest.to_hex()[..8])
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Reference to a committed resource: the target's type plus content digest.
#[derive(Clone)]
pub struct Ref {
    type_id: TypeId,
    digest: Digest,
}

impl Ref {
    pub fn new(type_id: TypeId, digest: Digest) -> Self {
        Ref { type_id, digest }
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest && self.type_id == other.type_id
    }
}

impl Eq for Ref {}

impl PartialOrd for Ref {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ref {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.type_id.digest(), &self.digest).cmp(&(other.type_id.digest(), &other.digest))
    }
}

impl std::hash::Hash for Ref {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.digest.hash(state);
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_id.name(), &self.digest.to_hex()[..8])
    }
}

/// The closed universe of values a resource field may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Ref(Ref),
    Type(TypeId),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Resource(Box<ResourceValue>),
}

impl FieldValue {
    /// Human-readable kind string used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::Str(_) => "str",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Ref(_) => "ref",
            FieldValue::Type(_) => "type",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
            FieldValue::Resource(_) => "resource",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ResourceError {
        ResourceError::ValueKind {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_int(&self) -> Result<i64, ResourceError> {
        match self {
            FieldValue::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, ResourceError> {
        match self {
            FieldValue::Float(v) => Ok(*v),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ResourceError> {
        match self {
            FieldValue::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ResourceError> {
        match self {
            FieldValue::Str(v) => Ok(v),
            other => Err(other.mismatch("str")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], ResourceError> {
        match self {
            FieldValue::Bytes(v) => Ok(v),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_ref_value(&self) -> Result<&Ref, ResourceError> {
        match self {
            FieldValue::Ref(v) => Ok(v),
            other => Err(other.mismatch("ref")),
        }
    }

    pub fn as_type(&self) -> Result<&TypeId, ResourceError> {
        match self {
            FieldValue::Type(v) => Ok(v),
            other => Err(other.mismatch("type")),
        }
    }

    pub fn as_list(&self) -> Result<&[FieldValue], ResourceError> {
        match self {
            FieldValue::List(v) => Ok(v),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, FieldValue>, ResourceError> {
        match self {
            FieldValue::Map(v) => Ok(v),
            other => Err(other.mismatch("map")),
        }
    }

    pub fn as_resource(&self) -> Result<&ResourceValue, ResourceError> {
        match self {
            FieldValue::Resource(v) => Ok(v),
            other => Err(other.mismatch("resource")),
        }
    }

    /// `Null` maps to `None`; anything else is passed to `f`.
    pub fn as_option<T>(
        &self,
        f: impl FnOnce(&FieldValue) -> Result<T, ResourceError>,
    ) -> Result<Option<T>, ResourceError> {
        match self {
            FieldValue::Null => Ok(None),
            other => f(other).map(Some),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_owned())
    }
}

impl From<Ref> for FieldValue {
    fn from(value: Ref) -> Self {
        FieldValue::Ref(value)
    }
}

impl From<TypeId> for FieldValue {
    fn from(value: TypeId) -> Self {
        FieldValue::Type(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_id_equality_is_by_digest() {
        let a = TypeId::named("demo/thing@1");
        let b = TypeId::named("demo/thing@1");
        let c = TypeId::named("demo/other@1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn from_parts_checks_digest() {
        let id = TypeId::named("demo/thing@1");
        assert!(TypeId::from_parts("demo/thing@1", *id.digest()).is_ok());
        assert!(TypeId::from_parts("demo/other@1", *id.digest()).is_err());
    }

    #[test]
    fn accessor_mismatch_names_kinds() {
        let err = FieldValue::Int(1).as_str().unwrap_err();
        match err {
            ResourceError::ValueKind { expected, found } => {
                assert_eq!(expected, "str");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn option_accessor_maps_null() {
        assert_eq!(
            FieldValue::Null.as_option(|v| v.as_int()).unwrap(),
            None
        );
        assert_eq!(
            FieldValue::Int(3).as_option(|v| v.as_int()).unwrap(),
            Some(3)
        );
    }
}

use thiserror::Error;
use weft_cbor::{Digest, DigestParseError};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unknown type '{name}' ({digest})")]
    UnknownType { name: String, digest: Digest },
    #[error("type name '{0}' is already bound to a different type")]
    DuplicateType(String),
    #[error("missing field '{0}'")]
    FieldMissing(String),
    #[error("unexpected field '{0}'")]
    UnexpectedField(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("'{type_name}' declares {names} field names but produced {values} values")]
    FieldListMismatch {
        type_name: String,
        names: usize,
        values: usize,
    },
    #[error("expected {expected} value, got {found}")]
    ValueKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error("map key '{0}' is reserved for the packed encoding")]
    ReservedMapKey(String),
    #[error("integer value out of range")]
    IntRange,
    #[error("resource type mismatch: expected '{expected}', got '{found}'")]
    TypeMismatch { expected: String, found: String },
    #[error("malformed packed value: {0}")]
    Malformed(String),
    #[error(transparent)]
    Digest(#[from] DigestParseError),
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

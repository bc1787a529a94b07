//! Structurally typed resources over a closed field-value universe, with
//! canonical packing and a process-wide type registry.

mod error;
pub mod json;
pub mod pack;
pub mod registry;
mod resource;
mod value;

pub use error::ResourceError;
pub use pack::{canonical_bytes, digest_of, pack, pack_value, ref_of, unpack, unpack_bytes, unpack_value};
pub use resource::{FieldMap, Resource, ResourceValue};
pub use value::{FieldValue, Ref, TypeId};

use std::any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use weft_cbor::Digest;

use crate::error::ResourceError;
use crate::resource::{Resource, ResourceValue};
use crate::value::TypeId;

type Canonicalize = Arc<dyn Fn(ResourceValue) -> Result<ResourceValue, ResourceError> + Send + Sync>;

/// Registry entry for one resource type.
#[derive(Clone)]
pub struct TypeEntry {
    type_id: TypeId,
    field_names: &'static [&'static str],
    rust_id: any::TypeId,
    canonicalize: Canonicalize,
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry")
            .field("type_id", &self.type_id)
            .field("field_names", &self.field_names)
            .field("rust_id", &self.rust_id)
            .finish()
    }
}

impl TypeEntry {
    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        self.field_names
    }

    /// Re-validates unpacked fields by round-tripping through the typed
    /// constructor, enforcing the declared field list.
    pub fn canonicalize(&self, value: ResourceValue) -> Result<ResourceValue, ResourceError> {
        (self.canonicalize)(value)
    }
}

static REGISTRY: Lazy<RwLock<HashMap<Digest, TypeEntry>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Binds `T::type_name()` to `T`.
///
/// Re-registering the same Rust type is a no-op; a different type under an
/// already-bound name fails with `DuplicateType`.
pub fn register<T: Resource + 'static>() -> Result<TypeId, ResourceError> {
    let type_id = T::type_id();
    let mut registry = REGISTRY.write().expect("registry poisoned");
    if let Some(existing) = registry.get(type_id.digest()) {
        if existing.rust_id == any::TypeId::of::<T>() {
            return Ok(type_id);
        }
        return Err(ResourceError::DuplicateType(type_id.name().to_owned()));
    }
    log::debug!("registering resource type '{}'", type_id.name());
    registry.insert(
        *type_id.digest(),
        TypeEntry {
            type_id: type_id.clone(),
            field_names: T::field_names(),
            rust_id: any::TypeId::of::<T>(),
            canonicalize: Arc::new(|value: ResourceValue| value.typed::<T>()?.to_value()),
        },
    );
    Ok(type_id)
}

/// Looks up the entry for a type id, failing with `UnknownType` if absent.
pub fn lookup(type_id: &TypeId) -> Result<TypeEntry, ResourceError> {
    REGISTRY
        .read()
        .expect("registry poisoned")
        .get(type_id.digest())
        .cloned()
        .ok_or_else(|| ResourceError::UnknownType {
            name: type_id.name().to_owned(),
            digest: *type_id.digest(),
        })
}

/// Returns the registered type id for a name, if any.
pub fn type_id_for(name: &str) -> Option<TypeId> {
    let id = TypeId::named(name);
    REGISTRY
        .read()
        .expect("registry poisoned")
        .get(id.digest())
        .map(|entry| entry.type_id.clone())
}

pub fn is_registered(type_id: &TypeId) -> bool {
    REGISTRY
        .read()
        .expect("registry poisoned")
        .contains_key(type_id.digest())
}

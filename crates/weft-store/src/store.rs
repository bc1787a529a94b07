use std::path::Path;
use std::sync::Arc;

use weft_cbor::Digest;
use weft_resource::{canonical_bytes, unpack_bytes, Ref, Resource, ResourceValue};

use crate::{Backend, FsBackend, MemBackend, StoreError, StoreResult};

/// Commit and checkout surface over one backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Store { backend }
    }

    pub fn in_memory() -> Self {
        Store::new(Arc::new(MemBackend::new()))
    }

    pub fn on_disk(root: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Store::new(Arc::new(FsBackend::open(root)?)))
    }

    /// Packs, hashes, and commits a resource, returning its reference.
    ///
    /// Deterministic and idempotent: equal resources yield equal references
    /// and re-committing present content is a no-op.
    pub fn commit<T: Resource>(&self, resource: &T) -> StoreResult<Ref> {
        self.commit_value(&resource.to_value()?)
    }

    pub fn commit_value(&self, resource: &ResourceValue) -> StoreResult<Ref> {
        let bytes = canonical_bytes(resource)?;
        let digest = Digest::of_bytes(&bytes);
        self.backend.commit(&digest, &bytes)?;
        log::trace!("commit {} -> {}", resource.type_id(), digest);
        Ok(Ref::new(resource.type_id().clone(), digest))
    }

    pub fn has(&self, r: &Ref) -> StoreResult<bool> {
        self.backend.has(r.digest())
    }

    /// Checks out the erased resource a reference names.
    pub fn checkout_value(&self, r: &Ref) -> StoreResult<ResourceValue> {
        let bytes = self
            .backend
            .get(r.digest())?
            .ok_or(StoreError::NotFound {
                digest: *r.digest(),
            })?;
        let actual = Digest::of_bytes(&bytes);
        if actual != *r.digest() {
            return Err(StoreError::Corrupt {
                digest: *r.digest(),
                detail: format!("content hashes to {actual}"),
            });
        }
        Ok(unpack_bytes(&bytes)?)
    }

    /// Checks out a typed resource.
    pub fn checkout<T: Resource>(&self, r: &Ref) -> StoreResult<T> {
        Ok(self.checkout_value(r)?.typed::<T>()?)
    }

    /// Checks out a mutable copy, runs `f` on it, then re-commits and
    /// rebinds `r` to the new digest. Other references holding the prior
    /// digest are unaffected.
    pub fn modify<T: Resource, R>(
        &self,
        r: &mut Ref,
        f: impl FnOnce(&mut T) -> R,
    ) -> StoreResult<R> {
        self.try_modify(r, |value| Ok::<R, StoreError>(f(value)))
    }

    /// Fallible variant of [`Store::modify`]: when `f` fails, nothing is
    /// committed and `r` keeps its original digest.
    pub fn try_modify<T: Resource, R, E: From<StoreError>>(
        &self,
        r: &mut Ref,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut value: T = self.checkout(r)?;
        let out = f(&mut value)?;
        *r = self.commit(&value)?;
        Ok(out)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

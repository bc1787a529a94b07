use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use weft_cbor::Digest;

use crate::{Backend, StoreResult};

/// In-memory backend: a digest-keyed map behind a read-write lock.
#[derive(Clone, Default)]
pub struct MemBackend {
    entries: Arc<RwLock<HashMap<Digest, Vec<u8>>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBackend").field("entries", &self.len()).finish()
    }
}

impl Backend for MemBackend {
    fn commit(&self, digest: &Digest, bytes: &[u8]) -> StoreResult<()> {
        let mut guard = self.entries.write().expect("store poisoned");
        guard.entry(*digest).or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn has(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self
            .entries
            .read()
            .expect("store poisoned")
            .contains_key(digest))
    }

    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .expect("store poisoned")
            .get(digest)
            .cloned())
    }
}

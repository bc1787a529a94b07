//! Content-addressed storage: backend plug-ins, the [`Store`] commit and
//! checkout surface, and the ambient per-thread store context.

pub mod context;
mod fs_backend;
mod mem_backend;
mod store;

pub use context::{current, StoreGuard};
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
pub use store::Store;

use std::{io, path::PathBuf};
use thiserror::Error;
use weft_cbor::Digest;
use weft_resource::ResourceError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend plug-in contract: an associative set of canonical byte blobs
/// keyed by digest.
///
/// Implementations must be idempotent for equal content, safe under
/// concurrent commits, and atomic per digest.
pub trait Backend: Send + Sync {
    fn commit(&self, digest: &Digest, bytes: &[u8]) -> StoreResult<()>;
    fn has(&self, digest: &Digest) -> StoreResult<bool>;
    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource {digest} not found")]
    NotFound { digest: Digest },
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt entry {digest}: {detail}")]
    Corrupt { digest: Digest, detail: String },
    #[error("no active store is bound to this thread")]
    NoActiveStore,
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}

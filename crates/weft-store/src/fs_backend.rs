use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use weft_cbor::Digest;

use crate::{io_error, Backend, StoreError, StoreResult};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem backend: one file per digest under `<root>`, sharded by the
/// first two hex characters. Writes land in a unique temporary sibling and
/// are renamed into place, so partial files never become visible.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(FsBackend { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.root.join(&hex[..2]).join(hex)
    }
}

impl Backend for FsBackend {
    fn commit(&self, digest: &Digest, bytes: &[u8]) -> StoreResult<()> {
        let path = self.entry_path(digest);
        if path.exists() {
            return Ok(());
        }
        let dir = path.parent().expect("entry path has a shard directory");
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let tmp = dir.join(format!(
            ".tmp-{}-{}-{}",
            digest.to_hex(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        file.write_all(bytes).map_err(|e| io_error(&tmp, e))?;
        file.sync_all().map_err(|e| io_error(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        log::debug!("committed {} to {}", digest, path.display());
        Ok(())
    }

    fn has(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.entry_path(digest).exists())
    }

    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>> {
        let path = self.entry_path(digest);
        match fs::read(&path) {
            Ok(bytes) => {
                let actual = Digest::of_bytes(&bytes);
                if actual != *digest {
                    return Err(StoreError::Corrupt {
                        digest: *digest,
                        detail: format!("content hashes to {actual}"),
                    });
                }
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(path, err)),
        }
    }
}

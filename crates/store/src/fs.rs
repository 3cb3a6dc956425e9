//! Filesystem-backed model store.
//!
//! Layout under the root directory:
//!
//! ```text
//! items/{item_id}.ckpt        per-item checkpoints
//! pretrained/{category}.ckpt  category warm starts
//! *.ckpt.bad                  quarantined files
//! ```
//!
//! Writes are crash-consistent: encode to `{name}.ckpt.tmp`, fsync,
//! rename over `{name}.ckpt`. A partial write never replaces a valid
//! file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use larder_checkpoint::{decode, encode, CheckpointOwner, ModelCheckpoint};

use crate::error::StoreError;
use crate::traits::ModelStore;

const CKPT_EXT: &str = "ckpt";

/// Model store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    /// Opens (and creates, if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the `items/` or
    /// `pretrained/` subdirectories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("items"))?;
        fs::create_dir_all(root.join("pretrained"))?;
        Ok(Self { root })
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the checkpoint file for an owner.
    pub fn path_for(&self, owner: &CheckpointOwner) -> PathBuf {
        let dir = match owner {
            CheckpointOwner::Item(_) => "items",
            CheckpointOwner::Category(_) => "pretrained",
        };
        self.root
            .join(dir)
            .join(format!("{}.{CKPT_EXT}", owner.key()))
    }
}

impl ModelStore for FsModelStore {
    fn load(&self, owner: &CheckpointOwner) -> Result<Option<ModelCheckpoint>, StoreError> {
        let path = self.path_for(owner);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint = decode(&bytes)?;
        debug!(key = owner.key(), version = checkpoint.version, "checkpoint loaded");
        Ok(Some(checkpoint))
    }

    fn store(
        &self,
        owner: &CheckpointOwner,
        checkpoint: &ModelCheckpoint,
    ) -> Result<(), StoreError> {
        let path = self.path_for(owner);
        let tmp = path.with_extension(format!("{CKPT_EXT}.tmp"));
        let bytes = encode(checkpoint);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(key = owner.key(), version = checkpoint.version, "checkpoint stored");
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let mut categories = Vec::new();
        for entry in fs::read_dir(self.root.join("pretrained"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CKPT_EXT)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                categories.push(stem.to_string());
            }
        }
        categories.sort();
        Ok(categories)
    }

    fn quarantine(&self, owner: &CheckpointOwner, reason: &str) -> Result<(), StoreError> {
        let path = self.path_for(owner);
        let bad = path.with_extension(format!("{CKPT_EXT}.bad"));
        match fs::rename(&path, &bad) {
            Ok(()) => {
                warn!(key = owner.key(), reason, "checkpoint quarantined");
                Ok(())
            }
            // Already gone: nothing to quarantine.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

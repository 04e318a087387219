//! Filesystem implementation of the BlobStore trait.
//!
//! Each key maps to one file below the root directory, one directory level
//! per key component. Replacement goes through a sibling temp file and a
//! rename, so readers see either the old or the new value. All I/O runs on
//! the blocking pool via `spawn_blocking`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::keys::{validate_key, validate_prefix, SEPARATOR};
use crate::traits::{BlobStore, InsertResult};

/// Prefix of in-flight temp files; never reported by `list`.
const TEMP_PREFIX: &str = ".tmp-";

/// Filesystem-based store implementation.
pub struct FsStore {
    root: Arc<PathBuf>,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        create_private_dirs(&root)?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a blocking closure against the root directory.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || f(&root)).await?
    }
}

/// Map a validated key (or prefix stem) to a path under `root`.
fn path_for(root: &Path, key: &str) -> PathBuf {
    key.split(SEPARATOR)
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |path, component| path.join(component))
}

#[cfg(unix)]
fn create_private_dirs(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dirs(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent()
        .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))
}

/// Collect every file below `dir`, as keys prefixed with `prefix`.
fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with(TEMP_PREFIX) {
            continue;
        }

        let key = format!("{}{}", prefix, name);
        if entry.file_type()?.is_dir() {
            walk(&entry.path(), &format!("{}{}", key, SEPARATOR), out)?;
        } else {
            out.push(key);
        }
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let key = key.to_string();

        self.run(move |root| match fs::read(path_for(root, &key)) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        validate_key(key)?;
        let key = key.to_string();

        self.run(move |root| {
            let path = path_for(root, &key);
            let dir = parent_of(&path)?;
            create_private_dirs(dir)?;

            let mut temp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(dir)?;
            temp.write_all(&value)?;
            temp.as_file().sync_all()?;
            temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
    }

    async fn create(&self, key: &str, value: Bytes) -> Result<InsertResult> {
        validate_key(key)?;
        let key = key.to_string();

        self.run(move |root| {
            let path = path_for(root, &key);
            let dir = parent_of(&path)?;
            create_private_dirs(dir)?;

            // Stage the full value, then link it into place without clobbering,
            // so a failed write never leaves a truncated entry under `key`.
            let mut temp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(dir)?;
            temp.write_all(&value)?;
            temp.as_file().sync_all()?;

            match temp.persist_noclobber(&path) {
                Ok(_) => Ok(InsertResult::Inserted),
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    Ok(InsertResult::AlreadyExists)
                }
                Err(e) => Err(StoreError::Io(e.error)),
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let key = key.to_string();

        self.run(move |root| match fs::remove_file(path_for(root, &key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let prefix = prefix.to_string();

        self.run(move |root| {
            let mut keys = Vec::new();
            walk(&path_for(root, &prefix), &prefix, &mut keys)?;
            keys.sort();
            Ok(keys)
        })
        .await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(StoreError::InvalidKey("refusing to delete the whole store".into()));
        }
        validate_prefix(prefix)?;
        let prefix = prefix.to_string();

        self.run(move |root| {
            let dir = path_for(root, &prefix);
            let mut keys = Vec::new();
            walk(&dir, &prefix, &mut keys)?;

            match fs::remove_dir_all(&dir) {
                Ok(()) => Ok(keys.len()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

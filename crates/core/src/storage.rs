// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value storage for durable client state.
//!
//! Two implementations are provided:
//! - [`MemoryStore`] keeps records in memory (tests, ephemeral sessions)
//! - [`FileStore`] keeps one file per key, replaced atomically on write
//!
//! Several handles, possibly in different processes, may share one store.
//! Read-modify-write sequences hold [`Storage::lock`] for their duration.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// A string key-value store.
///
/// A successful `put` or `delete` must be durable: after it returns, a fresh
/// store opened over the same medium observes the change.
pub trait Storage: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Lists all keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Takes the store's exclusive lock, blocking until it is free.
    ///
    /// Excludes every other holder of the same underlying store until the
    /// returned guard is dropped. Stores without sharing need not lock.
    fn lock(&self) -> Result<StoreLock<'_>> {
        Ok(StoreLock::unlocked())
    }
}

/// Exclusive hold on a store, released on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct StoreLock<'a> {
    _memory: Option<MutexGuard<'a, ()>>,
    // The advisory lock lives as long as the open file
    _file: Option<File>,
}

impl StoreLock<'_> {
    /// A guard that excludes nothing.
    pub fn unlocked() -> Self {
        StoreLock {
            _memory: None,
            _file: None,
        }
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix)
    }

    fn lock(&self) -> Result<StoreLock<'_>> {
        (**self).lock()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory store. Clones share the same contents and the same lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, String>>>,
    exclusive: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.records
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        Ok(self.records()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        self.records()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.records()?.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn lock(&self) -> Result<StoreLock<'_>> {
        let guard = self
            .exclusive
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(StoreLock {
            _memory: Some(guard),
            _file: None,
        })
    }
}

/// File-backed store: one `<hex(key)>.json` file per key in a directory.
///
/// Writes go to a temporary file that is fsynced and then renamed over the
/// target, so a record on disk is always either the old or the new version.
/// [`Storage::lock`] takes an advisory lock on `.lock` in the directory, which
/// every `FileStore` over that directory honours, across processes too.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

const RECORD_EXT: &str = "json";
const LOCK_FILE: &str = ".lock";

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(FileStore {
            dir: dir.to_path_buf(),
        })
    }

    /// The directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXT}", hex::encode(key.as_bytes())))
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let path = self.path_for(key);
        // Per-process temp name so concurrent writers never share one
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));

        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Foreign files in the directory are ignored
            let Some(key) = hex::decode(stem)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn lock(&self) -> Result<StoreLock<'_>> {
        use fs2::FileExt;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;

        Ok(StoreLock {
            _memory: None,
            _file: Some(file),
        })
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;

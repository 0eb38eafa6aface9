//! File-Backed Storage Module
//!
//! A `KeyValueStore` that keeps the whole origin map in a single JSON file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::storage::memory::usage_after;
use crate::storage::KeyValueStore;

// == File Store ==
/// JSON-file key-value store. Every mutation rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// A file that cannot be read or parsed is treated as empty and replaced on
    /// the next write. Fails only if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, quota_bytes: Option<usize>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(parent_dir(&path)).map_err(|e| io_error(&path, e))?;

        let items = if path.exists() {
            load(&path).unwrap_or_else(|e| {
                warn!("Discarding unreadable store file {}: {}", path.display(), e);
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        debug!("Opened file store at {} ({} keys)", path.display(), items.len());

        Ok(Self {
            path,
            items: Mutex::new(items),
            quota_bytes,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a sibling temp file and renames it over the target, so a crash
    /// leaves either the old file or the new one.
    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_vec(items)?;
        let mut tmp =
            NamedTempFile::new_in(parent_dir(&self.path)).map_err(|e| io_error(&self.path, e))?;
        tmp.write_all(&contents)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| io_error(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| io_error(&self.path, e.error))?;
        Ok(())
    }

    /// Applies `change` to a copy of the map, persists it, then commits.
    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<()>,
    {
        let mut items = self.items.lock().map_err(|_| {
            CacheError::StorageUnavailable("Lock poisoned: file store".to_string())
        })?;
        let mut next = items.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

fn load(path: &Path) -> std::result::Result<BTreeMap<String, String>, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&contents).map_err(|e| e.to_string())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::StorageUnavailable(format!("{}: {}", path.display(), err))
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| {
            CacheError::StorageUnavailable("Lock poisoned: file store".to_string())
        })?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let quota = self.quota_bytes;
        self.mutate(|items| {
            if let Some(quota) = quota {
                let used = usage_after(items, key, value);
                if used > quota {
                    return Err(CacheError::QuotaExceeded(format!(
                        "writing '{}' needs {} bytes, quota is {}",
                        key, used, quota
                    )));
                }
            }
            items.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        {
            let items = self.items.lock().map_err(|_| {
                CacheError::StorageUnavailable("Lock poisoned: file store".to_string())
            })?;
            if !items.contains_key(key) {
                return Ok(());
            }
        }
        self.mutate(|items| {
            items.remove(key);
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        let items = self.items.lock().map_err(|_| {
            CacheError::StorageUnavailable("Lock poisoned: file store".to_string())
        })?;
        Ok(items.keys().cloned().collect())
    }
}

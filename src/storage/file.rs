//! File-backed key-value store (host builds)
//!
//! Each namespace is one small JSON object on disk, e.g.
//! `odometer.json` = `{"total": 1234.5, "total_bak": 1234.5}`. A file holding
//! only `{"total": <float>}` (the single-slot layout) is read as-is.
//!
//! Every write serializes the whole namespace to `<namespace>.json.tmp`,
//! syncs it, renames it over the live file and syncs the directory, so a
//! crash leaves either the previous or the new file, never a half-written one.

use super::{hash_name, validate_name, KeyValueStore, NamespaceHandle, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// On-disk namespace contents
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct NamespaceFile {
    values: BTreeMap<String, f32>,
}

#[derive(Debug)]
struct OpenNamespace {
    id: u32,
    path: PathBuf,
    contents: NamespaceFile,
}

/// Key-value store in a directory of JSON files
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    open: Option<OpenNamespace>,
}

impl FileStore {
    /// Create a store rooted at `dir` (created on first open)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: None,
        }
    }

    /// Directory holding the namespace files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `namespace`
    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", namespace))
    }

    fn load(path: &Path) -> Result<NamespaceFile, StorageError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                crate::log_info!("No odometer file yet, starting empty");
                return Ok(NamespaceFile::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<NamespaceFile>(&text) {
            Ok(contents) => Ok(contents),
            Err(_) => {
                crate::log_warn!("Odometer file unreadable, starting empty");
                Ok(NamespaceFile::default())
            }
        }
    }

    fn persist(path: &Path, contents: &NamespaceFile) -> Result<(), StorageError> {
        let json = serde_json::to_vec(contents).map_err(|_| StorageError::Unavailable)?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        if let Err(e) = Self::replace(&tmp_path, path, &json) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // Fsync parent directory so the rename itself survives power loss
        if let Some(parent) = path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all(); // Best effort, may fail on some filesystems
            }
        }

        Ok(())
    }

    /// Write `data` to `tmp_path`, fsync it and rename it over `path`
    fn replace(tmp_path: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, path)
    }

    fn namespace_mut(&mut self, handle: &NamespaceHandle) -> Result<&mut OpenNamespace, StorageError> {
        match self.open.as_mut() {
            Some(open) if open.id == handle.id() => Ok(open),
            _ => Err(StorageError::NotOpen),
        }
    }
}

impl KeyValueStore for FileStore {
    fn open(&mut self, namespace: &str) -> Result<NamespaceHandle, StorageError> {
        let namespace = validate_name(namespace)?;

        if self.open.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        if fs::create_dir_all(&self.dir).is_err() {
            crate::log_error!("Cannot create odometer directory");
            return Err(StorageError::Unavailable);
        }

        let path = self.namespace_path(&namespace);
        let contents = Self::load(&path).map_err(|_| StorageError::Unavailable)?;

        let id = hash_name(&namespace);
        self.open = Some(OpenNamespace { id, path, contents });
        Ok(NamespaceHandle::new(id))
    }

    fn get_f32(&mut self, handle: &NamespaceHandle, key: &str, default: f32) -> f32 {
        match self.namespace_mut(handle) {
            Ok(open) => open.contents.values.get(key).copied().unwrap_or(default),
            Err(_) => default,
        }
    }

    fn put_f32(
        &mut self,
        handle: &NamespaceHandle,
        key: &str,
        value: f32,
    ) -> Result<(), StorageError> {
        let key = validate_name(key)?;
        let open = self.namespace_mut(handle)?;

        let mut updated = open.contents.clone();
        updated.values.insert(key.as_str().into(), value);
        Self::persist(&open.path, &updated)?;

        // Memory only follows once the file is durable
        open.contents = updated;
        Ok(())
    }

    fn close(&mut self, handle: NamespaceHandle) {
        if self.open.as_ref().is_some_and(|open| open.id == handle.id()) {
            self.open = None;
        }
    }
}

//! Local persistence of reference documents.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{RefsError, Result};

/// Write-once storage for per-file reference documents.
///
/// `write` returns the location that `read` accepts; the merge stage only
/// reads locations it was handed, never lists the store.
pub trait ReferenceStore: Send + Sync {
    fn write(&self, name: &str, contents: &[u8]) -> Result<String>;

    fn read(&self, location: &str) -> Result<Vec<u8>>;
}

/// Reference documents stored as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Use `dir` as the output directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReferenceStore for DirectoryStore {
    fn write(&self, name: &str, contents: &[u8]) -> Result<String> {
        if name.contains(['/', '\\']) {
            return Err(RefsError::InvalidRequest(format!(
                "reference name '{}' must be a plain file name",
                name
            )));
        }
        let path = self.dir.join(name);
        fs::write(&path, contents)?;
        debug!(path = %path.display(), size = contents.len(), "Wrote reference document");
        Ok(path.to_string_lossy().into_owned())
    }

    fn read(&self, location: &str) -> Result<Vec<u8>> {
        Ok(fs::read(location)?)
    }
}

/// In-memory reference store, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // a poisoned map is still consistent: every insert is a single call
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReferenceStore for MemoryStore {
    fn write(&self, name: &str, contents: &[u8]) -> Result<String> {
        self.lock().insert(name.to_string(), contents.to_vec());
        Ok(name.to_string())
    }

    fn read(&self, location: &str) -> Result<Vec<u8>> {
        self.lock().get(location).cloned().ok_or_else(|| {
            RefsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no reference document '{}'", location),
            ))
        })
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{AssetError, SourceProvider};

/// In-memory source provider for tests and embedded shaders.
///
/// Clones share storage, so files can be inserted after the provider has been
/// pushed onto a [`SearchPaths`](super::SearchPaths) list. Directories are
/// implicit in file paths.
#[derive(Clone, Default)]
pub struct MemorySource {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, overwriting any existing one. `path` must be normalized.
    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        self.files.write().insert(path.into(), data);
    }

    /// Insert a UTF-8 text file.
    pub fn insert_text(&self, path: impl Into<String>, text: &str) {
        self.insert(path, text.as_bytes().to_vec());
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }
}

impl SourceProvider for MemorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn subdirectories(&self, path: &str) -> Vec<String> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut dirs: Vec<String> = self
            .files
            .read()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

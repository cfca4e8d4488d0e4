use std::path::PathBuf;

use super::{AssetError, SourceProvider};

/// Source provider backed by a directory on the native filesystem.
///
/// Paths reaching the provider are already normalized by
/// [`SearchPaths`](super::SearchPaths), so `..` can never escape the root.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Create a provider rooted at `root`. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl SourceProvider for DirectorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        std::fs::read(self.resolve(path)).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(path.to_string())
            } else {
                AssetError::Io {
                    path: path.to_string(),
                    message: err.to_string(),
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn subdirectories(&self, path: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.resolve(path)) else {
            return Vec::new();
        };
        let mut dirs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .collect();
        dirs.sort();
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_root_is_empty() {
        let source = DirectorySource::new("/definitely/not/a/real/root");
        assert!(!source.exists("shader.frag"));
        assert!(source.subdirectories("").is_empty());
        assert_eq!(
            source.read("shader.frag"),
            Err(AssetError::NotFound("shader.frag".into()))
        );
    }
}

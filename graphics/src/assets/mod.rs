//! Search-path based loading of shader sources and intro media.
//!
//! A [`SearchPaths`] list holds `(provider, base directory)` entries in
//! priority order. Lookups normalize the requested name, then try every entry
//! in turn; the first provider that has the file wins.
//!
//! # Example
//!
//! ```ignore
//! let shaders = MemorySource::new();
//! shaders.insert("post/grayscale.frag", source.as_bytes().to_vec());
//!
//! let mut paths = SearchPaths::new();
//! paths.push(DirectorySource::new("./assets"), "shaders");
//! paths.push(shaders, "");
//!
//! let (resolved, bytes) = paths.read("post/grayscale.frag")?;
//! ```

mod directory;
mod memory;
mod path;

use std::sync::Arc;

pub use directory::DirectorySource;
pub use memory::MemorySource;
pub use path::normalize;

/// Errors raised while locating or reading a source file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    /// No search path entry contains the file.
    #[error("not found in search paths: {0}")]
    NotFound(String),
    /// The path is empty or tries to escape its root.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// The provider failed to read an existing file.
    #[error("IO error reading '{path}': {message}")]
    Io { path: String, message: String },
}

/// A read-only source of files addressed by normalized, slash-separated paths.
pub trait SourceProvider: Send + Sync {
    /// Read the whole file at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError>;

    /// Returns true if a file exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Immediate subdirectories of `path` (`""` is the root), sorted by name.
    fn subdirectories(&self, path: &str) -> Vec<String>;
}

#[derive(Clone)]
struct SearchEntry {
    provider: Arc<dyn SourceProvider>,
    base: String,
}

impl SearchEntry {
    fn resolve(&self, name: &str) -> String {
        if self.base.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.base)
        }
    }
}

/// Ordered list of places to look for sources. Cheap to clone.
#[derive(Clone, Default)]
pub struct SearchPaths {
    entries: Vec<SearchEntry>,
}

impl SearchPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `base` inside `provider` as the lowest-priority entry.
    pub fn push(&mut self, provider: impl SourceProvider + 'static, base: &str) -> &mut Self {
        self.push_shared(Arc::new(provider), base)
    }

    /// Append an already shared provider.
    pub fn push_shared(&mut self, provider: Arc<dyn SourceProvider>, base: &str) -> &mut Self {
        let base = normalize(base).unwrap_or_default();
        log::debug!("SearchPaths: adding '{base}'");
        self.entries.push(SearchEntry { provider, base });
        self
    }

    /// Append `base` and every directory below it, depth first.
    ///
    /// This lets shaders be addressed by file name regardless of which
    /// subdirectory of the shader root they live in.
    pub fn push_tree(&mut self, provider: impl SourceProvider + 'static, base: &str) -> &mut Self {
        let provider: Arc<dyn SourceProvider> = Arc::new(provider);
        let mut pending = vec![normalize(base).unwrap_or_default()];
        while let Some(dir) = pending.pop() {
            let mut children: Vec<String> = provider
                .subdirectories(&dir)
                .into_iter()
                .map(|child| {
                    if dir.is_empty() {
                        child
                    } else {
                        format!("{dir}/{child}")
                    }
                })
                .collect();
            self.push_shared(provider.clone(), &dir);
            children.reverse();
            pending.extend(children);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locate `name` and return its resolved path and contents.
    ///
    /// # Errors
    ///
    /// - [`AssetError::InvalidPath`] if `name` does not normalize
    /// - [`AssetError::NotFound`] if no entry contains the file
    /// - [`AssetError::Io`] if the owning provider fails to read it
    pub fn read(&self, name: &str) -> Result<(String, Vec<u8>), AssetError> {
        let name = normalize(name)?;
        for entry in &self.entries {
            let candidate = entry.resolve(&name);
            if entry.provider.exists(&candidate) {
                let data = entry.provider.read(&candidate)?;
                return Ok((candidate, data));
            }
        }
        Err(AssetError::NotFound(name))
    }

    /// Like [`read`](Self::read), decoding the contents as UTF-8 text.
    pub fn read_to_string(&self, name: &str) -> Result<(String, String), AssetError> {
        let (resolved, data) = self.read(name)?;
        let text = String::from_utf8(data).map_err(|err| AssetError::Io {
            path: resolved.clone(),
            message: err.to_string(),
        })?;
        Ok((resolved, text))
    }

    /// Returns true if any entry contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        let Ok(name) = normalize(name) else {
            return false;
        };
        self.entries
            .iter()
            .any(|entry| entry.provider.exists(&entry.resolve(&name)))
    }
}

impl std::fmt::Debug for SearchPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.base))
            .finish()
    }
}

static_assertions::assert_impl_all!(SearchPaths: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_hit_wins() {
        let high = MemorySource::new();
        high.insert("common.glsl", b"high".to_vec());
        let low = MemorySource::new();
        low.insert("common.glsl", b"low".to_vec());
        low.insert("only_low.glsl", b"only".to_vec());

        let mut paths = SearchPaths::new();
        paths.push(high, "").push(low, "");

        assert_eq!(paths.read("common.glsl").unwrap().1, b"high");
        assert_eq!(paths.read("only_low.glsl").unwrap().1, b"only");
    }

    #[test]
    fn test_base_directory_is_prefixed() {
        let source = MemorySource::new();
        source.insert("shaders/model.vert", b"v".to_vec());

        let mut paths = SearchPaths::new();
        paths.push(source, "shaders");

        let (resolved, _) = paths.read("model.vert").unwrap();
        assert_eq!(resolved, "shaders/model.vert");
    }

    #[test]
    fn test_missing_and_invalid() {
        let mut paths = SearchPaths::new();
        paths.push(MemorySource::new(), "");

        assert_eq!(
            paths.read("missing.frag"),
            Err(AssetError::NotFound("missing.frag".into()))
        );
        assert!(matches!(
            paths.read("../escape.frag"),
            Err(AssetError::InvalidPath(_))
        ));
        assert!(!paths.contains("../escape.frag"));
    }

    #[test]
    fn test_push_tree_adds_nested_directories() {
        let source = MemorySource::new();
        source.insert("shaders/root.frag", b"root".to_vec());
        source.insert("shaders/post/blur.frag", b"blur".to_vec());
        source.insert("shaders/post/fx/bloom.frag", b"bloom".to_vec());

        let mut paths = SearchPaths::new();
        paths.push_tree(source, "shaders");

        assert_eq!(paths.len(), 3);
        assert_eq!(paths.read("blur.frag").unwrap().0, "shaders/post/blur.frag");
        assert_eq!(
            paths.read("bloom.frag").unwrap().0,
            "shaders/post/fx/bloom.frag"
        );
        assert_eq!(paths.read("root.frag").unwrap().1, b"root");
    }
}

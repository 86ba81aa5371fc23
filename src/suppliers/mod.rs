//! Built-in collaborator implementations.

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "yt-dlp")]
pub mod yt_dlp;

use std::fs;
use std::path::{Path, PathBuf};

use crate::supplier::TextSupplier;
use crate::{Result, UpstreamError};

/// A `TextSupplier` that treats the source as a path to a caption file on disk.
#[derive(Debug, Clone, Default)]
pub struct FileSupplier {
    root: Option<PathBuf>,
}

impl FileSupplier {
    /// Resolve sources as given (relative to the working directory).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve sources relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(source),
            None => Path::new(source).to_path_buf(),
        }
    }
}

impl TextSupplier for FileSupplier {
    fn fetch_transcript(&self, source: &str) -> Result<String> {
        let path = self.resolve(source);
        if !path.is_file() {
            return Err(UpstreamError::NotFound(format!(
                "caption file not found: '{}'",
                path.display()
            ))
            .into());
        }
        fs::read_to_string(&path).map_err(|err| {
            UpstreamError::Failed(format!(
                "failed to read caption file '{}': {err}",
                path.display()
            ))
            .into()
        })
    }
}

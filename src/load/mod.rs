/*!
Input topology loading.

This module defines:
- `TopologyLoader`: turns a file into the `input` overlay.
- `LoadError`: with `UnrecognizedInputFormat` as the one recoverable case.
- `LoaderChain`: a primary loader and an optional fallback that is tried when the primary
  does not recognize the file.

Concrete loaders: `json::NodeLinkLoader` (primary) and `text::LinkListLoader`.
*/

pub mod json;
pub mod text;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::network::Overlay;

pub use json::NodeLinkLoader;
pub use text::LinkListLoader;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unrecognized input format: {0}")]
    UnrecognizedInputFormat(String),
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid topology: {0}")]
    Invalid(String),
}

pub trait TopologyLoader: Send + Sync {
    /// Reads `path` into an undirected overlay of devices and links.
    ///
    /// Every node carries `label` and, where known, `device_type`, `asn`, `platform`, `host`,
    /// `x` and `y`. Every edge carries `type` and a unique `edge_id`.
    fn load(&self, path: &Path) -> Result<Overlay, LoadError>;
}

pub(crate) fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of `LoaderChain::load`.
#[derive(Debug)]
pub struct Loaded {
    pub input: Overlay,
    /// The fallback loader produced `input`.
    pub used_fallback: bool,
}

pub struct LoaderChain {
    primary: Box<dyn TopologyLoader>,
    fallback: Option<Box<dyn TopologyLoader>>,
}

impl Default for LoaderChain {
    fn default() -> Self {
        Self::new(Box::new(NodeLinkLoader))
    }
}

impl LoaderChain {
    pub fn new(primary: Box<dyn TopologyLoader>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn TopologyLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn load(&self, path: &Path) -> Result<Loaded, LoadError> {
        match self.primary.load(path) {
            Ok(input) => Ok(Loaded {
                input,
                used_fallback: false,
            }),
            Err(LoadError::UnrecognizedInputFormat(reason)) => {
                let Some(fallback) = &self.fallback else {
                    return Err(LoadError::UnrecognizedInputFormat(reason));
                };
                warn!("{}: {}, trying fallback loader", path.display(), reason);
                let input = fallback.load(path)?;
                info!("{} loaded by fallback loader", path.display());
                Ok(Loaded {
                    input,
                    used_fallback: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_primary_loader_wins() {
        let file = temp_file(include_str!("../../test_data/small_topology.json"));
        let loaded = LoaderChain::default()
            .with_fallback(Box::new(LinkListLoader))
            .load(file.path())
            .unwrap();
        assert!(!loaded.used_fallback);
        assert_eq!(loaded.input.len(), 6);
    }

    #[test]
    fn test_fallback_on_unrecognized_format() {
        let file = temp_file("node r1 router 1\nnode r2 router 1\nlink r1 r2\n");

        let err = LoaderChain::default().load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::UnrecognizedInputFormat(_)));

        let loaded = LoaderChain::default()
            .with_fallback(Box::new(LinkListLoader))
            .load(file.path())
            .unwrap();
        assert!(loaded.used_fallback);
        assert_eq!(loaded.input.len(), 2);
        assert_eq!(loaded.input.edge_count(), 1);
    }

    #[test]
    fn test_missing_file_is_not_recoverable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let err = LoaderChain::default()
            .with_fallback(Box::new(LinkListLoader))
            .load(&path)
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}

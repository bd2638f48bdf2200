//! Persistence for trained model bundles.
//!
//! A bundle is written and read as a single named artifact. The file store
//! writes to a temporary sibling first and renames it into place, so a
//! concurrent reader sees either the previous bundle or the new one, never
//! a partial write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur while saving or loading artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// I/O failure on the artifact path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Bundle could not be serialized.
    #[error("Failed to encode artifact {name}: {source}")]
    Encode {
        /// Artifact name.
        name: String,
        /// Underlying encoder error.
        source: rmp_serde::encode::Error,
    },

    /// Stored bytes are not a valid bundle.
    #[error("Failed to decode artifact {name}: {source}")]
    Decode {
        /// Artifact name.
        name: String,
        /// Underlying decoder error.
        source: rmp_serde::decode::Error,
    },
}

/// Named blob storage for model bundles.
///
/// `save` must replace an existing artifact atomically.
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under `name`, replacing any previous artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] if the artifact cannot be written.
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError>;

    /// Reads the artifact stored under `name`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] if the artifact exists but cannot be
    /// read.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ArtifactError>;
}

/// Encodes `value` as `MessagePack` and saves it under `name`.
pub(crate) fn save_bundle<T: Serialize>(
    store: &dyn ArtifactStore,
    name: &str,
    value: &T,
) -> Result<(), ArtifactError> {
    let bytes = rmp_serde::to_vec_named(value).map_err(|e| ArtifactError::Encode {
        name: name.to_string(),
        source: e,
    })?;
    store.save(name, &bytes)?;
    log::info!("Saved {name} ({} bytes)", bytes.len());
    Ok(())
}

/// Loads and decodes the bundle stored under `name`.
pub(crate) fn load_bundle<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    name: &str,
) -> Result<Option<T>, ArtifactError> {
    let Some(bytes) = store.load(name)? else {
        return Ok(None);
    };
    rmp_serde::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ArtifactError::Decode {
            name: name.to_string(),
            source: e,
        })
}

/// Stores artifacts as files in one directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the artifacts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ArtifactError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let path = self.path_of(name);
        let tmp_path = self.path_of(&format!("{name}.tmp"));

        std::fs::write(&tmp_path, bytes).map_err(|e| ArtifactError::Io {
            path: tmp_path.display().to_string(),
            source: e,
        })?;

        // Atomic rename
        std::fs::rename(&tmp_path, &path).map_err(|e| ArtifactError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path_of(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

/// Keeps artifacts in memory. Useful for tests and embedders that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the stored artifacts.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.artifacts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        self.artifacts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        Ok(self
            .artifacts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned())
    }
}

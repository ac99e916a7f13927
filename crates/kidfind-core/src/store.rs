//! On-disk classifier store: one JSON artifact per collection.
//!
//! Writes go to a temporary file in the store directory and are renamed
//! over the previous artifact, so a concurrent reader sees either the old
//! classifier or the new one, never a partial file.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::classifier::LinearClassifier;
use crate::error::IdentityError;
use crate::types::CollectionId;

const ARTIFACT_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct ClassifierStore {
    root: PathBuf,
}

impl ClassifierStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Deterministic artifact location for a collection.
    pub fn artifact_path(&self, id: &CollectionId) -> PathBuf {
        self.root.join(format!("{id}.{ARTIFACT_EXTENSION}"))
    }

    pub fn contains(&self, id: &CollectionId) -> bool {
        self.artifact_path(id).is_file()
    }

    /// Persist a classifier under its own label, replacing any previous one.
    pub fn save(&self, classifier: &LinearClassifier) -> Result<PathBuf, IdentityError> {
        let path = self.artifact_path(&classifier.label);
        let bytes = serde_json::to_vec(classifier).map_err(IdentityError::Encode)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| IdentityError::Storage(e.error))?;

        tracing::debug!(collection = %classifier.label, path = %path.display(), "classifier saved");
        Ok(path)
    }

    pub fn load(&self, id: &CollectionId) -> Result<LinearClassifier, IdentityError> {
        let path = self.artifact_path(id);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(IdentityError::UntrainedCollection(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let corrupt = |reason: String| IdentityError::Corrupt {
            collection: id.to_string(),
            reason,
        };

        let classifier: LinearClassifier = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        if classifier.label != *id {
            return Err(corrupt(format!("artifact is labelled {}", classifier.label)));
        }
        if classifier.weights.len() != classifier.dim {
            return Err(corrupt(format!(
                "{} weights for a {}-dim classifier",
                classifier.weights.len(),
                classifier.dim
            )));
        }
        Ok(classifier)
    }

    /// Delete a collection's artifact. Returns whether one existed.
    pub fn remove(&self, id: &CollectionId) -> Result<bool, IdentityError> {
        match std::fs::remove_file(self.artifact_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Trained collections, sorted.
    pub fn list(&self) -> Result<Vec<CollectionId>, IdentityError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            // Temp files and foreign names fail validation and are skipped.
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| CollectionId::new(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

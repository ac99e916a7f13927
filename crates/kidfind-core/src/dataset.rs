//! Training image layout: `<root>/<collection_id>/<image files>`.
//!
//! Label enumeration and image listing are plain directory reads, kept
//! apart from embedding so they can be tested without models.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::IdentityError;
use crate::types::CollectionId;

/// Recognised image extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Staging directory for one collection's training images.
pub fn staging_dir(root: &Path, id: &CollectionId) -> PathBuf {
    root.join(id.as_str())
}

/// Create the staging directory if absent and return it.
pub fn ensure_staging_dir(root: &Path, id: &CollectionId) -> Result<PathBuf, IdentityError> {
    let dir = staging_dir(root, id);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Every immediate subdirectory of `root` is one identity label.
///
/// A missing root has no labels. Directory names that are not valid
/// collection ids are skipped.
pub fn list_labels(root: &Path) -> Result<Vec<CollectionId>, IdentityError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut labels = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_str().map(CollectionId::new) {
            Some(Ok(id)) => labels.push(id),
            _ => tracing::warn!(dir = ?name, "skipping training directory with invalid collection name"),
        }
    }
    labels.sort();
    Ok(labels)
}

/// Image files directly under `dir`, sorted by path. Other files are ignored.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, IdentityError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

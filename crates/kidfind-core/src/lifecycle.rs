//! Collection lifecycle: create, inspect, delete.
//!
//! A collection exists once its staging directory or its classifier exists.
//! Deleting removes both, leaving no orphaned artifact behind.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dataset;
use crate::error::IdentityError;
use crate::store::ClassifierStore;
use crate::types::CollectionId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStatus {
    pub collection_id: CollectionId,
    pub trained: bool,
    pub staged_images: usize,
}

pub struct Collections<'a> {
    training_root: &'a Path,
    store: &'a ClassifierStore,
}

impl<'a> Collections<'a> {
    pub fn new(training_root: &'a Path, store: &'a ClassifierStore) -> Self {
        Self { training_root, store }
    }

    /// Create the collection's staging directory. Creating an existing
    /// collection succeeds.
    pub fn create(&self, id: &CollectionId) -> Result<PathBuf, IdentityError> {
        let existed = dataset::staging_dir(self.training_root, id).is_dir();
        let dir = dataset::ensure_staging_dir(self.training_root, id)?;
        if existed {
            tracing::info!(collection = %id, "collection already exists");
        } else {
            tracing::info!(collection = %id, dir = %dir.display(), "collection created");
        }
        Ok(dir)
    }

    pub fn exists(&self, id: &CollectionId) -> bool {
        dataset::staging_dir(self.training_root, id).is_dir() || self.store.contains(id)
    }

    /// Remove the classifier and the staged images.
    pub fn delete(&self, id: &CollectionId) -> Result<(), IdentityError> {
        if !self.exists(id) {
            return Err(IdentityError::CollectionNotFound(id.to_string()));
        }

        let had_classifier = self.store.remove(id)?;
        match std::fs::remove_dir_all(dataset::staging_dir(self.training_root, id)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(collection = %id, had_classifier, "collection deleted");
        Ok(())
    }

    /// Staged training images of one collection.
    pub fn training_images(&self, id: &CollectionId) -> Result<Vec<PathBuf>, IdentityError> {
        let dir = dataset::staging_dir(self.training_root, id);
        if !dir.is_dir() {
            return Err(IdentityError::CollectionNotFound(id.to_string()));
        }
        dataset::list_images(&dir)
    }

    /// Every staged or trained collection, sorted by id.
    pub fn list(&self) -> Result<Vec<CollectionStatus>, IdentityError> {
        let mut all: BTreeMap<CollectionId, CollectionStatus> = BTreeMap::new();

        for id in dataset::list_labels(self.training_root)? {
            let staged_images = dataset::list_images(&dataset::staging_dir(self.training_root, &id))?.len();
            all.insert(
                id.clone(),
                CollectionStatus { collection_id: id, trained: false, staged_images },
            );
        }
        for id in self.store.list()? {
            all.entry(id.clone())
                .or_insert(CollectionStatus { collection_id: id, trained: false, staged_images: 0 })
                .trained = true;
        }

        Ok(all.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FitParams, LinearClassifier};
    use crate::types::Embedding;

    fn id(s: &str) -> CollectionId {
        CollectionId::new(s).unwrap()
    }

    fn setup() -> (tempfile::TempDir, PathBuf, ClassifierStore) {
        let dir = tempfile::tempdir().unwrap();
        let training = dir.path().join("trainer");
        let store = ClassifierStore::open(dir.path().join("classifiers")).unwrap();
        (dir, training, store)
    }

    fn save_classifier(store: &ClassifierStore, label: &str) {
        let pos = Embedding::new(vec![1.0, 0.0]);
        let neg = Embedding::new(vec![0.0, 1.0]);
        let clf = LinearClassifier::fit(id(label), &[&pos], &[&neg], &FitParams::default()).unwrap();
        store.save(&clf).unwrap();
    }

    #[test]
    fn test_create_is_idempotent() {
        let (_dir, training, store) = setup();
        let collections = Collections::new(&training, &store);
        let a = collections.create(&id("kid_1")).unwrap();
        let b = collections.create(&id("kid_1")).unwrap();
        assert_eq!(a, b);
        assert!(collections.exists(&id("kid_1")));
        assert_eq!(collections.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_never_created() {
        let (_dir, training, store) = setup();
        let collections = Collections::new(&training, &store);
        assert!(matches!(
            collections.delete(&id("ghost")),
            Err(IdentityError::CollectionNotFound(c)) if c == "ghost"
        ));
    }

    #[test]
    fn test_delete_removes_classifier_and_images() {
        let (_dir, training, store) = setup();
        let collections = Collections::new(&training, &store);
        let staging = collections.create(&id("kid_1")).unwrap();
        std::fs::write(staging.join("a.jpg"), b"x").unwrap();
        save_classifier(&store, "kid_1");

        collections.delete(&id("kid_1")).unwrap();

        assert!(!store.contains(&id("kid_1")));
        assert!(!staging.exists());
        assert!(!collections.exists(&id("kid_1")));
        assert!(collections.delete(&id("kid_1")).is_err());
    }

    #[test]
    fn test_delete_trained_without_staging() {
        let (_dir, training, store) = setup();
        save_classifier(&store, "kid_1");
        Collections::new(&training, &store).delete(&id("kid_1")).unwrap();
        assert!(!store.contains(&id("kid_1")));
    }

    #[test]
    fn test_list_merges_staged_and_trained() {
        let (_dir, training, store) = setup();
        let collections = Collections::new(&training, &store);
        let staging = collections.create(&id("b")).unwrap();
        std::fs::write(staging.join("1.png"), b"x").unwrap();
        std::fs::write(staging.join("2.png"), b"x").unwrap();
        save_classifier(&store, "b");
        save_classifier(&store, "a");
        collections.create(&id("c")).unwrap();

        let listed = collections.list().unwrap();
        assert_eq!(
            listed,
            vec![
                CollectionStatus { collection_id: id("a"), trained: true, staged_images: 0 },
                CollectionStatus { collection_id: id("b"), trained: true, staged_images: 2 },
                CollectionStatus { collection_id: id("c"), trained: false, staged_images: 0 },
            ]
        );
    }

    #[test]
    fn test_training_images_unknown_collection() {
        let (_dir, training, store) = setup();
        let collections = Collections::new(&training, &store);
        assert!(matches!(
            collections.training_images(&id("nobody")),
            Err(IdentityError::CollectionNotFound(_))
        ));
        collections.create(&id("kid_1")).unwrap();
        assert!(collections.training_images(&id("kid_1")).unwrap().is_empty());
    }
}

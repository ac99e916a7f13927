//! The face identity capability and its local-classifier implementation.

use std::path::{Path, PathBuf};

use crate::dataset;
use crate::error::IdentityError;
use crate::lifecycle::{CollectionStatus, Collections};
use crate::matcher::Matcher;
use crate::provider::EmbeddingProvider;
use crate::store::ClassifierStore;
use crate::trainer::{TrainOutcome, TrainSummary, Trainer};
use crate::types::{CollectionId, MatchDecision};

/// Train, match, and manage per-collection decision units.
///
/// One implementation is chosen when the daemon is composed; callers only
/// see this trait.
pub trait FaceIdentity: Send {
    fn train(&mut self, collection: &CollectionId, image_dir: &Path) -> Result<TrainOutcome, IdentityError>;

    /// Retrain every staged collection.
    fn train_all(&mut self) -> Result<Vec<TrainSummary>, IdentityError>;

    fn match_probe(&mut self, probe: &Path, collection: &CollectionId) -> Result<MatchDecision, IdentityError>;

    fn create_collection(&mut self, collection: &CollectionId) -> Result<(), IdentityError>;

    fn delete_collection(&mut self, collection: &CollectionId) -> Result<(), IdentityError>;

    fn collections(&self) -> Result<Vec<CollectionStatus>, IdentityError>;

    fn training_images(&self, collection: &CollectionId) -> Result<Vec<PathBuf>, IdentityError>;

    /// Where uploads for `collection` are staged before training.
    fn staging_dir(&self, collection: &CollectionId) -> PathBuf;
}

/// Local embeddings plus one logistic classifier file per collection.
pub struct LocalClassifierIdentity<P> {
    provider: P,
    store: ClassifierStore,
    training_root: PathBuf,
    threshold: f32,
}

impl<P: EmbeddingProvider> LocalClassifierIdentity<P> {
    pub fn new(provider: P, store: ClassifierStore, training_root: impl Into<PathBuf>, threshold: f32) -> Self {
        Self {
            provider,
            store,
            training_root: training_root.into(),
            threshold,
        }
    }
}

impl<P: EmbeddingProvider> FaceIdentity for LocalClassifierIdentity<P> {
    fn train(&mut self, collection: &CollectionId, image_dir: &Path) -> Result<TrainOutcome, IdentityError> {
        Trainer::new(&mut self.provider, &self.store, &self.training_root).train(collection, image_dir)
    }

    fn train_all(&mut self) -> Result<Vec<TrainSummary>, IdentityError> {
        Trainer::new(&mut self.provider, &self.store, &self.training_root).train_all()
    }

    fn match_probe(&mut self, probe: &Path, collection: &CollectionId) -> Result<MatchDecision, IdentityError> {
        Matcher::new(&mut self.provider, &self.store).match_probe(probe, collection, self.threshold)
    }

    fn create_collection(&mut self, collection: &CollectionId) -> Result<(), IdentityError> {
        Collections::new(&self.training_root, &self.store).create(collection).map(|_| ())
    }

    fn delete_collection(&mut self, collection: &CollectionId) -> Result<(), IdentityError> {
        Collections::new(&self.training_root, &self.store).delete(collection)
    }

    fn collections(&self) -> Result<Vec<CollectionStatus>, IdentityError> {
        Collections::new(&self.training_root, &self.store).list()
    }

    fn training_images(&self, collection: &CollectionId) -> Result<Vec<PathBuf>, IdentityError> {
        Collections::new(&self.training_root, &self.store).training_images(collection)
    }

    fn staging_dir(&self, collection: &CollectionId) -> PathBuf {
        dataset::staging_dir(&self.training_root, collection)
    }
}

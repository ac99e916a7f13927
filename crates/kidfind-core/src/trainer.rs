//! Training: staged images per collection → one classifier per collection.
//!
//! Every identity's classifier uses the other identities under the
//! training root as negatives. A failing image is logged and skipped; the
//! batch carries on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::classifier::{FitParams, LinearClassifier};
use crate::dataset;
use crate::error::IdentityError;
use crate::provider::EmbeddingProvider;
use crate::store::ClassifierStore;
use crate::types::{CollectionId, Embedding};

/// Embeddings gathered from a scan, grouped by label.
#[derive(Debug, Default)]
struct LabeledEmbeddings {
    by_label: BTreeMap<CollectionId, Vec<Embedding>>,
    /// Images per label that produced no embedding.
    skipped: BTreeMap<CollectionId, usize>,
}

impl LabeledEmbeddings {
    fn total(&self) -> usize {
        self.by_label.values().map(Vec::len).sum()
    }

    /// Everything not labelled `label`.
    fn others(&self, label: &CollectionId) -> Vec<&Embedding> {
        self.by_label
            .iter()
            .filter(|(l, _)| *l != label)
            .flat_map(|(_, v)| v.iter())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub collection: CollectionId,
    pub positives: usize,
    pub negatives: usize,
    pub skipped: usize,
    pub artifact: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// The staging directory held no images; nothing was written.
    Empty,
    Trained(TrainSummary),
}

pub struct Trainer<'a> {
    provider: &'a mut dyn EmbeddingProvider,
    store: &'a ClassifierStore,
    training_root: &'a Path,
}

impl<'a> Trainer<'a> {
    /// `training_root` holds one staging directory per identity; every
    /// identity found there is a negative for the others.
    pub fn new(provider: &'a mut dyn EmbeddingProvider, store: &'a ClassifierStore, training_root: &'a Path) -> Self {
        Self { provider, store, training_root }
    }

    /// Embed every recognised image under `dir`, skipping failures.
    fn embed_dir(&mut self, label: &CollectionId, dir: &Path) -> Result<(Vec<Embedding>, usize), IdentityError> {
        let mut embeddings = Vec::new();
        let mut skipped = 0;
        for image in dataset::list_images(dir)? {
            match self.provider.embed(&image) {
                Ok(e) => embeddings.push(e),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(collection = %label, image = %image.display(), error = %e, "skipping training image");
                }
            }
        }
        tracing::debug!(collection = %label, embedded = embeddings.len(), skipped, "embedded training images");
        Ok((embeddings, skipped))
    }

    /// Embed every label directory under the training root.
    fn scan(&mut self) -> Result<LabeledEmbeddings, IdentityError> {
        let root = self.training_root;
        let mut scanned = LabeledEmbeddings::default();
        for label in dataset::list_labels(root)? {
            let dir = dataset::staging_dir(root, &label);
            let (embeddings, skipped) = self.embed_dir(&label, &dir)?;
            if skipped > 0 {
                scanned.skipped.insert(label.clone(), skipped);
            }
            if !embeddings.is_empty() {
                scanned.by_label.insert(label, embeddings);
            }
        }
        Ok(scanned)
    }

    fn fit_and_save(
        &self,
        collection: &CollectionId,
        positives: &[&Embedding],
        negatives: &[&Embedding],
        skipped: usize,
    ) -> Result<TrainSummary, IdentityError> {
        if positives.is_empty() {
            return Err(IdentityError::NoEmbeddingsExtracted(collection.to_string()));
        }
        if negatives.is_empty() {
            return Err(IdentityError::NoNegativeExamples(collection.to_string()));
        }

        let classifier = LinearClassifier::fit(collection.clone(), positives, negatives, &FitParams::default())?;
        let artifact = self.store.save(&classifier)?;

        tracing::info!(
            collection = %collection,
            positives = positives.len(),
            negatives = negatives.len(),
            skipped,
            "classifier trained"
        );

        Ok(TrainSummary {
            collection: collection.clone(),
            positives: positives.len(),
            negatives: negatives.len(),
            skipped,
            artifact,
        })
    }

    /// Retrain one collection from the images in `image_dir`.
    ///
    /// `image_dir` is usually the collection's staging directory under the
    /// training root, which is created when missing. Negatives always come
    /// from the other identities under the training root. Only this
    /// collection's classifier is replaced. A directory without images is a
    /// successful no-op that leaves any existing classifier untouched.
    pub fn train(&mut self, collection: &CollectionId, image_dir: &Path) -> Result<TrainOutcome, IdentityError> {
        let root = self.training_root;
        if image_dir == dataset::staging_dir(root, collection) {
            dataset::ensure_staging_dir(root, collection)?;
        }

        if dataset::list_images(image_dir)?.is_empty() {
            tracing::info!(collection = %collection, dir = %image_dir.display(), "no staged images; nothing to train");
            return Ok(TrainOutcome::Empty);
        }

        let (positives, mut skipped) = self.embed_dir(collection, image_dir)?;

        let mut negatives = Vec::new();
        for label in dataset::list_labels(root)? {
            let dir = dataset::staging_dir(root, &label);
            if label == *collection || dir == image_dir {
                continue;
            }
            let (embeddings, label_skipped) = self.embed_dir(&label, &dir)?;
            skipped += label_skipped;
            negatives.extend(embeddings);
        }

        let positives: Vec<&Embedding> = positives.iter().collect();
        let negatives: Vec<&Embedding> = negatives.iter().collect();
        self.fit_and_save(collection, &positives, &negatives, skipped)
            .map(TrainOutcome::Trained)
    }

    /// Retrain every identity under the training root in one pass.
    ///
    /// Identities without any negative to contrast against are left out.
    pub fn train_all(&mut self) -> Result<Vec<TrainSummary>, IdentityError> {
        let scanned = self.scan()?;
        if scanned.total() == 0 {
            return Err(IdentityError::NoEmbeddingsExtracted(self.training_root.display().to_string()));
        }

        let mut summaries = Vec::new();
        for (label, own) in &scanned.by_label {
            let negatives = scanned.others(label);
            if negatives.is_empty() {
                tracing::warn!(collection = %label, "no other identities staged; not trained");
                continue;
            }
            let positives: Vec<&Embedding> = own.iter().collect();
            let skipped = scanned.skipped.get(label).copied().unwrap_or(0);
            summaries.push(self.fit_and_save(label, &positives, &negatives, skipped)?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stage_subject, FakeProvider};

    fn id(s: &str) -> CollectionId {
        CollectionId::new(s).unwrap()
    }

    struct Fixture {
        dir: tempfile::TempDir,
        training: PathBuf,
        store: ClassifierStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let training = dir.path().join("trainer");
        std::fs::create_dir_all(&training).unwrap();
        let store = ClassifierStore::open(dir.path().join("classifiers")).unwrap();
        Fixture { dir, training, store }
    }

    #[test]
    fn test_train_empty_dir_is_noop() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let image_dir = fx.training.join("kid_1");

        let outcome = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &image_dir)
            .unwrap();

        assert_eq!(outcome, TrainOutcome::Empty);
        assert!(image_dir.is_dir(), "staging directory is created");
        assert!(!fx.store.contains(&id("kid_1")));
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn test_train_empty_dir_keeps_previous_classifier() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("kid_1"), 0, 3);
        stage_subject(&fx.training.join("other"), 3, 3);
        Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &fx.training.join("kid_1"))
            .unwrap();
        let before = std::fs::read(fx.store.artifact_path(&id("kid_1"))).unwrap();

        for entry in std::fs::read_dir(fx.training.join("kid_1")).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }
        let outcome = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &fx.training.join("kid_1"))
            .unwrap();

        assert_eq!(outcome, TrainOutcome::Empty);
        assert_eq!(std::fs::read(fx.store.artifact_path(&id("kid_1"))).unwrap(), before);
    }

    #[test]
    fn test_train_uses_siblings_as_negatives() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("kid_1"), 0, 5);
        stage_subject(&fx.training.join("kid_2"), 2, 4);
        stage_subject(&fx.training.join("kid_3"), 4, 3);

        let outcome = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &fx.training.join("kid_1"))
            .unwrap();

        let TrainOutcome::Trained(summary) = outcome else {
            panic!("expected a trained outcome");
        };
        assert_eq!(summary.positives, 5);
        assert_eq!(summary.negatives, 7);
        assert_eq!(summary.skipped, 0);
        assert!(fx.store.contains(&id("kid_1")));
        assert!(!fx.store.contains(&id("kid_2")), "only the named collection is written");
    }

    #[test]
    fn test_train_skips_failing_images() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let kid_dir = fx.training.join("kid_1");
        stage_subject(&kid_dir, 0, 3);
        std::fs::write(kid_dir.join("blurry.png"), "noface").unwrap();
        std::fs::write(kid_dir.join("readme.txt"), "not an image").unwrap();
        stage_subject(&fx.training.join("other"), 3, 2);

        let TrainOutcome::Trained(summary) = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &kid_dir)
            .unwrap()
        else {
            panic!("expected a trained outcome");
        };
        assert_eq!(summary.positives, 3);
        assert_eq!(summary.skipped, 1);
        // The .txt file is never handed to the provider.
        assert_eq!(provider.calls, 3 + 1 + 2);
    }

    #[test]
    fn test_train_all_images_unusable() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let kid_dir = fx.training.join("kid_1");
        std::fs::create_dir_all(&kid_dir).unwrap();
        std::fs::write(kid_dir.join("a.jpg"), "noface").unwrap();
        stage_subject(&fx.training.join("other"), 3, 2);

        let result = Trainer::new(&mut provider, &fx.store, &fx.training).train(&id("kid_1"), &kid_dir);
        assert!(matches!(result, Err(IdentityError::NoEmbeddingsExtracted(c)) if c == "kid_1"));
        assert!(!fx.store.contains(&id("kid_1")));
    }

    #[test]
    fn test_train_without_other_identities() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("kid_1"), 0, 3);

        let result = Trainer::new(&mut provider, &fx.store, &fx.training).train(&id("kid_1"), &fx.training.join("kid_1"));
        assert!(matches!(result, Err(IdentityError::NoNegativeExamples(_))));
    }

    #[test]
    fn test_retrain_replaces_in_full() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let kid_dir = fx.training.join("kid_1");
        stage_subject(&kid_dir, 0, 5);
        stage_subject(&fx.training.join("other"), 3, 2);
        Trainer::new(&mut provider, &fx.store, &fx.training).train(&id("kid_1"), &kid_dir).unwrap();

        std::fs::remove_file(kid_dir.join("img_4.jpg")).unwrap();
        std::fs::remove_file(kid_dir.join("img_3.jpg")).unwrap();
        Trainer::new(&mut provider, &fx.store, &fx.training).train(&id("kid_1"), &kid_dir).unwrap();

        let clf = fx.store.load(&id("kid_1")).unwrap();
        assert_eq!(clf.positive_count, 3, "old embeddings are not accumulated");
    }

    #[test]
    fn test_scan_groups_by_label() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("b"), 1, 2);
        stage_subject(&fx.training.join("a"), 0, 3);
        std::fs::create_dir_all(fx.training.join("empty")).unwrap();
        std::fs::write(fx.training.join("a").join("bad.jpg"), "noface").unwrap();

        let scanned = Trainer::new(&mut provider, &fx.store, &fx.training).scan().unwrap();
        let labels: Vec<&str> = scanned.by_label.keys().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(scanned.total(), 5);
        assert_eq!(scanned.skipped.get(&id("a")), Some(&1));
        assert!(!scanned.skipped.contains_key(&id("b")));
    }

    #[test]
    fn test_train_all_fits_every_label() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("a"), 0, 2);
        stage_subject(&fx.training.join("b"), 2, 2);
        stage_subject(&fx.training.join("c"), 4, 2);

        let summaries = Trainer::new(&mut provider, &fx.store, &fx.training).train_all().unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries.iter().all(|s| s.positives == 2 && s.negatives == 4));
        assert_eq!(fx.store.list().unwrap(), vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn test_train_all_nothing_extracted() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let dir = fx.training.join("a");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("x.jpg"), "noface").unwrap();

        let result = Trainer::new(&mut provider, &fx.store, &fx.training).train_all();
        assert!(matches!(result, Err(IdentityError::NoEmbeddingsExtracted(_))));
    }

    #[test]
    fn test_train_all_single_identity_fits_nothing() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("a"), 0, 3);

        let summaries = Trainer::new(&mut provider, &fx.store, &fx.training).train_all().unwrap();
        assert!(summaries.is_empty());
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[test]
    fn test_train_all_reports_skips_per_identity() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("a"), 0, 2);
        std::fs::write(fx.training.join("a").join("bad.jpg"), "noface").unwrap();
        stage_subject(&fx.training.join("b"), 2, 2);

        let summaries = Trainer::new(&mut provider, &fx.store, &fx.training).train_all().unwrap();
        let skipped: Vec<(&str, usize)> = summaries.iter().map(|s| (s.collection.as_str(), s.skipped)).collect();
        assert_eq!(skipped, vec![("a", 1), ("b", 0)]);
    }

    #[test]
    fn test_train_from_directory_outside_root() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        stage_subject(&fx.training.join("kid_2"), 2, 5);
        stage_subject(&fx.training.join("kid_3"), 4, 5);
        let uploads = fx.dir.path().join("uploads");
        stage_subject(&uploads.join("kid_1"), 0, 5);
        stage_subject(&uploads.join("unrelated"), 6, 5);

        let TrainOutcome::Trained(summary) = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &uploads.join("kid_1"))
            .unwrap()
        else {
            panic!("expected a trained outcome");
        };
        assert_eq!(summary.positives, 5);
        assert_eq!(summary.negatives, 10, "negatives come from the training root only");
        assert!(!fx.training.join("kid_1").exists(), "no staging directory is created for a foreign dir");
    }

    #[test]
    fn test_train_missing_foreign_dir_is_empty() {
        let fx = fixture();
        let mut provider = FakeProvider::default();
        let missing = fx.dir.path().join("nowhere").join("kid_1");

        let outcome = Trainer::new(&mut provider, &fx.store, &fx.training)
            .train(&id("kid_1"), &missing)
            .unwrap();
        assert_eq!(outcome, TrainOutcome::Empty);
        assert!(!missing.exists());
    }
}

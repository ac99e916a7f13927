use thiserror::Error;

use crate::classifier::ClassifierError;

/// Failures that compromise a whole train, match, or lifecycle operation.
///
/// Per-image provider failures never appear here: training skips the image
/// and matching turns them into a zero-confidence reject.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid collection id {0:?}: use ASCII letters, digits, '_', '-' or '.'")]
    InvalidCollectionId(String),
    #[error("no usable face embeddings extracted for collection {0}")]
    NoEmbeddingsExtracted(String),
    #[error("collection {0} has no negative examples; stage images of at least one other identity")]
    NoNegativeExamples(String),
    #[error("collection {0} has not been trained")]
    UntrainedCollection(String),
    #[error("collection {0} not found")]
    CollectionNotFound(String),
    #[error("classifier artifact for {collection} is corrupt: {reason}")]
    Corrupt { collection: String, reason: String },
    #[error("encode classifier artifact: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

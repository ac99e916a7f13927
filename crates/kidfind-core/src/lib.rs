//! kidfind-core: per-collection face identification.
//!
//! Embeds faces with SCRFD + ArcFace over ONNX Runtime, fits one
//! one-vs-rest linear classifier per collection, and answers "is this
//! collection's child in this image?" for probe images.

pub mod alignment;
pub mod classifier;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod matcher;
pub mod provider;
pub mod recognizer;
pub mod routing;
pub mod store;
pub mod trainer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{FitParams, LinearClassifier};
pub use error::IdentityError;
pub use identity::{FaceIdentity, LocalClassifierIdentity};
pub use lifecycle::CollectionStatus;
pub use provider::{ArcFaceProvider, EmbeddingProvider, ProviderError};
pub use store::ClassifierStore;
pub use trainer::{TrainOutcome, TrainSummary};
pub use types::{decide, BoundingBox, CollectionId, Embedding, MatchDecision};

/// Default decision threshold on the positive-class probability.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

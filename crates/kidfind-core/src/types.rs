use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IdentityError;

const COLLECTION_ID_MAX_LEN: usize = 128;

/// Name of one collection (one child identity).
///
/// Doubles as the classifier artifact file stem and the staging directory
/// name, so only a filesystem-safe alphabet is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        let valid_chars = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if id.is_empty()
            || id.len() > COLLECTION_ID_MAX_LEN
            || !valid_chars
            || id == "."
            || id == ".."
        {
            return Err(IdentityError::InvalidCollectionId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CollectionId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

/// Bounding box for a detected face in pixel coordinates of the source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Scale to unit L2 norm. A zero vector is left unchanged.
    pub fn l2_normalize(mut self) -> Self {
        let norm = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            self.values.iter_mut().for_each(|x| *x /= norm);
        }
        self
    }
}

/// Outcome of evaluating one probe image against one collection's classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub accepted: bool,
    /// Probability in [0, 1] that the probe shows the claimed identity.
    pub confidence: f32,
}

impl MatchDecision {
    /// Reject used when the probe yields no usable face.
    pub const NO_FACE: MatchDecision = MatchDecision { accepted: false, confidence: 0.0 };
}

/// The acceptance rule: a probe is accepted when the positive-class
/// probability reaches the threshold. The bound is inclusive.
pub fn decide(confidence: f32, threshold: f32) -> MatchDecision {
    MatchDecision {
        accepted: confidence >= threshold,
        confidence,
    }
}

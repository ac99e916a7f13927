//! One-vs-rest linear probabilistic classifier.
//!
//! Logistic regression over face embeddings, fitted by full-batch gradient
//! descent from a zero initialisation. Fitting involves no sampling or
//! shuffling, so the same training set always yields the same weights and
//! the same probabilities for a given probe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CollectionId, Embedding};

const DEFAULT_LEARNING_RATE: f64 = 0.5;
const DEFAULT_ITERATIONS: usize = 2000;
const DEFAULT_L2_PENALTY: f64 = 1e-3;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("no positive examples")]
    NoPositives,
    #[error("no negative examples")]
    NoNegatives,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Gradient descent hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub learning_rate: f64,
    pub iterations: usize,
    pub l2_penalty: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            iterations: DEFAULT_ITERATIONS,
            l2_penalty: DEFAULT_L2_PENALTY,
        }
    }
}

/// Trained decision unit for one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub label: CollectionId,
    pub dim: usize,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    /// RFC 3339 timestamp of the fit.
    pub trained_at: String,
}

impl LinearClassifier {
    /// Fit `label` against everything else: `positives` get target 1,
    /// `negatives` target 0.
    pub fn fit(
        label: CollectionId,
        positives: &[&Embedding],
        negatives: &[&Embedding],
        params: &FitParams,
    ) -> Result<Self, ClassifierError> {
        let first = positives.first().ok_or(ClassifierError::NoPositives)?;
        if negatives.is_empty() {
            return Err(ClassifierError::NoNegatives);
        }

        let dim = first.dim();
        let samples: Vec<(&[f32], f64)> = positives
            .iter()
            .map(|e| (e.values.as_slice(), 1.0))
            .chain(negatives.iter().map(|e| (e.values.as_slice(), 0.0)))
            .collect();

        if let Some((x, _)) = samples.iter().find(|(x, _)| x.len() != dim) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dim,
                actual: x.len(),
            });
        }

        let n = samples.len() as f64;
        let mut weights = vec![0.0f64; dim];
        let mut bias = 0.0f64;
        let mut grad_w = vec![0.0f64; dim];

        for _ in 0..params.iterations {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0f64;

            for (x, target) in &samples {
                let err = sigmoid(dot(&weights, x) + bias) - target;
                for (g, &xi) in grad_w.iter_mut().zip(x.iter()) {
                    *g += err * xi as f64;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                *w -= params.learning_rate * (g / n + params.l2_penalty * *w);
            }
            bias -= params.learning_rate * grad_b / n;
        }

        tracing::debug!(
            label = %label,
            dim,
            positives = positives.len(),
            negatives = negatives.len(),
            bias,
            "fitted linear classifier"
        );

        Ok(Self {
            label,
            dim,
            weights,
            bias,
            positive_count: positives.len(),
            negative_count: negatives.len(),
            trained_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Class probabilities as `[p_negative, p_positive]`.
    pub fn predict_proba(&self, embedding: &Embedding) -> Result<[f32; 2], ClassifierError> {
        if embedding.dim() != self.dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dim,
                actual: embedding.dim(),
            });
        }
        let p = sigmoid(dot(&self.weights, &embedding.values) + self.bias);
        Ok([(1.0 - p) as f32, p as f32])
    }

    /// Probability that the embedding belongs to this classifier's label.
    pub fn positive_probability(&self, embedding: &Embedding) -> Result<f32, ClassifierError> {
        self.predict_proba(embedding).map(|[_, p]| p)
    }
}

fn dot(weights: &[f64], x: &[f32]) -> f64 {
    weights.iter().zip(x.iter()).map(|(w, &v)| w * v as f64).sum()
}

/// Logistic function, split by sign so `exp` never overflows.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

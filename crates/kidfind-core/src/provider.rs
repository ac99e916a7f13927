//! Embedding providers: image file in, one face embedding out.

use std::path::Path;
use thiserror::Error;

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns one image into one face embedding.
///
/// Implementations may hold inference sessions, hence `&mut self`.
pub trait EmbeddingProvider: Send {
    fn embed(&mut self, image: &Path) -> Result<Embedding, ProviderError>;
}

/// SCRFD detection followed by ArcFace recognition of the most confident face.
pub struct ArcFaceProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl ArcFaceProvider {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }

    /// Load `det_10g.onnx` and `w600k_r50.onnx` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self::new(detector, recognizer))
    }
}

impl EmbeddingProvider for ArcFaceProvider {
    fn embed(&mut self, image: &Path) -> Result<Embedding, ProviderError> {
        let rgb = image::ImageReader::open(image)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();

        let faces = self.detector.detect(&rgb)?;
        let face = faces.first().ok_or(ProviderError::NoFaceDetected)?;
        tracing::debug!(
            image = %image.display(),
            faces = faces.len(),
            confidence = face.confidence,
            "embedding most confident face"
        );

        Ok(self.recognizer.extract(&rgb, face)?)
    }
}

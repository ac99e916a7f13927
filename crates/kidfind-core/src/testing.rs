//! Deterministic stand-in for the ONNX embedding provider.
//!
//! Fixture "images" are text files holding comma-separated floats; a file
//! containing `noface` fails the way an image without a face does.

use std::path::Path;

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::types::Embedding;

#[derive(Default)]
pub struct FakeProvider {
    pub calls: usize,
}

impl EmbeddingProvider for FakeProvider {
    fn embed(&mut self, image: &Path) -> Result<Embedding, ProviderError> {
        self.calls += 1;
        let text = std::fs::read_to_string(image)?;
        if text.trim() == "noface" {
            return Err(ProviderError::NoFaceDetected);
        }
        let values = text
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ProviderError::NoFaceDetected)?;
        Ok(Embedding::new(values).l2_normalize())
    }
}

pub const DIM: usize = 8;

/// Embedding near axis `axis`, nudged by `jitter` along the next axis.
pub fn face(axis: usize, jitter: f32) -> String {
    let mut values = vec![0.0f32; DIM];
    values[axis % DIM] = 1.0;
    values[(axis + 1) % DIM] += jitter;
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Write `count` fixture images of subject `axis` into `dir`.
pub fn stage_subject(dir: &Path, axis: usize, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let jitter = 0.05 * i as f32;
        std::fs::write(dir.join(format!("img_{i}.jpg")), face(axis, jitter)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_format() {
        assert_eq!(face(0, 0.0), "1,0,0,0,0,0,0,0");
        assert_eq!(face(7, 0.5), "0.5,0,0,0,0,0,0,1");
    }

    #[test]
    fn test_fake_provider_reads_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, face(2, 0.0)).unwrap();
        let mut provider = FakeProvider::default();
        let e = provider.embed(&path).unwrap();
        assert_eq!(e.dim(), DIM);
        assert_eq!(e.values[2], 1.0);
        assert_eq!(provider.calls, 1);
    }
}

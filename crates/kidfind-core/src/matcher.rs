//! Matching: one probe image against one collection's classifier.

use std::path::Path;

use crate::error::IdentityError;
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::store::ClassifierStore;
use crate::types::{decide, CollectionId, MatchDecision};

pub struct Matcher<'a> {
    provider: &'a mut dyn EmbeddingProvider,
    store: &'a ClassifierStore,
}

impl<'a> Matcher<'a> {
    pub fn new(provider: &'a mut dyn EmbeddingProvider, store: &'a ClassifierStore) -> Self {
        Self { provider, store }
    }

    /// Decide whether `probe` shows the child of `collection`.
    ///
    /// An untrained collection is an error, and so is a probe file that
    /// cannot be read. A probe without a usable face is not: it is rejected
    /// with zero confidence.
    pub fn match_probe(
        &mut self,
        probe: &Path,
        collection: &CollectionId,
        threshold: f32,
    ) -> Result<MatchDecision, IdentityError> {
        let classifier = self.store.load(collection)?;

        let embedding = match self.provider.embed(probe) {
            Ok(e) => e,
            Err(ProviderError::Io(e)) => return Err(IdentityError::Storage(e)),
            Err(e) => {
                tracing::info!(collection = %collection, probe = %probe.display(), error = %e, "no usable face in probe");
                return Ok(MatchDecision::NO_FACE);
            }
        };

        let confidence = classifier.positive_probability(&embedding)?;
        let decision = decide(confidence, threshold);
        tracing::info!(
            collection = %collection,
            probe = %probe.display(),
            confidence,
            threshold,
            accepted = decision.accepted,
            "probe evaluated"
        );
        Ok(decision)
    }
}

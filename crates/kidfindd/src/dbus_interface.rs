use std::path::PathBuf;

use kidfind_core::routing::RoutingConfig;
use kidfind_core::IdentityError;
use zbus::interface;

use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the kidfind daemon.
///
/// Bus name: org.kidfind.Finder1
/// Object path: /org/kidfind/Finder1
pub struct FinderService {
    engine: EngineHandle,
    routing: RoutingConfig,
    threshold: f32,
}

impl FinderService {
    pub fn new(engine: EngineHandle, routing: RoutingConfig, threshold: f32) -> Self {
        Self { engine, routing, threshold }
    }
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::Identity(IdentityError::InvalidCollectionId(id)) => {
            zbus::fdo::Error::InvalidArgs(format!("invalid collection id: {id}"))
        }
        EngineError::Identity(
            e @ (IdentityError::CollectionNotFound(_) | IdentityError::UntrainedCollection(_)),
        ) => zbus::fdo::Error::FileNotFound(e.to_string()),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[interface(name = "org.kidfind.Finder1")]
impl FinderService {
    /// Retrain a collection. An empty `staged_image_dir` uses the default
    /// staging directory for the collection.
    async fn train(&self, collection_id: &str, staged_image_dir: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(collection_id, staged_image_dir, "train requested");
        let dir = (!staged_image_dir.is_empty()).then(|| PathBuf::from(staged_image_dir));
        self.engine.on_train_request(collection_id, dir).await.map_err(to_fdo)
    }

    /// Retrain every staged collection; returns the ids that were trained.
    async fn train_all(&self) -> zbus::fdo::Result<Vec<String>> {
        tracing::info!("train all requested");
        let trained = self.engine.train_all().await.map_err(to_fdo)?;
        Ok(trained.iter().map(|c| c.to_string()).collect())
    }

    /// Match an image against a collection.
    async fn match_image(&self, collection_id: &str, image_path: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(collection_id, image_path, "match requested");
        self.engine
            .on_image_received(collection_id, PathBuf::from(image_path))
            .await
            .map_err(to_fdo)
    }

    /// Resolve the chat's collection and match the image against it.
    ///
    /// Returns (matched, collection_id, forward_target). An unrouted chat
    /// yields (false, "", "").
    async fn match_chat_image(&self, chat_id: &str, image_path: &str) -> zbus::fdo::Result<(bool, String, String)> {
        let Some(collection) = self.routing.collection_for_chat(chat_id) else {
            tracing::debug!(chat_id, "image from unrouted chat ignored");
            return Ok((false, String::new(), String::new()));
        };

        let matched = self
            .engine
            .on_image_received(collection.as_str(), PathBuf::from(image_path))
            .await
            .map_err(to_fdo)?;
        if matched {
            tracing::info!(chat_id, collection = %collection, "child detected in image");
        } else {
            tracing::info!(chat_id, collection = %collection, "child not detected in image");
        }

        let target = self.routing.target().unwrap_or_default().to_string();
        Ok((matched, collection.to_string(), target))
    }

    async fn create_collection(&self, collection_id: &str) -> zbus::fdo::Result<()> {
        tracing::info!(collection_id, "create requested");
        self.engine.create(collection_id).await.map_err(to_fdo)
    }

    async fn delete_collection(&self, collection_id: &str) -> zbus::fdo::Result<()> {
        tracing::info!(collection_id, "delete requested");
        self.engine.on_delete_request(collection_id).await.map_err(to_fdo)
    }

    /// Staged and trained collections as a JSON array.
    async fn list_collections(&self) -> zbus::fdo::Result<String> {
        let collections = self.engine.collections().await.map_err(to_fdo)?;
        serde_json::to_string(&collections).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Collections named in the routing file.
    async fn configured_collections(&self) -> Vec<String> {
        self.routing.collection_ids().iter().map(|c| c.to_string()).collect()
    }

    async fn list_training_images(&self, collection_id: &str) -> zbus::fdo::Result<Vec<String>> {
        let images = self.engine.training_images(collection_id).await.map_err(to_fdo)?;
        Ok(images.iter().map(|p| p.display().to_string()).collect())
    }

    /// Collection a chat is routed to, or "" when none.
    async fn collection_for_chat(&self, chat_id: &str) -> String {
        self.routing
            .collection_for_chat(chat_id)
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "strategy": "local-classifier",
            "match_threshold": self.threshold,
            "routed_kids": self.routing.kids.len(),
            "forward_target": self.routing.target(),
        })
        .to_string())
    }
}

use std::path::PathBuf;

use kidfind_core::{CollectionId, CollectionStatus, FaceIdentity, IdentityError, MatchDecision, TrainOutcome, TrainSummary};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

type Reply<T> = oneshot::Sender<Result<T, IdentityError>>;

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Train {
        collection: CollectionId,
        image_dir: Option<PathBuf>,
        reply: Reply<TrainOutcome>,
    },
    TrainAll {
        reply: Reply<Vec<TrainSummary>>,
    },
    Match {
        collection: CollectionId,
        probe: PathBuf,
        reply: Reply<MatchDecision>,
    },
    Create {
        collection: CollectionId,
        reply: Reply<()>,
    },
    Delete {
        collection: CollectionId,
        reply: Reply<()>,
    },
    Collections {
        reply: Reply<Vec<CollectionStatus>>,
    },
    TrainingImages {
        collection: CollectionId,
        reply: Reply<Vec<PathBuf>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    /// Match a received image against the chat's collection.
    ///
    /// Returns whether the child was found. The caller forwards the image
    /// (or not) and removes the staged probe file afterwards.
    pub async fn on_image_received(&self, collection_id: &str, image_path: PathBuf) -> Result<bool, EngineError> {
        let collection = CollectionId::new(collection_id)?;
        let decision = self
            .request(|reply| EngineRequest::Match { collection, probe: image_path, reply })
            .await?;
        Ok(decision.accepted)
    }

    /// Retrain a collection from its staging directory.
    ///
    /// `staged_image_dir` of `None` uses the collection's default staging
    /// directory. Training failures are logged and reported as `false`.
    pub async fn on_train_request(
        &self,
        collection_id: &str,
        staged_image_dir: Option<PathBuf>,
    ) -> Result<bool, EngineError> {
        let collection = CollectionId::new(collection_id)?;
        let result = self
            .request(|reply| EngineRequest::Train {
                collection: collection.clone(),
                image_dir: staged_image_dir,
                reply,
            })
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(EngineError::Identity(e)) => {
                tracing::error!(collection = %collection, error = %e, "training failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Retrain every staged collection. Returns the collections that got a
    /// new classifier.
    pub async fn train_all(&self) -> Result<Vec<CollectionId>, EngineError> {
        let summaries = self.request(|reply| EngineRequest::TrainAll { reply }).await?;
        Ok(summaries.into_iter().map(|s| s.collection).collect())
    }

    pub async fn on_delete_request(&self, collection_id: &str) -> Result<(), EngineError> {
        let collection = CollectionId::new(collection_id)?;
        self.request(|reply| EngineRequest::Delete { collection, reply }).await
    }

    pub async fn create(&self, collection_id: &str) -> Result<(), EngineError> {
        let collection = CollectionId::new(collection_id)?;
        self.request(|reply| EngineRequest::Create { collection, reply }).await
    }

    pub async fn collections(&self) -> Result<Vec<CollectionStatus>, EngineError> {
        self.request(|reply| EngineRequest::Collections { reply }).await
    }

    pub async fn training_images(&self, collection_id: &str) -> Result<Vec<PathBuf>, EngineError> {
        let collection = CollectionId::new(collection_id)?;
        self.request(|reply| EngineRequest::TrainingImages { collection, reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Embedding and classifier fitting block for a long time, so they never
/// run on the async runtime. Requests are served one at a time, which also
/// orders a train and a later match on the same collection.
pub fn spawn_engine(
    mut identity: Box<dyn FaceIdentity>,
    queue_depth: usize,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("kidfind-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                handle(identity.as_mut(), req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn handle(identity: &mut dyn FaceIdentity, req: EngineRequest) {
    match req {
        EngineRequest::Train { collection, image_dir, reply } => {
            let dir = image_dir.unwrap_or_else(|| identity.staging_dir(&collection));
            let _ = reply.send(identity.train(&collection, &dir));
        }
        EngineRequest::TrainAll { reply } => {
            let _ = reply.send(identity.train_all());
        }
        EngineRequest::Match { collection, probe, reply } => {
            let _ = reply.send(identity.match_probe(&probe, &collection));
        }
        EngineRequest::Create { collection, reply } => {
            let _ = reply.send(identity.create_collection(&collection));
        }
        EngineRequest::Delete { collection, reply } => {
            let _ = reply.send(identity.delete_collection(&collection));
        }
        EngineRequest::Collections { reply } => {
            let _ = reply.send(identity.collections());
        }
        EngineRequest::TrainingImages { collection, reply } => {
            let _ = reply.send(identity.training_images(&collection));
        }
    }
}

//! Chat routing: which collection a chat is allowed to search, and where
//! matching images are forwarded.
//!
//! ```toml
//! target = "120363000000000000@g.us"
//!
//! [kids.rani]
//! collection_id = "kid_1"
//! chat_ids = ["972500000001@c.us", "120363000000000001@g.us"]
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

use crate::types::CollectionId;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("read routing file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse routing file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One child: the collection holding their face data and the chats whose
/// images are searched for them.
#[derive(Debug, Clone, Deserialize)]
pub struct KidRoute {
    pub collection_id: CollectionId,
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    /// Recipient that matching images are forwarded to.
    pub target: Option<String>,
    #[serde(default)]
    /// Kids in file order.
    pub kids: IndexMap<String, KidRoute>,
}

impl RoutingConfig {
    pub fn parse(src: &str) -> Result<Self, RoutingError> {
        Ok(toml::from_str(src)?)
    }

    /// Load from `path`; a missing file yields an empty configuration.
    pub fn load(path: &Path) -> Result<Self, RoutingError> {
        match std::fs::read_to_string(path) {
            Ok(src) => {
                let config = Self::parse(&src)?;
                tracing::info!(path = %path.display(), kids = config.kids.len(), "routing loaded");
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "routing file not found; no chats are routed");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Collection authorised for `chat_id`. Kids are checked in file order
    /// and the first one listing the chat wins.
    pub fn collection_for_chat(&self, chat_id: &str) -> Option<&CollectionId> {
        self.kids
            .values()
            .find(|kid| kid.chat_ids.iter().any(|c| c == chat_id))
            .map(|kid| &kid.collection_id)
    }

    /// Configured collection ids, in file order.
    pub fn collection_ids(&self) -> Vec<&CollectionId> {
        self.kids.values().map(|kid| &kid.collection_id).collect()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;
use crate::models::message::{self, Message};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Serializable conversation-context data for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Storage key of the context (see `ContextKey::storage_key`).
    pub key: String,
    /// JSON-serialized `Vec<Message>`.
    pub messages: String,
    /// Unix timestamp of the last save.
    pub updated_at: i64,
}

impl ContextRecord {
    /// Encode a full message list into its persisted form.
    pub fn encode(key: &str, messages: &[Message]) -> RepositoryResult<Self> {
        Ok(Self {
            key: key.to_string(),
            messages: message::serialize_messages(messages)?,
            updated_at: Utc::now().timestamp(),
        })
    }

    pub fn decode_messages(&self) -> RepositoryResult<Vec<Message>> {
        Ok(message::deserialize_messages(&self.messages)?)
    }
}

/// Repository trait for conversation-context persistence.
///
/// Implementations must make `save` an atomic replace of the whole record so
/// a crash never leaves a partially written message list behind.
pub trait ContextRepository: Send + Sync + 'static {
    /// Load the record for one context, or `None` if it was never saved.
    fn load(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<ContextRecord>>>;

    /// Atomically replace the stored record for `record.key`.
    fn save(&self, record: ContextRecord) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Remove the stored record for one context.
    fn delete(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>>;

    /// List the storage keys of all persisted contexts.
    fn list_keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::DocumentAnalysisResult;

/// Role of a chat message author.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single finalized chat message.
///
/// Messages are immutable once constructed; the text of an in-flight
/// assistant response lives in the session accumulator until the stream
/// terminates and is only then frozen into a `Message`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set on assistant messages produced by the document-analysis pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_analysis: Option<DocumentAnalysisResult>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            document_analysis: None,
        }
    }

    /// Attach a document-analysis result to an assistant message.
    pub fn with_analysis(mut self, analysis: DocumentAnalysisResult) -> Self {
        self.document_analysis = Some(analysis);
        self
    }
}

/// Serialize a message list to its persisted JSON form.
pub fn serialize_messages(messages: &[Message]) -> serde_json::Result<String> {
    serde_json::to_string(messages)
}

/// Deserialize a message list from its persisted JSON form.
pub fn deserialize_messages(json: &str) -> serde_json::Result<Vec<Message>> {
    serde_json::from_str(json)
}

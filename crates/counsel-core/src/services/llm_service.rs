use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use rig::OneOrMany;
use rig::client::CompletionClient;
use rig::completion::message::{AssistantContent, Text};
use rig::message::UserContent;
use rig::streaming::StreamingPrompt;

use crate::config::{ProviderConfig, ProviderType};
use crate::models::message::{Message, MessageRole};

/// System prompt shared by every provider. The engine's answers are always
/// framed as information, not legal advice.
const LEGAL_PREAMBLE: &str = "You are a legal information assistant helping people understand \
their situation under UK law. Explain concepts in plain language, ask for missing facts when \
they matter, and always make clear that you provide legal information, not legal advice, and \
that a qualified solicitor should be consulted before acting.";

/// Stream chunks emitted during responses
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Text(String),
    Done,
    Error(String),
}

/// Type alias for response streams
pub type ResponseStream = BoxStream<'static, Result<StreamChunk>>;

/// Upstream AI completion provider boundary.
///
/// Implementations yield ordered text chunks followed by exactly one
/// terminal `Done` or `Error` chunk. Cancellation is cooperative: the caller
/// stops polling and drops the stream, which closes the transport.
#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    /// Open a response stream for `user_text` given the prior conversation.
    async fn stream_response(&self, history: &[Message], user_text: &str)
    -> Result<ResponseStream>;

    /// Human-readable provider name, recorded in case provenance.
    fn provider_name(&self) -> &str;
}

/// Convert an engine message into the provider message format.
fn to_rig_message(message: &Message) -> rig::completion::Message {
    match message.role {
        MessageRole::User => rig::completion::Message::User {
            content: OneOrMany::one(UserContent::Text(Text {
                text: message.content.clone(),
            })),
        },
        MessageRole::Assistant => rig::completion::Message::Assistant {
            id: None,
            content: OneOrMany::one(AssistantContent::Text(Text {
                text: message.content.clone(),
            })),
        },
    }
}

fn rig_user_message(text: &str) -> rig::completion::Message {
    rig::completion::Message::User {
        content: OneOrMany::one(UserContent::Text(Text {
            text: text.to_string(),
        })),
    }
}

/// Helper macro to adapt provider streams into `StreamChunk`s
macro_rules! process_agent_stream {
    ($stream:expr) => {
        Box::pin(async_stream::stream! {
            while let Some(item) = $stream.next().await {
                match item {
                    Ok(rig::agent::MultiTurnStreamItem::StreamAssistantItem(content)) => {
                        if let rig::streaming::StreamedAssistantContent::Text(text) = content {
                            yield Ok(StreamChunk::Text(text.text));
                        }
                    }
                    Err(e) => {
                        yield Ok(StreamChunk::Error(e.to_string()));
                        return;
                    }
                    _ => {}
                }
            }
            yield Ok(StreamChunk::Done);
        })
    };
}

/// Enum-based agent wrapper for multi-provider support
#[derive(Clone)]
pub enum AgentClient {
    Anthropic(rig::agent::Agent<rig::providers::anthropic::completion::CompletionModel>),
    OpenAI(rig::agent::Agent<rig::providers::openai::responses_api::ResponsesCompletionModel>),
    Gemini(rig::agent::Agent<rig::providers::gemini::completion::CompletionModel>),
    Ollama(rig::agent::Agent<rig::providers::ollama::CompletionModel>),
}

impl AgentClient {
    /// Create an AgentClient from provider configuration.
    pub fn from_provider_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.clone();
        let base_url = config.base_url.clone();

        match config.provider_type {
            ProviderType::Anthropic => {
                let key = api_key
                    .ok_or_else(|| anyhow!("API key not configured for Anthropic provider"))?;

                let client = rig::providers::anthropic::Client::new(&key)?;
                let agent = client
                    .agent(&config.model)
                    .preamble(LEGAL_PREAMBLE)
                    .temperature(config.temperature as f64)
                    .build();

                Ok(AgentClient::Anthropic(agent))
            }
            ProviderType::OpenAI => {
                let key =
                    api_key.ok_or_else(|| anyhow!("API key not configured for OpenAI provider"))?;

                let client = rig::providers::openai::Client::new(&key)?;
                let agent = client
                    .agent(&config.model)
                    .preamble(LEGAL_PREAMBLE)
                    .temperature(config.temperature as f64)
                    .build();

                Ok(AgentClient::OpenAI(agent))
            }
            ProviderType::Gemini => {
                let key =
                    api_key.ok_or_else(|| anyhow!("API key not configured for Gemini provider"))?;

                let client = rig::providers::gemini::Client::new(&key)?;
                let agent = client
                    .agent(&config.model)
                    .preamble(LEGAL_PREAMBLE)
                    .temperature(config.temperature as f64)
                    .build();

                Ok(AgentClient::Gemini(agent))
            }
            ProviderType::Ollama => {
                let url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());

                let client = rig::providers::ollama::Client::builder()
                    .api_key(rig::client::Nothing)
                    .base_url(&url)
                    .build()?;

                let agent = client
                    .agent(&config.model)
                    .preamble(LEGAL_PREAMBLE)
                    .temperature(config.temperature as f64)
                    .build();

                Ok(AgentClient::Ollama(agent))
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for AgentClient {
    async fn stream_response(
        &self,
        history: &[Message],
        user_text: &str,
    ) -> Result<ResponseStream> {
        let user_message = rig_user_message(user_text);
        let history_snapshot: Vec<rig::completion::Message> =
            history.iter().map(to_rig_message).collect();

        let stream: ResponseStream = match self {
            AgentClient::Anthropic(agent) => {
                let mut stream = agent
                    .stream_prompt(user_message)
                    .with_history(history_snapshot)
                    .multi_turn(10)
                    .await;
                process_agent_stream!(stream)
            }
            AgentClient::OpenAI(agent) => {
                let mut stream = agent
                    .stream_prompt(user_message)
                    .with_history(history_snapshot)
                    .multi_turn(10)
                    .await;
                process_agent_stream!(stream)
            }
            AgentClient::Gemini(agent) => {
                let mut stream = agent
                    .stream_prompt(user_message)
                    .with_history(history_snapshot)
                    .multi_turn(10)
                    .await;
                process_agent_stream!(stream)
            }
            AgentClient::Ollama(agent) => {
                let mut stream = agent
                    .stream_prompt(user_message)
                    .with_history(history_snapshot)
                    .multi_turn(10)
                    .await;
                process_agent_stream!(stream)
            }
        };

        Ok(stream)
    }

    fn provider_name(&self) -> &str {
        match self {
            AgentClient::Anthropic(_) => "Anthropic",
            AgentClient::OpenAI(_) => "OpenAI",
            AgentClient::Gemini(_) => "Gemini",
            AgentClient::Ollama(_) => "Ollama",
        }
    }
}

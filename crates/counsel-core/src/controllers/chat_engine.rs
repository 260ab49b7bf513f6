use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::case_coordinator::{CaseCreationCoordinator, CaseCreationError, CaseProposalOutcome};
use crate::models::case::CaseCreationRequest;
use crate::models::context::ContextKey;
use crate::models::conversation_store::{AppendOutcome, ConversationStore};
use crate::models::events::{EngineEvent, EventBus};
use crate::models::message::Message;
use crate::models::session::{SessionError, SessionManager};
use crate::repositories::{CaseRepository, ContextRepository, RepositoryError};
use crate::services::analysis_pipeline::{AnalysisError, DocumentAnalysisPipeline};
use crate::services::document_analyzer::DocumentAnalyzer;
use crate::services::llm_service::{CompletionProvider, StreamChunk};
use crate::services::format_analysis_summary;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    CaseCreation(#[from] CaseCreationError),

    /// The caller named a context that is not the active one. The explicit
    /// context argument exists to catch exactly this kind of stale-UI bug.
    #[error("context {0} is not the active conversation context")]
    ContextNotActive(ContextKey),
}

/// UI-free orchestrator over the session engine.
///
/// Owns the conversation store, per-context streaming sessions, the
/// document-analysis pipeline and the case coordinator, and publishes
/// every observable state change on the event bus.
pub struct ChatEngine {
    store: Arc<ConversationStore>,
    sessions: Arc<SessionManager>,
    provider: Arc<dyn CompletionProvider>,
    pipeline: DocumentAnalysisPipeline,
    coordinator: CaseCreationCoordinator,
    events: EventBus,
}

impl ChatEngine {
    pub async fn open(
        provider: Arc<dyn CompletionProvider>,
        analyzer: Arc<dyn DocumentAnalyzer>,
        contexts: Arc<dyn ContextRepository>,
        cases: Arc<dyn CaseRepository>,
    ) -> Result<Self, RepositoryError> {
        let events = EventBus::new();
        let store = Arc::new(ConversationStore::open(contexts, events.clone()).await?);
        let coordinator = CaseCreationCoordinator::new(cases, store.clone(), events.clone());

        Ok(Self {
            store,
            sessions: Arc::new(SessionManager::new()),
            provider,
            pipeline: DocumentAnalysisPipeline::new(analyzer),
            coordinator,
            events,
        })
    }

    /// Build a fully wired engine from configuration: rig-backed completion
    /// provider, HTTP analyzer, and repositories on the configured backend.
    pub async fn from_config(config: &crate::config::EngineConfig) -> anyhow::Result<Self> {
        use crate::config::StorageBackend;
        use crate::repositories::{
            CaseJsonRepository, CaseSqliteRepository, ContextJsonRepository,
            ContextSqliteRepository,
        };
        use crate::services::document_analyzer::HttpDocumentAnalyzer;
        use crate::services::llm_service::AgentClient;

        let provider: Arc<dyn CompletionProvider> =
            Arc::new(AgentClient::from_provider_config(&config.provider)?);
        let analyzer: Arc<dyn DocumentAnalyzer> =
            Arc::new(HttpDocumentAnalyzer::new(&config.analyzer));

        let (contexts, cases): (Arc<dyn ContextRepository>, Arc<dyn CaseRepository>) =
            match config.storage {
                StorageBackend::Json => (
                    Arc::new(ContextJsonRepository::new()?),
                    Arc::new(CaseJsonRepository::new()?),
                ),
                StorageBackend::Sqlite => (
                    Arc::new(ContextSqliteRepository::new().await?),
                    Arc::new(CaseSqliteRepository::new().await?),
                ),
            };

        Ok(Self::open(provider, analyzer, contexts, cases).await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn active_context(&self) -> ContextKey {
        self.store.active_context()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn is_streaming(&self, context: &ContextKey) -> bool {
        self.sessions.is_streaming(context)
    }

    /// Send a user message and start streaming the assistant response.
    ///
    /// The user message is appended synchronously before the stream opens,
    /// so it survives any downstream failure. Returns the appended user
    /// message; the response arrives through events.
    pub async fn send_message(
        &self,
        context: &ContextKey,
        text: &str,
    ) -> Result<Message, EngineError> {
        let (active, generation) = self.store.active_state();
        if *context != active {
            return Err(EngineError::ContextNotActive(context.clone()));
        }

        let cancel_flag = self.sessions.begin(context, generation)?;

        // History snapshot excludes the message being sent.
        let history = self.store.messages();

        let user_message = Message::user(text);
        match self.store.append(generation, user_message.clone()).await {
            Ok(AppendOutcome::Appended) => {}
            Ok(AppendOutcome::StaleDropped) => {
                // A context switch won the race; free the session slot.
                self.sessions.finish(context);
                return Err(EngineError::ContextNotActive(context.clone()));
            }
            Err(e) => {
                self.sessions.finish(context);
                return Err(e.into());
            }
        }
        self.events.emit(EngineEvent::UserMessageAppended {
            context: context.clone(),
            message: user_message.clone(),
        });

        let task = tokio::spawn(drive_stream(
            self.store.clone(),
            self.sessions.clone(),
            self.events.clone(),
            self.provider.clone(),
            context.clone(),
            history,
            text.to_string(),
            cancel_flag,
        ));
        self.sessions.attach_task(context, task);

        Ok(user_message)
    }

    /// Stop the in-flight response for a context, preserving the partial
    /// content as a finalized message. Transport teardown is not awaited.
    pub async fn cancel_stream(&self, context: &ContextKey) -> Result<Message, EngineError> {
        let finished = self
            .sessions
            .cancel(context)
            .ok_or(SessionError::NotStreaming)?;

        let message = Message::assistant(finished.content);
        match self.store.append(finished.generation, message.clone()).await? {
            AppendOutcome::Appended => {
                self.events.emit(EngineEvent::StreamCancelled {
                    context: context.clone(),
                    message: message.clone(),
                });
            }
            AppendOutcome::StaleDropped => {
                debug!(context = %context, "Cancelled response dropped: context switched mid-stream");
            }
        }

        Ok(message)
    }

    /// Switch the active conversation context. In-flight streams for the
    /// previous context are not aborted; their eventual appends are dropped
    /// by the generation check.
    pub async fn switch_context(&self, context: ContextKey) -> Result<Vec<Message>, EngineError> {
        Ok(self.store.switch_context(context).await?)
    }

    /// Remove the persisted history of one context. The upstream caller is
    /// responsible for having confirmed this irreversible action.
    pub async fn clear_context(&self, context: &ContextKey) -> Result<(), EngineError> {
        Ok(self.store.clear(context).await?)
    }

    /// Run an uploaded document through the analysis pipeline and append the
    /// result to the conversation. The result is never auto-applied; case
    /// creation waits for an explicit `propose_case`.
    pub async fn analyze_document(
        &self,
        context: &ContextKey,
        file: &Path,
        context_text: &str,
    ) -> Result<Message, EngineError> {
        let (active, generation) = self.store.active_state();
        if *context != active {
            return Err(EngineError::ContextNotActive(context.clone()));
        }

        let result = self
            .pipeline
            .analyze(file, context_text, context.is_case())
            .await?;

        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");

        let message = Message::assistant(format_analysis_summary(filename, &result))
            .with_analysis(result);

        match self.store.append(generation, message.clone()).await? {
            AppendOutcome::Appended => {
                self.events.emit(EngineEvent::AnalysisCompleted {
                    context: context.clone(),
                    message: message.clone(),
                });
            }
            AppendOutcome::StaleDropped => {
                debug!(context = %context, "Analysis result dropped: context switched during analysis");
            }
        }

        Ok(message)
    }

    /// Propose a case from an analysis suggestion or user input. On success
    /// the conversation is switched to the new case context.
    pub async fn propose_case(
        &self,
        request: CaseCreationRequest,
    ) -> Result<CaseProposalOutcome, EngineError> {
        Ok(self.coordinator.propose_case(request).await?)
    }

    /// Retry linking the conversation to a case whose creation succeeded but
    /// whose context switch failed.
    pub async fn retry_context_switch(
        &self,
        case_id: &str,
        case_title: &str,
    ) -> Result<(), EngineError> {
        Ok(self
            .coordinator
            .retry_context_switch(case_id, case_title)
            .await?)
    }

    /// Name of the configured completion provider (for case provenance).
    pub fn provider_name(&self) -> String {
        self.provider.provider_name().to_string()
    }
}

/// User-facing text of the message synthesized when a stream fails.
/// Partial content already shown to the user is preserved above it.
fn failure_message(partial: &str, reason: &str) -> String {
    let explanation = format!(
        "I wasn't able to finish this response ({reason}). Your question has been kept in the \
         conversation — you can send it again when you're ready."
    );
    if partial.is_empty() {
        explanation
    } else {
        format!("{partial}\n\n{explanation}")
    }
}

/// Consume a response stream for one session: accumulate chunks, publish
/// deltas, and finalize on the terminal event.
///
/// Cancellation is observed between chunks; once `cancel` finalized the
/// session the loop finds its entry gone and exits without touching the
/// store. A stream that ends without a terminal chunk is treated as
/// completed.
#[allow(clippy::too_many_arguments)]
async fn drive_stream(
    store: Arc<ConversationStore>,
    sessions: Arc<SessionManager>,
    events: EventBus,
    provider: Arc<dyn CompletionProvider>,
    context: ContextKey,
    history: Vec<Message>,
    user_text: String,
    cancel_flag: Arc<std::sync::atomic::AtomicBool>,
) {
    let mut stream = match provider.stream_response(&history, &user_text).await {
        Ok(stream) => stream,
        Err(e) => {
            finalize_failure(&store, &sessions, &events, &context, &e.to_string()).await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        if cancel_flag.load(Ordering::Relaxed) {
            // cancel_stream already finalized the partial message.
            return;
        }

        match item {
            Ok(StreamChunk::Text(text)) => {
                if !sessions.push_text(&context, &text) {
                    return;
                }
                events.emit(EngineEvent::Delta {
                    context: context.clone(),
                    text,
                });
            }
            Ok(StreamChunk::Done) => {
                finalize_completion(&store, &sessions, &events, &context).await;
                return;
            }
            Ok(StreamChunk::Error(reason)) => {
                finalize_failure(&store, &sessions, &events, &context, &reason).await;
                return;
            }
            Err(e) => {
                finalize_failure(&store, &sessions, &events, &context, &e.to_string()).await;
                return;
            }
        }
    }

    finalize_completion(&store, &sessions, &events, &context).await;
}

async fn finalize_completion(
    store: &ConversationStore,
    sessions: &SessionManager,
    events: &EventBus,
    context: &ContextKey,
) {
    let Some(finished) = sessions.finish(context) else {
        return;
    };

    let message = Message::assistant(finished.content);
    match store.append(finished.generation, message.clone()).await {
        Ok(AppendOutcome::Appended) => {
            info!(context = %context, "Stream completed");
            events.emit(EngineEvent::StreamCompleted {
                context: context.clone(),
                message,
            });
        }
        Ok(AppendOutcome::StaleDropped) => {
            debug!(context = %context, "Completed response dropped: context switched mid-stream");
        }
        Err(e) => {
            error!(context = %context, error = %e, "Failed to persist completed response");
        }
    }
}

async fn finalize_failure(
    store: &ConversationStore,
    sessions: &SessionManager,
    events: &EventBus,
    context: &ContextKey,
    reason: &str,
) {
    let Some(finished) = sessions.finish(context) else {
        return;
    };

    let message = Message::assistant(failure_message(&finished.content, reason));
    match store.append(finished.generation, message.clone()).await {
        Ok(AppendOutcome::Appended) => {
            info!(context = %context, reason, "Stream failed; synthesized explanation appended");
            events.emit(EngineEvent::StreamFailed {
                context: context.clone(),
                message,
            });
        }
        Ok(AppendOutcome::StaleDropped) => {
            debug!(context = %context, "Failed response dropped: context switched mid-stream");
        }
        Err(e) => {
            error!(context = %context, error = %e, "Failed to persist failure message");
        }
    }
}

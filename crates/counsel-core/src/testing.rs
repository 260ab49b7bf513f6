//! Shared test doubles and fixtures for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::controllers::ChatEngine;
use crate::models::analysis::{DocumentAnalysisResult, DocumentType, SuggestedCase};
use crate::models::events::EngineEvent;
use crate::repositories::case_repository::{CaseRecord, CaseRepository, NewCase};
use crate::repositories::context_repository::BoxFuture;
use crate::repositories::{
    InMemoryCaseRepository, InMemoryContextRepository, RepositoryError, RepositoryResult,
};
use crate::services::document_analyzer::DocumentAnalyzer;
use crate::services::llm_service::{CompletionProvider, ResponseStream, StreamChunk};

enum Script {
    Fixed(Vec<StreamChunk>),
    Live(mpsc::UnboundedReceiver<StreamChunk>),
}

/// Completion provider that replays queued scripts, one per
/// `stream_response` call. `live()` hands back a sender for tests that need
/// chunk-by-chunk control over an in-flight stream.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fixed(chunks: Vec<StreamChunk>) -> Arc<Self> {
        let provider = Self::new();
        provider.push_fixed(chunks);
        provider
    }

    pub fn push_fixed(&self, chunks: Vec<StreamChunk>) {
        self.scripts.lock().push_back(Script::Fixed(chunks));
    }

    pub fn push_live(&self) -> mpsc::UnboundedSender<StreamChunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().push_back(Script::Live(rx));
        tx
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream_response(
        &self,
        _history: &[crate::models::message::Message],
        _user_text: &str,
    ) -> Result<ResponseStream> {
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response queued"))?;

        let stream: ResponseStream = match script {
            Script::Fixed(chunks) => {
                let chunks: Vec<Result<StreamChunk>> = chunks.into_iter().map(Ok).collect();
                Box::pin(futures::stream::iter(chunks))
            }
            Script::Live(mut rx) => Box::pin(async_stream::stream! {
                while let Some(chunk) = rx.recv().await {
                    yield Ok(chunk);
                }
            }),
        };
        Ok(stream)
    }

    fn provider_name(&self) -> &str {
        "Scripted"
    }
}

/// Analyzer returning a fixed result (or a fixed error), counting calls so
/// tests can assert the pipeline's no-retry policy.
pub(crate) struct FixedAnalyzer {
    result: Option<DocumentAnalysisResult>,
    error: Option<String>,
    calls: AtomicUsize,
}

impl FixedAnalyzer {
    pub fn new(result: DocumentAnalysisResult) -> Self {
        Self {
            result: Some(result),
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: None,
            error: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentAnalyzer for FixedAnalyzer {
    async fn analyze(&self, _file: &Path, _hint: &str) -> Result<DocumentAnalysisResult> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match (&self.result, &self.error) {
            (Some(result), _) => Ok(result.clone()),
            (None, Some(reason)) => Err(anyhow!("{reason}")),
            (None, None) => unreachable!(),
        }
    }
}

/// Case repository whose `create_case` always fails, for atomicity tests.
#[derive(Default)]
pub(crate) struct FailingCaseRepository;

impl CaseRepository for FailingCaseRepository {
    fn list_cases(
        &self,
    ) -> BoxFuture<'static, RepositoryResult<Vec<crate::models::case::CaseSummary>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn load_one(&self, _id: &str) -> BoxFuture<'static, RepositoryResult<Option<CaseRecord>>> {
        Box::pin(async { Ok(None) })
    }

    fn create_case(&self, _new_case: NewCase) -> BoxFuture<'static, RepositoryResult<String>> {
        Box::pin(async {
            Err(RepositoryError::InitializationError {
                message: "case database unavailable".to_string(),
            })
        })
    }
}

pub(crate) fn sample_analysis(suggested_case: Option<SuggestedCase>) -> DocumentAnalysisResult {
    DocumentAnalysisResult {
        extracted_text: "Dear Sir, we regret to inform you...".to_string(),
        key_facts: vec!["Employment terminated without notice".to_string()],
        dates_found: vec!["2024-03-15".to_string()],
        parties_identified: vec!["Acme Ltd".to_string()],
        document_type: DocumentType::Correspondence,
        confidence: 0.8,
        suggested_case,
    }
}

/// Engine wired to in-memory repositories and the given provider.
pub(crate) async fn test_engine(provider: Arc<dyn CompletionProvider>) -> ChatEngine {
    ChatEngine::open(
        provider,
        Arc::new(FixedAnalyzer::new(sample_analysis(None))),
        Arc::new(InMemoryContextRepository::new()),
        Arc::new(InMemoryCaseRepository::new()),
    )
    .await
    .expect("open engine")
}

/// Receive events until one matches `pred`, with a timeout guarding against
/// hung tests.
pub(crate) async fn wait_for_event(
    rx: &mut broadcast::Receiver<EngineEvent>,
    pred: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::models::analysis::DocumentAnalysisResult;

/// External document analyzer boundary.
///
/// The analyzer receives the raw file plus a short textual hint about the
/// conversation and returns extracted facts and an optional case suggestion.
/// Transport and analyzer failures surface as errors; the pipeline decides
/// what to do with them (no retries here).
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync + 'static {
    async fn analyze(&self, file: &Path, context_hint: &str) -> Result<DocumentAnalysisResult>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    filename: &'a str,
    /// Base64-encoded file content.
    content: String,
    context_hint: &'a str,
}

/// HTTP client for the analyzer service.
pub struct HttpDocumentAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDocumentAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpDocumentAnalyzer {
    async fn analyze(&self, file: &Path, context_hint: &str) -> Result<DocumentAnalysisResult> {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");

        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let request = AnalyzeRequest {
            filename,
            content: base64::engine::general_purpose::STANDARD.encode(&bytes),
            context_hint,
        };

        let url = format!("{}/v1/analyze", self.base_url);
        debug!(%url, filename, bytes = bytes.len(), "Sending document for analysis");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Analyzer request failed")?
            .error_for_status()
            .context("Analyzer rejected the document")?;

        let result: DocumentAnalysisResult = response
            .json()
            .await
            .context("Analyzer returned a malformed response")?;

        Ok(result)
    }
}

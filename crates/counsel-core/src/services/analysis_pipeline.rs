use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::document_analyzer::DocumentAnalyzer;
use super::document_validation::{self, DocumentValidationError};
use crate::models::analysis::{CaseType, DocumentAnalysisResult, SuggestedCase};

/// Confidence assigned to a fallback suggestion synthesized from nothing but
/// the filename.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    InvalidDocument(#[from] DocumentValidationError),

    #[error("document analysis failed: {0}")]
    AnalyzerFailed(anyhow::Error),
}

/// Validates an uploaded file, runs it through the external analyzer and
/// guarantees the result carries a case candidate whenever there is no
/// active case to attach the document to.
///
/// The pipeline never retries: re-sending a large file automatically is a
/// caller decision, not engine policy.
pub struct DocumentAnalysisPipeline {
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl DocumentAnalysisPipeline {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Analyze `file` with `context_text` as the conversation hint.
    ///
    /// `has_active_case` controls fallback synthesis: without an active case
    /// the downstream case-creation flow must always have a candidate to
    /// present, so an absent suggestion is replaced by a low-confidence one
    /// derived from the filename.
    pub async fn analyze(
        &self,
        file: &Path,
        context_text: &str,
        has_active_case: bool,
    ) -> Result<DocumentAnalysisResult, AnalysisError> {
        document_validation::validate_document(file)?;

        let mut result = self
            .analyzer
            .analyze(file, context_text)
            .await
            .map_err(AnalysisError::AnalyzerFailed)?;

        info!(
            document_type = ?result.document_type,
            confidence = result.confidence,
            suggested = result.suggested_case.is_some(),
            "Document analysis finished"
        );

        if !has_active_case && result.suggested_case.is_none() {
            debug!("No active case and no suggestion; synthesizing fallback candidate");
            result.suggested_case = Some(fallback_suggestion(file));
        }

        Ok(result)
    }
}

/// Minimal case candidate built from the filename alone.
fn fallback_suggestion(file: &Path) -> SuggestedCase {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("uploaded document");

    SuggestedCase {
        title: format!("Case regarding {filename}"),
        case_type: CaseType::Other,
        description: format!("Created from uploaded document {filename}"),
        field_confidences: HashMap::from([
            ("title".to_string(), FALLBACK_CONFIDENCE),
            ("case_type".to_string(), FALLBACK_CONFIDENCE),
            ("description".to_string(), FALLBACK_CONFIDENCE),
        ]),
    }
}

/// Render an analysis result as the assistant message shown in the chat.
pub fn format_analysis_summary(filename: &str, result: &DocumentAnalysisResult) -> String {
    let mut summary = format!(
        "I've analyzed **{filename}** ({}, confidence {:.0}%).\n",
        document_type_label(result),
        result.confidence * 100.0
    );

    if !result.key_facts.is_empty() {
        summary.push_str("\nKey facts:\n");
        for fact in &result.key_facts {
            summary.push_str(&format!("- {fact}\n"));
        }
    }
    if !result.parties_identified.is_empty() {
        summary.push_str(&format!(
            "\nParties identified: {}\n",
            result.parties_identified.join(", ")
        ));
    }
    if !result.dates_found.is_empty() {
        summary.push_str(&format!("\nDates found: {}\n", result.dates_found.join(", ")));
    }
    if let Some(suggestion) = &result.suggested_case {
        summary.push_str(&format!(
            "\nThis document looks like it could start a new case: \"{}\" ({}). \
             Let me know if you'd like me to create it.\n",
            suggestion.title,
            suggestion.case_type.display_name()
        ));
    }

    summary
}

fn document_type_label(result: &DocumentAnalysisResult) -> String {
    format!("{:?}", result.document_type)
}

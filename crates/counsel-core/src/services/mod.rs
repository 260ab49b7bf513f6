pub mod analysis_pipeline;
pub mod document_analyzer;
pub mod document_validation;
pub mod llm_service;

pub use analysis_pipeline::{AnalysisError, DocumentAnalysisPipeline, format_analysis_summary};
pub use document_analyzer::{DocumentAnalyzer, HttpDocumentAnalyzer};
pub use document_validation::{DocumentValidationError, validate_document};
pub use llm_service::{AgentClient, CompletionProvider, ResponseStream, StreamChunk};

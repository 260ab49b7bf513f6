//! Conversational session engine for the Counsel legal-assistant chat
//! client: streaming message lifecycle, per-case conversation persistence,
//! and the document-analysis to case-creation pipeline.

pub mod config;
pub mod controllers;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use controllers::{CaseCreationError, CaseProposalOutcome, ChatEngine, EngineError};
pub use models::{
    CaseCreationRequest, CaseSummary, ContextKey, EngineEvent, Message, MessageRole,
};

pub mod case_coordinator;
pub mod chat_engine;

pub use case_coordinator::{CaseCreationCoordinator, CaseCreationError, CaseProposalOutcome};
pub use chat_engine::{ChatEngine, EngineError};

pub mod analysis;
pub mod case;
pub mod context;
pub mod conversation_store;
pub mod events;
pub mod message;
pub mod session;

pub use analysis::{CaseType, DocumentAnalysisResult, DocumentType, SuggestedCase};
pub use case::{CaseCreationRequest, CaseProvenance, CaseSummary, ProposalSource};
pub use context::ContextKey;
pub use conversation_store::{AppendOutcome, ConversationStore};
pub use events::{EngineEvent, EventBus};
pub use message::{Message, MessageRole};
pub use session::{SessionError, SessionManager};

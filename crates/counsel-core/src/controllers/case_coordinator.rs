use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::case::{CaseCreationRequest, CaseSummary};
use crate::models::context::ContextKey;
use crate::models::conversation_store::{AppendOutcome, ConversationStore};
use crate::models::events::{EngineEvent, EventBus};
use crate::models::message::Message;
use crate::repositories::{CaseRepository, NewCase, RepositoryError};

#[derive(Debug, Error)]
pub enum CaseCreationError {
    #[error("case repository error: {0}")]
    Repository(#[source] RepositoryError),

    /// The case record exists but the conversation could not be linked to
    /// it. Retry the link with `retry_context_switch`; do not re-create the
    /// case.
    #[error("case {case_id} was created but switching the conversation to it failed")]
    ContextSwitchFailed {
        case_id: String,
        #[source]
        source: RepositoryError,
    },
}

/// Outcome of a case proposal.
#[derive(Debug)]
pub enum CaseProposalOutcome {
    Created { case_id: String },
    /// A case with the same title already exists. Nothing was created; the
    /// caller must put the decision back to the user. Merging silently is
    /// not an option because it could blend unrelated evidence.
    DuplicateDetected { existing: CaseSummary },
}

/// Turns case proposals into case records and links the conversation to the
/// newly created case.
pub struct CaseCreationCoordinator {
    cases: Arc<dyn CaseRepository>,
    store: Arc<ConversationStore>,
    events: EventBus,
}

impl CaseCreationCoordinator {
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        store: Arc<ConversationStore>,
        events: EventBus,
    ) -> Self {
        Self {
            cases,
            store,
            events,
        }
    }

    /// Check the proposed title against existing cases and create the case
    /// if it is new. The duplicate check is exact normalized equality:
    /// lowercase comparison, no whitespace or punctuation folding.
    pub async fn propose_case(
        &self,
        request: CaseCreationRequest,
    ) -> Result<CaseProposalOutcome, CaseCreationError> {
        let existing = self
            .cases
            .list_cases()
            .await
            .map_err(CaseCreationError::Repository)?;

        if let Some(existing) = existing
            .into_iter()
            .find(|case| titles_match(&case.title, &request.suggested_title))
        {
            info!(title = %request.suggested_title, existing_id = %existing.id, "Duplicate case title detected");
            self.events.emit(EngineEvent::DuplicateDetected {
                existing: existing.clone(),
            });
            return Ok(CaseProposalOutcome::DuplicateDetected { existing });
        }

        let case_id = self.create_case(request).await?;
        Ok(CaseProposalOutcome::Created { case_id })
    }

    /// Create the case record, then atomically link the conversation:
    /// if creation fails nothing is switched; if the switch fails the case
    /// still exists and the error carries its id for a retried link.
    pub async fn create_case(
        &self,
        request: CaseCreationRequest,
    ) -> Result<String, CaseCreationError> {
        let title = request.suggested_title.clone();

        let case_id = self
            .cases
            .create_case(NewCase::from(request))
            .await
            .map_err(CaseCreationError::Repository)?;

        info!(case_id = %case_id, title = %title, "Case created");
        self.events.emit(EngineEvent::CaseCreated {
            case_id: case_id.clone(),
        });

        self.link_conversation(&case_id, &title).await?;

        Ok(case_id)
    }

    /// Re-run the conversation link for an already created case.
    pub async fn retry_context_switch(
        &self,
        case_id: &str,
        case_title: &str,
    ) -> Result<(), CaseCreationError> {
        self.link_conversation(case_id, case_title).await
    }

    /// Switch the active conversation to the case context and append the
    /// guidance message there. Both steps are part of the link: a failure in
    /// either leaves a retryable `ContextSwitchFailed`.
    async fn link_conversation(
        &self,
        case_id: &str,
        case_title: &str,
    ) -> Result<(), CaseCreationError> {
        let context = ContextKey::Case(case_id.to_string());

        self.store
            .switch_context(context.clone())
            .await
            .map_err(|source| CaseCreationError::ContextSwitchFailed {
                case_id: case_id.to_string(),
                source,
            })?;

        let generation = self.store.generation();
        let guidance = Message::assistant(guidance_message(case_title));

        match self.store.append(generation, guidance).await {
            Ok(AppendOutcome::Appended) => Ok(()),
            Ok(AppendOutcome::StaleDropped) => {
                // The user switched away between our switch and the append.
                // The case is created and was linked; nothing to retry.
                warn!(case_id, "Guidance message dropped by a concurrent context switch");
                Ok(())
            }
            Err(source) => Err(CaseCreationError::ContextSwitchFailed {
                case_id: case_id.to_string(),
                source,
            }),
        }
    }
}

/// Case-insensitive exact comparison of case titles.
/// Deliberately does not trim or fold punctuation; see DESIGN.md.
fn titles_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Fixed template appended to a freshly linked case conversation. This is
/// the only engine-generated message not derived from a model response.
fn guidance_message(case_title: &str) -> String {
    format!(
        "Your new case \"{case_title}\" has been created and this conversation is now \
         linked to it.\n\n\
         Next steps you might consider:\n\
         - Upload any documents related to this case so they stay together.\n\
         - Add key dates and deadlines as you learn them.\n\
         - Ask questions about your situation; answers will be kept in this case's history.\n\n\
         Please remember: I provide legal information, not legal advice. For decisions that \
         affect your rights, consult a qualified solicitor."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::CaseType;
    use crate::models::events::EventBus;
    use crate::models::message::MessageRole;
    use crate::repositories::{InMemoryCaseRepository, InMemoryContextRepository};

    async fn coordinator() -> (
        CaseCreationCoordinator,
        Arc<ConversationStore>,
        Arc<InMemoryCaseRepository>,
        tokio::sync::broadcast::Receiver<EngineEvent>,
    ) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let store = Arc::new(
            ConversationStore::open(Arc::new(InMemoryContextRepository::new()), events.clone())
                .await
                .unwrap(),
        );
        let cases = Arc::new(InMemoryCaseRepository::new());
        let coordinator = CaseCreationCoordinator::new(cases.clone(), store.clone(), events);
        (coordinator, store, cases, rx)
    }

    fn request(title: &str) -> CaseCreationRequest {
        CaseCreationRequest::user_initiated(title, CaseType::EmploymentDispute, "dismissal claim")
    }

    #[tokio::test]
    async fn test_propose_creates_case_and_switches_context() {
        let (coordinator, store, cases, _rx) = coordinator().await;

        let outcome = coordinator.propose_case(request("Smith v Jones")).await.unwrap();

        let case_id = match outcome {
            CaseProposalOutcome::Created { case_id } => case_id,
            other => panic!("expected creation, got {other:?}"),
        };

        assert_eq!(store.active_context(), ContextKey::Case(case_id.clone()));
        assert_eq!(cases.list_cases().await.unwrap().len(), 1);

        // Guidance message is waiting in the new context.
        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert!(messages[0].content.contains("Smith v Jones"));
        assert!(messages[0].content.contains("not legal advice"));
    }

    #[tokio::test]
    async fn test_duplicate_is_case_insensitive_and_creates_nothing() {
        let (coordinator, _store, cases, _rx) = coordinator().await;
        coordinator.propose_case(request("Smith v Jones")).await.unwrap();
        coordinator.propose_case(request("Doe v Co")).await.unwrap();

        let outcome = coordinator.propose_case(request("smith V JONES")).await.unwrap();

        match outcome {
            CaseProposalOutcome::DuplicateDetected { existing } => {
                assert_eq!(existing.title, "Smith v Jones");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(cases.list_cases().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_check_is_idempotent() {
        let (coordinator, _store, cases, _rx) = coordinator().await;
        coordinator.propose_case(request("Smith v Jones")).await.unwrap();

        for _ in 0..2 {
            let outcome = coordinator.propose_case(request("smith v jones")).await.unwrap();
            assert!(matches!(
                outcome,
                CaseProposalOutcome::DuplicateDetected { .. }
            ));
        }
        assert_eq!(cases.list_cases().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_punctuation_differences_are_not_duplicates() {
        let (coordinator, _store, _cases, _rx) = coordinator().await;
        coordinator.propose_case(request("Smith v Jones")).await.unwrap();

        let outcome = coordinator.propose_case(request("Smith v. Jones")).await.unwrap();
        assert!(matches!(outcome, CaseProposalOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_emits_event() {
        let (coordinator, _store, _cases, mut rx) = coordinator().await;
        coordinator.propose_case(request("Smith v Jones")).await.unwrap();
        coordinator.propose_case(request("smith v jones")).await.unwrap();

        let mut saw_duplicate = false;
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::DuplicateDetected { existing } = event {
                assert_eq!(existing.title, "Smith v Jones");
                saw_duplicate = true;
            }
        }
        assert!(saw_duplicate);
    }

    #[tokio::test]
    async fn test_failed_creation_switches_nothing() {
        let events = EventBus::new();
        let store = Arc::new(
            ConversationStore::open(Arc::new(InMemoryContextRepository::new()), events.clone())
                .await
                .unwrap(),
        );
        let coordinator = CaseCreationCoordinator::new(
            Arc::new(crate::testing::FailingCaseRepository),
            store.clone(),
            events,
        );

        let err = coordinator.propose_case(request("Smith v Jones")).await.unwrap_err();
        assert!(matches!(err, CaseCreationError::Repository(_)));

        // No context switch, no guidance message.
        assert_eq!(store.active_context(), ContextKey::Global);
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn test_titles_match_rules() {
        assert!(titles_match("Smith v Jones", "smith v jones"));
        assert!(titles_match("SMITH V JONES", "Smith v Jones"));
        assert!(!titles_match("Smith v Jones", "Smith v Jones "));
        assert!(!titles_match("Smith v Jones", "Smith v. Jones"));
    }
}

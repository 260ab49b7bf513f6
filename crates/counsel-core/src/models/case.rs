use serde::{Deserialize, Serialize};

use super::analysis::{CaseType, SuggestedCase};

/// Lightweight case row used for listings and duplicate checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: String,
    pub title: String,
}

/// Where a case-creation request originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    DocumentAnalysis,
    UserInitiated,
}

/// Audit trail carried from proposal to the created case record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseProvenance {
    pub source: ProposalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
}

/// Transient request to create a case. Either becomes a case record or is
/// discarded; never persisted on its own.
#[derive(Clone, Debug)]
pub struct CaseCreationRequest {
    pub suggested_title: String,
    pub case_type: CaseType,
    pub description: String,
    pub provenance: CaseProvenance,
}

impl CaseCreationRequest {
    /// Build a request from an analyzer suggestion plus provenance details.
    pub fn from_suggestion(
        suggestion: &SuggestedCase,
        document_filename: impl Into<String>,
        ai_provider: Option<String>,
    ) -> Self {
        Self {
            suggested_title: suggestion.title.clone(),
            case_type: suggestion.case_type,
            description: suggestion.description.clone(),
            provenance: CaseProvenance {
                source: ProposalSource::DocumentAnalysis,
                document_filename: Some(document_filename.into()),
                ai_provider,
            },
        }
    }

    pub fn user_initiated(
        title: impl Into<String>,
        case_type: CaseType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            suggested_title: title.into(),
            case_type,
            description: description.into(),
            provenance: CaseProvenance {
                source: ProposalSource::UserInitiated,
                document_filename: None,
                ai_provider: None,
            },
        }
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context_repository::BoxFuture;
use super::error::RepositoryResult;
use crate::models::analysis::CaseType;
use crate::models::case::{CaseCreationRequest, CaseProvenance, CaseSummary};

/// Fields of a case about to be created.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub title: String,
    pub case_type: CaseType,
    pub description: String,
    pub provenance: CaseProvenance,
}

impl From<CaseCreationRequest> for NewCase {
    fn from(request: CaseCreationRequest) -> Self {
        Self {
            title: request.suggested_title,
            case_type: request.case_type,
            description: request.description,
            provenance: request.provenance,
        }
    }
}

/// Persisted case row, provenance included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub title: String,
    pub case_type: CaseType,
    pub description: String,
    pub provenance: CaseProvenance,
    pub created_at: i64,
}

impl CaseRecord {
    pub fn create(new_case: NewCase) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: new_case.title,
            case_type: new_case.case_type,
            description: new_case.description,
            provenance: new_case.provenance,
            created_at: Utc::now().timestamp(),
        }
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// Repository trait for case persistence.
pub trait CaseRepository: Send + Sync + 'static {
    /// List id + title for all cases (fast path for duplicate checks and
    /// sidebars; no provenance deserialization).
    fn list_cases(&self) -> BoxFuture<'static, RepositoryResult<Vec<CaseSummary>>>;

    /// Load the full record for a single case by id.
    fn load_one(&self, id: &str) -> BoxFuture<'static, RepositoryResult<Option<CaseRecord>>>;

    /// Persist a new case and return its generated id.
    fn create_case(&self, new_case: NewCase) -> BoxFuture<'static, RepositoryResult<String>>;
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::case_repository::{CaseRecord, CaseRepository, NewCase};
use super::context_repository::BoxFuture;
use super::error::RepositoryResult;
use crate::models::case::CaseSummary;

/// In-memory repository for case records.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryCaseRepository {
    cases: Arc<Mutex<HashMap<String, CaseRecord>>>,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaseRepository for InMemoryCaseRepository {
    fn list_cases(&self) -> BoxFuture<'static, RepositoryResult<Vec<CaseSummary>>> {
        let cases = self.cases.clone();
        Box::pin(async move {
            let store = cases.lock();
            let mut records: Vec<&CaseRecord> = store.values().collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records.into_iter().map(|r| r.summary()).collect())
        })
    }

    fn load_one(&self, id: &str) -> BoxFuture<'static, RepositoryResult<Option<CaseRecord>>> {
        let cases = self.cases.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(cases.lock().get(&id).cloned()) })
    }

    fn create_case(&self, new_case: NewCase) -> BoxFuture<'static, RepositoryResult<String>> {
        let cases = self.cases.clone();
        Box::pin(async move {
            let record = CaseRecord::create(new_case);
            let id = record.id.clone();
            cases.lock().insert(id.clone(), record);
            Ok(id)
        })
    }
}

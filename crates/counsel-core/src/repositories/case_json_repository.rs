use std::collections::HashMap;
use std::path::PathBuf;

use super::case_repository::{CaseRecord, CaseRepository, NewCase};
use super::context_repository::BoxFuture;
use super::error::{RepositoryError, RepositoryResult};
use crate::models::case::CaseSummary;

/// JSON file-based repository for case records.
/// All cases live in a single ~/.config/counsel/cases.json file, replaced
/// atomically on every write.
pub struct CaseJsonRepository {
    cases_path: PathBuf,
}

impl CaseJsonRepository {
    pub fn new() -> RepositoryResult<Self> {
        let cases_path = dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("counsel")
            .join("cases.json");

        Ok(Self { cases_path })
    }

    pub fn with_path(cases_path: PathBuf) -> Self {
        Self { cases_path }
    }

    fn read_all(path: &PathBuf) -> RepositoryResult<HashMap<String, CaseRecord>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(path: &PathBuf, cases: &HashMap<String, CaseRecord>) -> RepositoryResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cases)?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl CaseRepository for CaseJsonRepository {
    fn list_cases(&self) -> BoxFuture<'static, RepositoryResult<Vec<CaseSummary>>> {
        let path = self.cases_path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let cases = Self::read_all(&path)?;
                let mut records: Vec<&CaseRecord> = cases.values().collect();
                records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(records.into_iter().map(|r| r.summary()).collect())
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("List task panicked: {e}"),
            })?
        })
    }

    fn load_one(&self, id: &str) -> BoxFuture<'static, RepositoryResult<Option<CaseRecord>>> {
        let path = self.cases_path.clone();
        let id = id.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Ok(Self::read_all(&path)?.remove(&id)))
                .await
                .map_err(|e| RepositoryError::InitializationError {
                    message: format!("Load task panicked: {e}"),
                })?
        })
    }

    fn create_case(&self, new_case: NewCase) -> BoxFuture<'static, RepositoryResult<String>> {
        let path = self.cases_path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut cases = Self::read_all(&path)?;
                let record = CaseRecord::create(new_case);
                let id = record.id.clone();
                cases.insert(id.clone(), record);
                Self::write_all(&path, &cases)?;
                Ok(id)
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Create task panicked: {e}"),
            })?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::CaseType;
    use crate::models::case::{CaseProvenance, ProposalSource};

    fn sample_case(title: &str) -> NewCase {
        NewCase {
            title: title.to_string(),
            case_type: CaseType::ContractDispute,
            description: "Contract disagreement".to_string(),
            provenance: CaseProvenance {
                source: ProposalSource::UserInitiated,
                document_filename: None,
                ai_provider: None,
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");

        let id = {
            let repo = CaseJsonRepository::with_path(path.clone());
            repo.create_case(sample_case("Smith v Jones")).await.unwrap()
        };

        // A fresh repository over the same file sees the case.
        let repo = CaseJsonRepository::with_path(path);
        let record = repo.load_one(&id).await.unwrap().expect("record");
        assert_eq!(record.title, "Smith v Jones");
        assert_eq!(record.case_type, CaseType::ContractDispute);
    }

    #[tokio::test]
    async fn test_list_cases_empty_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CaseJsonRepository::with_path(dir.path().join("cases.json"));
        assert!(repo.list_cases().await.unwrap().is_empty());
    }
}

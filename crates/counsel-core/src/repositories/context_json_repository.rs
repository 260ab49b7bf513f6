use std::path::PathBuf;

use super::context_repository::{BoxFuture, ContextRecord, ContextRepository};
use super::error::{RepositoryError, RepositoryResult};

/// JSON file-based repository for conversation contexts.
/// Stores each context as a separate file in ~/.config/counsel/contexts/
pub struct ContextJsonRepository {
    contexts_dir: PathBuf,
}

impl ContextJsonRepository {
    pub fn new() -> RepositoryResult<Self> {
        let contexts_dir = dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("counsel")
            .join("contexts");

        Ok(Self { contexts_dir })
    }

    /// Repository rooted at an explicit directory (used by tests and tools).
    pub fn with_dir(contexts_dir: PathBuf) -> Self {
        Self { contexts_dir }
    }

    fn context_path(&self, key: &str) -> PathBuf {
        self.contexts_dir.join(format!("{key}.json"))
    }
}

impl ContextRepository for ContextJsonRepository {
    fn load(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<ContextRecord>>> {
        let path = self.context_path(key);

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                if !path.exists() {
                    return Ok(None);
                }
                let content = std::fs::read_to_string(&path)?;
                let record: ContextRecord = serde_json::from_str(&content)?;
                Ok(Some(record))
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Load task panicked: {e}"),
            })?
        })
    }

    fn save(&self, record: ContextRecord) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.context_path(&record.key);
        let contexts_dir = self.contexts_dir.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                std::fs::create_dir_all(&contexts_dir)?;

                let json = serde_json::to_string_pretty(&record)?;

                // Write to file atomically (write to temp, then rename)
                let temp_path = path.with_extension("json.tmp");
                std::fs::write(&temp_path, json)?;
                std::fs::rename(&temp_path, &path)?;

                Ok(())
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Save task panicked: {e}"),
            })?
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.context_path(key);

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                if path.exists() {
                    std::fs::remove_file(&path)?;
                }
                Ok(())
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Delete task panicked: {e}"),
            })?
        })
    }

    fn list_keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let contexts_dir = self.contexts_dir.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                if !contexts_dir.exists() {
                    return Ok(Vec::new());
                }
                let mut keys = Vec::new();
                for entry in std::fs::read_dir(&contexts_dir)? {
                    let path = entry?.path();
                    if path.extension().and_then(|s| s.to_str()) == Some("json")
                        && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    {
                        keys.push(stem.to_string());
                    }
                }
                keys.sort();
                Ok(keys)
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("List task panicked: {e}"),
            })?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;

    fn temp_repo() -> (tempfile::TempDir, ContextJsonRepository) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = ContextJsonRepository::with_dir(dir.path().join("contexts"));
        (dir, repo)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_dir, repo) = temp_repo();
        let record =
            ContextRecord::encode("global", &[Message::user("hi"), Message::assistant("hello")])
                .unwrap();

        repo.save(record).await.unwrap();

        let loaded = repo.load("global").await.unwrap().expect("record");
        let messages = loaded.decode_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let (_dir, repo) = temp_repo();
        assert!(repo.load("case-unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_record() {
        let (_dir, repo) = temp_repo();
        let first = ContextRecord::encode("global", &[Message::user("one")]).unwrap();
        repo.save(first).await.unwrap();

        let second =
            ContextRecord::encode("global", &[Message::user("one"), Message::user("two")]).unwrap();
        repo.save(second).await.unwrap();

        let loaded = repo.load("global").await.unwrap().expect("record");
        assert_eq!(loaded.decode_messages().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file_behind() {
        let (dir, repo) = temp_repo();
        let record = ContextRecord::encode("global", &[Message::user("hi")]).unwrap();
        repo.save(record).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("contexts"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_list_keys() {
        let (_dir, repo) = temp_repo();
        for key in ["global", "case-1", "case-2"] {
            let record = ContextRecord::encode(key, &[Message::user("hi")]).unwrap();
            repo.save(record).await.unwrap();
        }

        repo.delete("case-1").await.unwrap();

        let keys = repo.list_keys().await.unwrap();
        assert_eq!(keys, vec!["case-2".to_string(), "global".to_string()]);
    }
}

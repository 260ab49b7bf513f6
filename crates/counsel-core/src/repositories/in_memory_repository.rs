use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::context_repository::{BoxFuture, ContextRecord, ContextRepository};
use super::error::RepositoryResult;

/// In-memory repository for conversation contexts.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryContextRepository {
    contexts: Arc<Mutex<HashMap<String, ContextRecord>>>,
}

impl InMemoryContextRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextRepository for InMemoryContextRepository {
    fn load(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<ContextRecord>>> {
        let contexts = self.contexts.clone();
        let key = key.to_string();
        Box::pin(async move { Ok(contexts.lock().get(&key).cloned()) })
    }

    fn save(&self, record: ContextRecord) -> BoxFuture<'static, RepositoryResult<()>> {
        let contexts = self.contexts.clone();
        Box::pin(async move {
            contexts.lock().insert(record.key.clone(), record);
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let contexts = self.contexts.clone();
        let key = key.to_string();
        Box::pin(async move {
            contexts.lock().remove(&key);
            Ok(())
        })
    }

    fn list_keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let contexts = self.contexts.clone();
        Box::pin(async move {
            let mut keys: Vec<String> = contexts.lock().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        })
    }
}

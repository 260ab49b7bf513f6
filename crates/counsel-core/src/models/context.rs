use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage key of the default conversation that is not linked to any case.
const GLOBAL_KEY: &str = "global";
const CASE_KEY_PREFIX: &str = "case-";

/// Identifies which conversation a message belongs to: either the global
/// default conversation or the conversation linked to a specific case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    Global,
    Case(String),
}

impl ContextKey {
    /// Stable key used to address this context in persistent storage.
    pub fn storage_key(&self) -> String {
        match self {
            ContextKey::Global => GLOBAL_KEY.to_string(),
            ContextKey::Case(id) => format!("{CASE_KEY_PREFIX}{id}"),
        }
    }

    /// Parse a storage key back into a context key.
    pub fn from_storage_key(key: &str) -> Self {
        match key.strip_prefix(CASE_KEY_PREFIX) {
            Some(id) if !id.is_empty() => ContextKey::Case(id.to_string()),
            _ => ContextKey::Global,
        }
    }

    pub fn is_case(&self) -> bool {
        matches!(self, ContextKey::Case(_))
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

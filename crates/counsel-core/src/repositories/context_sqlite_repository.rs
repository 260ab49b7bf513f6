use std::path::{Path, PathBuf};

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::context_repository::{BoxFuture, ContextRecord, ContextRepository};
use super::error::{RepositoryError, RepositoryResult};

/// Migrations applied in order. Each entry is (version, sql).
/// To add a new migration: append a tuple with the next version number and
/// its SQL. Never edit or remove existing entries.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS contexts (
        key        TEXT    PRIMARY KEY,
        messages   TEXT    NOT NULL DEFAULT '[]',
        updated_at INTEGER NOT NULL DEFAULT 0
    );",
)];

/// SQLite-backed repository for conversation contexts.
///
/// Uses WAL journal mode for concurrent reads during background saves.
/// `SqlitePool` is internally reference-counted and cheap to clone.
#[derive(Clone)]
pub struct ContextSqliteRepository {
    pool: SqlitePool,
}

impl ContextSqliteRepository {
    /// Open (or create) the SQLite database at the platform-specific config path.
    pub async fn new() -> RepositoryResult<Self> {
        Self::open(&Self::db_path()?).await
    }

    /// Open (or create) the database at an explicit path.
    pub async fn open(db_path: &Path) -> RepositoryResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        info!(path = %db_path.display(), "Opened SQLite context database");

        Ok(Self { pool })
    }

    /// Create the schema_version table if absent, then apply any pending migrations.
    async fn run_migrations(pool: &SqlitePool) -> RepositoryResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "INSERT INTO schema_version (version) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
        )
        .execute(pool)
        .await?;

        let current: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await?;

        for (version, sql) in MIGRATIONS {
            if *version > current {
                info!(version, "Applying context schema migration");
                for statement in sql.split(';') {
                    let trimmed = statement.trim();
                    if !trimmed.is_empty() {
                        sqlx::query(trimmed).execute(pool).await?;
                    }
                }
                sqlx::query("UPDATE schema_version SET version = ?")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    fn db_path() -> RepositoryResult<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Cannot find config directory".into(),
            })
            .map(|p| p.join("counsel").join("contexts.db"))
    }
}

impl ContextRepository for ContextSqliteRepository {
    fn load(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<ContextRecord>>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        Box::pin(async move {
            let row = sqlx::query("SELECT key, messages, updated_at FROM contexts WHERE key = ?")
                .bind(&key)
                .fetch_optional(&pool)
                .await?;

            Ok(row.map(|r| ContextRecord {
                key: r.get("key"),
                messages: r.get("messages"),
                updated_at: r.get("updated_at"),
            }))
        })
    }

    fn save(&self, record: ContextRecord) -> BoxFuture<'static, RepositoryResult<()>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // Single upsert statement: the stored list is replaced wholesale,
            // never appended to in place.
            sqlx::query(
                "INSERT INTO contexts (key, messages, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    messages   = excluded.messages,
                    updated_at = excluded.updated_at",
            )
            .bind(&record.key)
            .bind(&record.messages)
            .bind(record.updated_at)
            .execute(&pool)
            .await?;

            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        Box::pin(async move {
            sqlx::query("DELETE FROM contexts WHERE key = ?")
                .bind(&key)
                .execute(&pool)
                .await?;
            Ok(())
        })
    }

    fn list_keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query("SELECT key FROM contexts ORDER BY key")
                .fetch_all(&pool)
                .await?;
            Ok(rows.iter().map(|r| r.get("key")).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;

    #[tokio::test]
    async fn test_sqlite_save_load_delete_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = ContextSqliteRepository::open(&dir.path().join("contexts.db"))
            .await
            .expect("open db");

        let record = ContextRecord::encode("case-1", &[Message::user("hello")]).unwrap();
        repo.save(record).await.unwrap();

        let loaded = repo.load("case-1").await.unwrap().expect("record");
        assert_eq!(loaded.decode_messages().unwrap()[0].content, "hello");

        let replaced =
            ContextRecord::encode("case-1", &[Message::user("hello"), Message::assistant("hi")])
                .unwrap();
        repo.save(replaced).await.unwrap();
        let loaded = repo.load("case-1").await.unwrap().expect("record");
        assert_eq!(loaded.decode_messages().unwrap().len(), 2);

        repo.delete("case-1").await.unwrap();
        assert!(repo.load("case-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_list_keys_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = ContextSqliteRepository::open(&dir.path().join("contexts.db"))
            .await
            .expect("open db");

        for key in ["global", "case-b", "case-a"] {
            let record = ContextRecord::encode(key, &[]).unwrap();
            repo.save(record).await.unwrap();
        }

        let keys = repo.list_keys().await.unwrap();
        assert_eq!(keys, vec!["case-a", "case-b", "global"]);
    }
}

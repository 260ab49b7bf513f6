use std::path::{Path, PathBuf};

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::case_repository::{CaseRecord, CaseRepository, NewCase};
use super::context_repository::BoxFuture;
use super::error::{RepositoryError, RepositoryResult};
use crate::models::case::CaseSummary;

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS cases (
        id                TEXT    PRIMARY KEY,
        title             TEXT    NOT NULL DEFAULT '',
        case_type         TEXT    NOT NULL DEFAULT 'other',
        description       TEXT    NOT NULL DEFAULT '',
        source            TEXT    NOT NULL DEFAULT 'user_initiated',
        document_filename TEXT,
        ai_provider       TEXT,
        created_at        INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_cases_created_at
        ON cases (created_at DESC);",
)];

/// SQLite-backed repository for case records.
#[derive(Clone)]
pub struct CaseSqliteRepository {
    pool: SqlitePool,
}

impl CaseSqliteRepository {
    pub async fn new() -> RepositoryResult<Self> {
        Self::open(&Self::db_path()?).await
    }

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

        info!(path = %db_path.display(), "Opened SQLite case database");

        Ok(Self { pool })
    }

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
                info!(version, "Applying case schema migration");
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
            .map(|p| p.join("counsel").join("cases.db"))
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> RepositoryResult<CaseRecord> {
        let case_type_json = format!("\"{}\"", row.get::<String, _>("case_type"));
        let source_json = format!("\"{}\"", row.get::<String, _>("source"));
        Ok(CaseRecord {
            id: row.get("id"),
            title: row.get("title"),
            case_type: serde_json::from_str(&case_type_json)?,
            description: row.get("description"),
            provenance: crate::models::case::CaseProvenance {
                source: serde_json::from_str(&source_json)?,
                document_filename: row.get("document_filename"),
                ai_provider: row.get("ai_provider"),
            },
            created_at: row.get("created_at"),
        })
    }

    fn enum_column<T: serde::Serialize>(value: &T) -> RepositoryResult<String> {
        // Enums are stored as their serde snake_case names, without quotes.
        let json = serde_json::to_string(value)?;
        Ok(json.trim_matches('"').to_string())
    }
}

impl CaseRepository for CaseSqliteRepository {
    fn list_cases(&self) -> BoxFuture<'static, RepositoryResult<Vec<CaseSummary>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query("SELECT id, title FROM cases ORDER BY created_at DESC")
                .fetch_all(&pool)
                .await?;

            Ok(rows
                .iter()
                .map(|r| CaseSummary {
                    id: r.get("id"),
                    title: r.get("title"),
                })
                .collect())
        })
    }

    fn load_one(&self, id: &str) -> BoxFuture<'static, RepositoryResult<Option<CaseRecord>>> {
        let pool = self.pool.clone();
        let id = id.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, title, case_type, description, source,
                        document_filename, ai_provider, created_at
                 FROM cases
                 WHERE id = ?",
            )
            .bind(&id)
            .fetch_optional(&pool)
            .await?;

            row.map(|r| Self::record_from_row(&r)).transpose()
        })
    }

    fn create_case(&self, new_case: NewCase) -> BoxFuture<'static, RepositoryResult<String>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = CaseRecord::create(new_case);
            let case_type = Self::enum_column(&record.case_type)?;
            let source = Self::enum_column(&record.provenance.source)?;

            sqlx::query(
                "INSERT INTO cases
                    (id, title, case_type, description, source,
                     document_filename, ai_provider, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&record.id)
            .bind(&record.title)
            .bind(&case_type)
            .bind(&record.description)
            .bind(&source)
            .bind(&record.provenance.document_filename)
            .bind(&record.provenance.ai_provider)
            .bind(record.created_at)
            .execute(&pool)
            .await?;

            Ok(record.id)
        })
    }
}

pub mod case_json_repository;
pub mod case_repository;
pub mod case_sqlite_repository;
pub mod context_json_repository;
pub mod context_repository;
pub mod context_sqlite_repository;
pub mod error;
pub mod in_memory_case_repository;
pub mod in_memory_repository;

pub use case_json_repository::CaseJsonRepository;
pub use case_repository::{CaseRecord, CaseRepository, NewCase};
pub use case_sqlite_repository::CaseSqliteRepository;
pub use context_json_repository::ContextJsonRepository;
pub use context_repository::{BoxFuture, ContextRecord, ContextRepository};
pub use context_sqlite_repository::ContextSqliteRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_case_repository::InMemoryCaseRepository;
pub use in_memory_repository::InMemoryContextRepository;

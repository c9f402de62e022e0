//! Core domain logic for the Atlas anatomical model description editor.
//! This crate is the single source of truth for identifier, sentence and
//! association invariants; front ends only call into it.

pub mod config;
pub mod db;
pub mod exchange;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod repo;
pub mod service;
pub mod session;
pub mod sync;
pub mod text;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::body::{BodyModel, ModelRecord};
pub use model::identifier::{Classification, Gender, IdentifierError, ModelValue};
pub use model::sentence::{Sentence, SentenceHash};
pub use navigation::Direction;
pub use repo::model_repo::{DescriptionFilter, ModelRepository, SqliteModelRepository};
pub use repo::sentence_repo::{SaveOutcome, SentenceRepository, SqliteSentenceRepository};
pub use repo::{RepoError, RepoResult};
pub use service::editor_service::{EditorError, EditorResult, EditorService, NewStructure};
pub use session::{SessionError, SessionStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

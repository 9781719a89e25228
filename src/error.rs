use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SpiceError {
    #[error("invalid compound id: {0}")]
    InvalidCompoundId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("PubChem request failed: {0}")]
    PubchemHttp(String),

    #[error("PubChem returned status {status}: {message}")]
    PubchemStatus { status: u16, message: String },

    #[error("unexpected PubChem payload: {0}")]
    PubchemPayload(String),

    #[error("invalid artifact body: {0}")]
    InvalidArtifact(String),

    #[error("SQLite database not found at {0}")]
    #[diagnostic(help("run `spicebase data load <workbook.xlsx>` or point --db at an existing database"))]
    StoreNotFound(PathBuf),

    #[error("database error: {0}")]
    Database(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("sheet {sheet}: missing columns {missing:?}; available: {available:?}")]
    MissingColumns {
        sheet: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SpiceError {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SpiceError::PubchemHttp(_)
                | SpiceError::PubchemStatus { .. }
                | SpiceError::PubchemPayload(_)
                | SpiceError::InvalidArtifact(_)
        )
    }
}

impl From<rusqlite::Error> for SpiceError {
    fn from(err: rusqlite::Error) -> Self {
        SpiceError::Database(err.to_string())
    }
}

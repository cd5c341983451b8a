use thiserror::Error;

use crate::core::schema::Status;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dependency cycle in {scope}: unresolved nodes {remaining:?}")]
    Cycle {
        scope: String,
        remaining: Vec<String>,
    },

    #[error("Invalid transition from {from} to {to}: {reason}")]
    Transition {
        from: Status,
        to: Status,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Status not initialized: {0}")]
    NotInitialized(String),

    #[error("Plan parse error in {file}: {message}")]
    PlanParse { file: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

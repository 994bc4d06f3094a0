use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact not found: {name}")]
    ArtifactNotFound { name: String },

    #[error("Invalid artifact name: {name}")]
    InvalidArtifactName { name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config store returned HTTP {status} for {url}")]
    Http { status: u16, url: String, body: String },

    #[error("Config store unreachable at {url}: {message}")]
    Unavailable { url: String, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is about missing or malformed data rather than a flaky backend
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::ArtifactNotFound { .. } | Self::InvalidArtifactName { .. } | Self::Json(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

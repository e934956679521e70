use thiserror::Error;
use wingo_client::FetchError;

/// Failures of the durable snapshot store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode or decode record {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid snapshot key `{0}`")]
    InvalidKey(String),
}

impl StorageError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }
}

/// Run-scoped failures. Unit-scoped failures (one route window, one flight,
/// one archive write) are logged and counted instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pipeline run was cancelled")]
    Cancelled,

    #[error("{stage} worker failed: {source}")]
    Join {
        stage: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

use reqwest::{Method, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,

    #[error("could not build request for {url}: {reason}")]
    RequestBuild { url: String, reason: String },

    #[error("could not send request: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed: {method} {url} - {status}")]
    UpstreamStatus {
        status: StatusCode,
        method: Method,
        url: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response cache error at {path}: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date `{input}`")]
    InvalidDate { input: String },
}

impl FetchError {
    pub fn request_build(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestBuild {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream_status(status: StatusCode, method: Method, url: impl Into<String>) -> Self {
        Self::UpstreamStatus {
            status,
            method,
            url: url.into(),
        }
    }

    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    pub fn cache(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Cache {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.into(),
        }
    }

    /// Whether another attempt inside the retry loop may succeed.
    ///
    /// Every non-OK status is retried up to the attempt cap, matching the
    /// upstream's habit of answering transient overload with arbitrary codes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::UpstreamStatus { .. } => true,
            Self::Cancelled
            | Self::RequestBuild { .. }
            | Self::Decode { .. }
            | Self::Cache { .. }
            | Self::InvalidDate { .. } => false,
        }
    }

    /// Status code of an upstream rejection, if that is what this error is.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

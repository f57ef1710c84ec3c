use thiserror::Error;

/// A single member of a fan-out batch that did not produce a value.
#[derive(Debug, Error)]
#[error("{batch}[{member}]: {error}")]
pub struct FetchFailure {
    pub batch: String,
    pub member: String,
    #[source]
    pub error: CatalogError,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("unknown grouping `{0}`")]
    UnknownGrouping(String),

    #[error("registry error in {file}: {reason}")]
    Registry { file: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// Every upstream request issued for the call failed.
    #[error("all {} upstream requests failed", failures.len())]
    Unavailable { failures: Vec<FetchFailure> },
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

use thiserror::Error;

/// Failure of a single attempt against the sports-data source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by source (http 429)")]
    RateLimited,

    #[error("server error: http {0}")]
    Server(u16),

    #[error("client error: http {status}: {body}")]
    Client { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout
                | SourceError::Network(_)
                | SourceError::RateLimited
                | SourceError::Server(_)
        )
    }

    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => SourceError::RateLimited,
            500..=599 => SourceError::Server(status),
            _ => SourceError::Client { status, body },
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return SourceError::Timeout;
        }
        if let Some(status) = err.status() {
            return SourceError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return SourceError::Malformed(err.to_string());
        }
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

/// Outcome of a fetch after the retry policy has run. Either variant skips
/// the affected fixture; neither aborts a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient fetch failure after {attempts} attempt(s): {last}")]
    Transient { attempts: u32, last: SourceError },

    #[error("permanent fetch failure: {0}")]
    Permanent(SourceError),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type PersistResult<T> = Result<T, PersistenceError>;

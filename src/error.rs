use thiserror::Error;

/// Failures surfaced by the query gateway.
///
/// Neither variant is fatal: views render them as an error state with a
/// retry hint and keep whatever data they last had.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The indexing service could not be reached (DNS, connect, timeout).
    #[error("indexer unreachable: {message}")]
    Transport { message: String },

    /// The service answered but refused or failed the query.
    #[error("query {query} rejected: {message}")]
    QueryRejected { query: String, message: String },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryRejected {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Only transport failures are worth retrying; a rejected query will be
    /// rejected again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}

/// Startup configuration problems. These are the only errors that stop the
/// process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

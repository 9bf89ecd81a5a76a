use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid coordinate ({latitude}, {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: &'static str,
    },

    #[error("invalid query parameter {name}: {reason}")]
    InvalidQueryParameter { name: &'static str, reason: String },

    #[error("merchant snapshot has not been built yet")]
    SnapshotUnavailable,

    #[error("query cancelled after {processed} candidates")]
    Cancelled { processed: usize },

    /// Arithmetic on validated input produced a value that cannot be right.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    /// True for errors caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidCoordinate { .. } | CoreError::InvalidQueryParameter { .. }
        )
    }

    /// True for transient server-side conditions worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::SnapshotUnavailable)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read merchants file {path}: {source}")]
    MerchantsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse merchants file: {0}")]
    MerchantsFileParse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}

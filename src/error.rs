use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtDbError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Statement error: {0}")]
    StatementError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Invalid input: {0}")]
    InputError(String),

    #[error("Forbidden characters in value: {0}")]
    StripCharacters(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ExtDbError {
    /// Whether a query attempt that failed with this error may be retried on a reset session.
    ///
    /// Connection, statement and execution failures are treated as transient. Bad input,
    /// parameter mismatches, forbidden characters and unsupported column types fail the
    /// same way on every attempt and are not retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SqliteError(err) => !matches!(
                err,
                rusqlite::Error::InvalidParameterCount(..)
                    | rusqlite::Error::InvalidColumnType(..)
                    | rusqlite::Error::InvalidParameterName(_)
            ),
            Self::ConnectionError(_) | Self::StatementError(_) | Self::ExecutionError(_) => true,
            Self::ConfigError(_)
            | Self::ParameterError(_)
            | Self::InputError(_)
            | Self::StripCharacters(_)
            | Self::Unsupported(_)
            | Self::Other(_) => false,
        }
    }
}

pub(crate) fn connection_error(message: impl Into<String>) -> ExtDbError {
    ExtDbError::ConnectionError(message.into())
}

//! Common error types and handling for Colloquy

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Colloquy workspace
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Get the error code for logs and structured reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Unexpected(_) => "UNEXPECTED_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Error::NotFound(_) => "NOT_FOUND",
        }
    }
}

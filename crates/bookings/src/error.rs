use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    /// A required booking field is missing or out of range. Nothing is persisted.
    #[error("invalid booking: {0}")]
    Validation(String),

    #[error("booking not found: {0}")]
    NotFound(String),

    #[error("booking {0} is not paid")]
    NotPaid(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BookingError>;

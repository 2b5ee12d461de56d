//! Error taxonomy for the domain layer. Each variant maps onto one HTTP
//! status class at the API boundary; the store's internal errors surface
//! as `Internal` via the `anyhow` conversion.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed phone, empty body, unknown list id, keyword collision,
    /// unsupported target combination. Surfaced as 400.
    #[error("{0}")]
    InvalidInput(String),

    /// Missing subscriber, list, keyword, or short code. Surfaced as 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate keyword or list name; duplicate explicit subscriber add.
    /// Surfaced as 409.
    #[error("{0}")]
    Conflict(String),

    /// Gateway or notifier failure. Surfaced as 502.
    #[error("{0}")]
    Dependency(String),

    /// Repository errors not attributable to input. Surfaced as 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Error::Dependency(msg.into())
    }
}

use thiserror::Error;

/// Error surface shared by the engine and its adapters.
///
/// Kept intentionally small: the engine never needs to distinguish more
/// cases than its callers can act on.
#[derive(Debug, Error)]
pub enum AtomKvError {
    #[error("no such key")]
    NotFound,

    #[error("value is not an integer")]
    NotAnInteger,

    #[error("key exceeds maximum length")]
    KeyTooLong,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type AtomKvResult<T> = Result<T, AtomKvError>;

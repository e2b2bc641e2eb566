use thiserror::Error;

/// Catalog error taxonomy. The variant is the programmatic contract;
/// messages are advisory.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("monitor lease unavailable")]
    LeaseUnavailable,
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn unauthorized(what: impl Into<String>) -> Self {
        Error::Unauthorized(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Error::AlreadyExists(what.into())
    }

    pub fn bad_request(what: impl Into<String>) -> Self {
        Error::BadRequest(what.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

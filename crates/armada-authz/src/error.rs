use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid tag {0:?}")]
    InvalidTag(String),
    #[error("invalid relation {0:?}")]
    InvalidRelation(String),
    #[error("invalid tuple: {0}")]
    InvalidTuple(String),
    #[error("invalid page cursor {0:?}")]
    InvalidCursor(String),
}

pub type Result<T> = std::result::Result<T, Error>;

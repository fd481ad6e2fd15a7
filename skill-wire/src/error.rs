//! Wire-level errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("invalid UTF-8 in string data at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unknown wire type id {id}")]
    UnknownTypeId { id: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type WireResult<T> = Result<T, WireError>;

//! Storage and state-machine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("append requires a base file; this state was never read or written")]
    NoBaseFile,

    #[error("cannot append: the base file carries unknown subtypes of \"{base}\"")]
    UnknownSubtypes { base: String },

    #[error("field \"{field}\" of type \"{type_name}\": {reason}")]
    ValueMismatch {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("string \"{0}\" was not interned before writing")]
    MissingString(String),

    #[error("malformed file at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    #[error(transparent)]
    Wire(#[from] skill_wire::WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StateResult<T> = Result<T, StateError>;

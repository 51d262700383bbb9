//! UCI protocol errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UciError {
    #[error("position command needs a startpos or fen keyword")]
    MalformedPosition,

    #[error("invalid FEN: {fen}")]
    InvalidFen { fen: String },

    #[error("move {text:?} is not legal in the given position")]
    IllegalMove { text: String },

    #[error("missing value for go parameter {param}")]
    MissingValue { param: &'static str },

    #[error("invalid value for go parameter {param}: {value:?}")]
    InvalidValue { param: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("store error: {0}")]
    Store(String),

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for WardenError {
    fn from(e: std::io::Error) -> Self {
        WardenError::Io(e.to_string())
    }
}

pub type WardenResult<T> = Result<T, WardenError>;

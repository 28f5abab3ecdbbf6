use orgwarden_core::WardenError;
use std::fmt;
use thiserror::Error;

/// Single error enum for all decision engine operations.
///
/// A `PolicyError` is never a denial: callers that must collapse an error
/// into a decision map it to deny.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy load error: {0}")]
    LoadError(String),

    #[error("malformed policy row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("policy model error: {0}")]
    ModelError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("policy store error: {0}")]
    StoreError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Discriminator for PolicyError variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    LoadError,
    MalformedRow,
    ModelError,
    InvalidRequest,
    StoreError,
    InternalError,
}

/// Which phase of the engine's life an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The engine refused to initialize.
    Startup,
    /// The request itself could not be evaluated.
    Request,
    /// A mutation or reload failed; the published snapshot is unchanged.
    Store,
    Internal,
}

impl PolicyError {
    pub fn kind(&self) -> PolicyErrorKind {
        match self {
            PolicyError::LoadError(_) => PolicyErrorKind::LoadError,
            PolicyError::MalformedRow { .. } => PolicyErrorKind::MalformedRow,
            PolicyError::ModelError(_) => PolicyErrorKind::ModelError,
            PolicyError::InvalidRequest(_) => PolicyErrorKind::InvalidRequest,
            PolicyError::StoreError(_) => PolicyErrorKind::StoreError,
            PolicyError::InternalError(_) => PolicyErrorKind::InternalError,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind() {
            PolicyErrorKind::LoadError
            | PolicyErrorKind::MalformedRow
            | PolicyErrorKind::ModelError => ErrorClass::Startup,
            PolicyErrorKind::InvalidRequest => ErrorClass::Request,
            PolicyErrorKind::StoreError => ErrorClass::Store,
            PolicyErrorKind::InternalError => ErrorClass::Internal,
        }
    }
}

impl fmt::Display for PolicyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyErrorKind::LoadError => write!(f, "LoadError"),
            PolicyErrorKind::MalformedRow => write!(f, "MalformedRow"),
            PolicyErrorKind::ModelError => write!(f, "ModelError"),
            PolicyErrorKind::InvalidRequest => write!(f, "InvalidRequest"),
            PolicyErrorKind::StoreError => write!(f, "StoreError"),
            PolicyErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

impl From<WardenError> for PolicyError {
    fn from(e: WardenError) -> Self {
        match e {
            WardenError::MalformedRow { line, reason } => PolicyError::MalformedRow { line, reason },
            WardenError::Io(msg) => PolicyError::StoreError(msg),
            WardenError::InvalidValue(msg) => PolicyError::InvalidRequest(msg),
            WardenError::Store(msg) => PolicyError::StoreError(msg),
            WardenError::Internal(msg) => PolicyError::InternalError(msg),
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

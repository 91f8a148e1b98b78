//! Model validation errors.

use thiserror::Error;

use crate::job::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown media kind: {0}")]
    UnknownMediaKind(String),

    #[error("Unknown output format: {0}")]
    UnknownOutputFormat(String),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::PayloadKind;

/// Domain errors represent invalid input to the transformation itself.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid service name: {0:?}")]
    InvalidServiceName(String),

    #[error("invalid heredoc pattern for {kind}: {message}")]
    InvalidPattern { kind: PayloadKind, message: String },
}

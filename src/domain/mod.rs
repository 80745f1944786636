//! Domain layer: entities and text transformation
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod heredoc;

pub use entities::*;
pub use error::DomainError;
pub use heredoc::{normalize_newlines, HeredocPattern, PayloadKind, Substitution};

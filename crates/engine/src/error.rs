//! The module contains the errors the engine can return.
//!
//! Only rejected operations are errors. Malformed rows met while reading a
//! tree are corrected in place and reported as [`Diagnostic`]s instead.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] returned when an item id is not part of the list.
//! - [`CycleRejected`] returned when a move would make an item its own ancestor.
//!
//!  [`Diagnostic`]: crate::Diagnostic
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`CycleRejected`]: EngineError::CycleRejected
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Cycle rejected: {0}")]
    CycleRejected(String),
    #[error("Invalid parent: {0}")]
    InvalidParent(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("\"{0}\" is a category, not an item")]
    NotAnItem(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid code: {0}")]
    InvalidCode(String),
}

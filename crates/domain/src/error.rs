//! Domain error type.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input that does not form a valid value (timestamps, ids)
    #[error("Invalid value: {0}")]
    Parse(String),
}

impl DomainError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

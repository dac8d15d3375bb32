//! Port traits for the REST backend.

use async_trait::async_trait;

use storefront_domain::{Notification, NotificationId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid response: {0}")]
    ParseError(String),
}

/// Notification history and read-state persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationsApi: Send + Sync {
    /// Most recent notifications of the signed-in user.
    async fn list(&self) -> Result<Vec<Notification>, ApiError>;
    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError>;
    async fn mark_all_read(&self) -> Result<(), ApiError>;
}

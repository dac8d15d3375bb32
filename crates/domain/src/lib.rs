//! Storefront domain types.
//!
//! Pure vocabulary shared by the protocol and client crates: identifiers, the
//! notification record, the authenticated session, formatting helpers used by the
//! storefront views, and the image upload rules.

pub mod auth;
pub mod error;
pub mod format;
pub mod ids;
pub mod notification;
pub mod upload;

pub use auth::{AuthSession, AuthUser, UserRole};
pub use error::DomainError;
pub use ids::{NotificationId, UserId};
pub use notification::{EntityRef, Notification, NotificationKind, NotificationPayload};
pub use upload::{
    BatchUploadOutcome, UploadFile, UploadOutcome, UploadValidationError, UploadedImage,
};

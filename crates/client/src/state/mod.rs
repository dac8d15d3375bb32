//! Client-side state.

pub mod notification_store;

pub use notification_store::{
    NotificationStore, SharedNotificationStore, StoreSnapshot, StoreSubscription,
};

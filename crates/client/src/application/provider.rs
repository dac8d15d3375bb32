//! Notification provider.
//!
//! Bridges the authentication state to the connection manager and the store.
//! The binding is a small state machine keyed by `(user_id, listener)`:
//!
//! - signed in as a new user: connect, join the user's room, register the one
//!   `new_notification` listener, hydrate history;
//! - signed in again as the same user: only make sure the connection is up;
//! - signed out: unregister the listener, leave the room, clear the store. The
//!   connection itself stays open.
//!
//! This is the only place that joins rooms or registers listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use storefront_domain::{AuthSession, NotificationId, UserId};
use storefront_protocol::{decode_notification, NEW_NOTIFICATION};

use crate::infrastructure::messaging::{ConnectionManager, ListenerHandle};
use crate::ports::NotificationsApi;
use crate::state::SharedNotificationStore;

#[derive(Debug, Default)]
enum Binding {
    #[default]
    Unbound,
    Bound {
        user_id: UserId,
        listener: ListenerHandle,
    },
}

pub struct NotificationProvider {
    connection: ConnectionManager,
    store: SharedNotificationStore,
    api: Option<Arc<dyn NotificationsApi>>,
    binding: Binding,
    /// Bumped on every binding change; stale history fetches are discarded
    generation: Arc<AtomicU64>,
}

impl NotificationProvider {
    pub fn new(connection: ConnectionManager, store: SharedNotificationStore) -> Self {
        Self {
            connection,
            store,
            api: None,
            binding: Binding::Unbound,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hydrate history and persist read state through `api`.
    pub fn with_api(mut self, api: Arc<dyn NotificationsApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// React to one authentication state. Safe to call repeatedly with the same state.
    pub fn apply(&mut self, session: &AuthSession) {
        match session.user_id() {
            Some(user_id) => self.bind(user_id.clone()),
            None => self.unbind(),
        }
    }

    /// Follow `auth` until its sender side is gone, then tear the binding down.
    pub async fn run(mut self, mut auth: watch::Receiver<AuthSession>) {
        let initial = auth.borrow_and_update().clone();
        self.apply(&initial);

        while auth.changed().await.is_ok() {
            let session = auth.borrow_and_update().clone();
            self.apply(&session);
        }

        tracing::debug!("Authentication channel closed");
        self.teardown();
    }

    /// Unregister the listener. Room membership and the connection are left alone.
    pub fn teardown(&mut self) {
        if let Binding::Bound { user_id, listener } = std::mem::take(&mut self.binding) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.connection.unregister_listener(&listener);
            tracing::info!(user_id = %user_id, "Notification binding torn down");
        }
    }

    pub fn bound_user(&self) -> Option<&UserId> {
        match &self.binding {
            Binding::Bound { user_id, .. } => Some(user_id),
            Binding::Unbound => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn store(&self) -> &SharedNotificationStore {
        &self.store
    }

    pub fn actions(&self) -> NotificationActions {
        NotificationActions {
            store: self.store.clone(),
            api: self.api.clone(),
        }
    }

    fn bind(&mut self, user_id: UserId) {
        if let Binding::Bound { user_id: bound, .. } = &self.binding {
            if *bound == user_id {
                self.connection.connect();
                return;
            }
        }

        // Different user: the previous user's listener and notifications go first
        if let Binding::Bound { listener, .. } = std::mem::take(&mut self.binding) {
            self.connection.unregister_listener(&listener);
            self.store.clear();
        }

        self.connection.connect();
        self.connection.join_room(user_id.clone());

        let store = self.store.clone();
        let listener = self
            .connection
            .register_listener(NEW_NOTIFICATION, move |payload| {
                match decode_notification(payload) {
                    Ok(notification) => {
                        store.handle_new_notification(notification);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping malformed notification payload");
                    }
                }
            });

        tracing::info!(user_id = %user_id, "Notification binding established");
        self.binding = Binding::Bound { user_id, listener };
        self.hydrate();
    }

    fn unbind(&mut self) {
        let Binding::Bound { user_id, listener } = std::mem::take(&mut self.binding) else {
            return;
        };

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.connection.unregister_listener(&listener);
        self.connection.leave_room();
        self.store.clear();
        tracing::info!(user_id = %user_id, "Notification binding released");
    }

    fn hydrate(&self) {
        let Some(api) = self.api.clone() else {
            return;
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let store = self.store.clone();

        tokio::spawn(async move {
            match api.list().await {
                Ok(history) => {
                    if current.load(Ordering::SeqCst) != generation {
                        tracing::debug!("Discarding notification history for a stale binding");
                        return;
                    }
                    let added = store.hydrate(history);
                    tracing::debug!(added, "Notification history merged");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load notification history");
                }
            }
        });
    }
}

impl Drop for NotificationProvider {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Read-state actions for views: applied to the store right away, persisted in
/// the background.
#[derive(Clone)]
pub struct NotificationActions {
    store: SharedNotificationStore,
    api: Option<Arc<dyn NotificationsApi>>,
}

impl NotificationActions {
    pub fn mark_read(&self, id: NotificationId) -> bool {
        if !self.store.mark_read(&id) {
            return false;
        }
        if let Some(api) = self.api.clone() {
            tokio::spawn(async move {
                if let Err(e) = api.mark_read(&id).await {
                    tracing::warn!(id = %id, error = %e, "Failed to persist read state");
                }
            });
        }
        true
    }

    pub fn mark_all_read(&self) -> bool {
        if !self.store.mark_all_read() {
            return false;
        }
        if let Some(api) = self.api.clone() {
            tokio::spawn(async move {
                if let Err(e) = api.mark_all_read().await {
                    tracing::warn!(error = %e, "Failed to persist read state");
                }
            });
        }
        true
    }
}

//! Notification store.
//!
//! [`NotificationStore`] is the plain state machine: an id-unique list kept in
//! descending `created_at` order plus the unread count. [`SharedNotificationStore`]
//! wraps it in a `watch` channel so every action is applied atomically and
//! subscribers wake only when the visible state changed.
//!
//! The store never touches the network.

use std::sync::Arc;

use tokio::sync::watch;

use storefront_domain::{Notification, NotificationId};

/// Read-only copy of the store handed to views.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    notifications: Vec<Notification>,
    unread_count: usize,
    duplicates_absorbed: u64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly delivered notification.
    ///
    /// A notification whose id is already present replaces the stored payload in
    /// place; its position, timestamp and read state are kept and nothing is
    /// counted twice. Returns whether the visible state changed.
    pub fn handle_new_notification(&mut self, mut notification: Notification) -> bool {
        if let Some(existing) = self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification.id)
        {
            self.duplicates_absorbed += 1;
            tracing::debug!(id = %notification.id, "Duplicate notification absorbed");
            if existing.payload == notification.payload {
                return false;
            }
            existing.payload = notification.payload;
            return true;
        }

        notification.is_read = false;
        let position = self.insert_position(&notification);
        self.notifications.insert(position, notification);
        self.unread_count += 1;
        true
    }

    /// Merge history fetched from the API. Entries already in the store win.
    ///
    /// Returns how many notifications were added.
    pub fn hydrate(&mut self, history: impl IntoIterator<Item = Notification>) -> usize {
        let mut added = 0;
        for notification in history {
            if self.contains(&notification.id) {
                continue;
            }
            let position = self.insert_position(&notification);
            self.notifications.insert(position, notification);
            added += 1;
        }
        self.unread_count = self.notifications.iter().filter(|n| !n.is_read).count();
        added
    }

    /// Returns false if the id is unknown or already read.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.notifications.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&mut self) -> bool {
        if self.unread_count == 0 {
            return false;
        }
        for n in &mut self.notifications {
            n.is_read = true;
        }
        self.unread_count = 0;
        true
    }

    pub fn remove(&mut self, id: &NotificationId) -> Option<Notification> {
        let index = self.notifications.iter().position(|n| &n.id == id)?;
        let removed = self.notifications.remove(index);
        if !removed.is_read {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        Some(removed)
    }

    pub fn clear(&mut self) -> bool {
        if self.notifications.is_empty() {
            return false;
        }
        self.notifications.clear();
        self.unread_count = 0;
        true
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            notifications: self.notifications.clone(),
            unread_count: self.unread_count,
        }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.get(id).is_some()
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn duplicates_absorbed(&self) -> u64 {
        self.duplicates_absorbed
    }

    // In-order arrivals land at the front; late ones at their ordered slot.
    fn insert_position(&self, notification: &Notification) -> usize {
        self.notifications
            .iter()
            .position(|n| n.created_at <= notification.created_at)
            .unwrap_or(self.notifications.len())
    }
}

/// Cloneable, process-wide handle to the notification store.
#[derive(Clone)]
pub struct SharedNotificationStore {
    tx: Arc<watch::Sender<NotificationStore>>,
}

impl Default for SharedNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedNotificationStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NotificationStore::new());
        Self { tx: Arc::new(tx) }
    }

    fn apply(&self, action: impl FnOnce(&mut NotificationStore) -> bool) -> bool {
        self.tx.send_if_modified(action)
    }

    pub fn handle_new_notification(&self, notification: Notification) -> bool {
        self.apply(|store| store.handle_new_notification(notification))
    }

    pub fn hydrate(&self, history: Vec<Notification>) -> usize {
        let mut added = 0;
        self.apply(|store| {
            added = store.hydrate(history);
            added > 0
        });
        added
    }

    pub fn mark_read(&self, id: &NotificationId) -> bool {
        self.apply(|store| store.mark_read(id))
    }

    pub fn mark_all_read(&self) -> bool {
        self.apply(NotificationStore::mark_all_read)
    }

    pub fn remove(&self, id: &NotificationId) -> Option<Notification> {
        let mut removed = None;
        self.apply(|store| {
            removed = store.remove(id);
            removed.is_some()
        });
        removed
    }

    pub fn clear(&self) -> bool {
        self.apply(NotificationStore::clear)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.tx.borrow().snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.tx.borrow().unread_count()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn duplicates_absorbed(&self) -> u64 {
        self.tx.borrow().duplicates_absorbed()
    }

    pub fn subscribe(&self) -> StoreSubscription {
        StoreSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// Change feed for views.
pub struct StoreSubscription {
    rx: watch::Receiver<NotificationStore>,
}

impl StoreSubscription {
    pub fn snapshot(&self) -> StoreSnapshot {
        self.rx.borrow().snapshot()
    }

    /// Wait for the next change. `None` once every store handle is gone.
    pub async fn changed(&mut self) -> Option<StoreSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().snapshot())
    }
}

//! Observable authentication state.
//!
//! The login flow publishes the signed-in user here; the notification provider
//! only ever reads it.

use std::sync::Arc;

use tokio::sync::watch;

use storefront_domain::{AuthSession, AuthUser};

#[derive(Clone)]
pub struct AuthHandle {
    tx: Arc<watch::Sender<AuthSession>>,
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthSession::signed_out());
        Self { tx: Arc::new(tx) }
    }

    pub fn login(&self, user: AuthUser) {
        tracing::info!(user_id = %user.id, "User signed in");
        self.tx.send_replace(AuthSession::signed_in(user));
    }

    pub fn logout(&self) {
        if self.tx.borrow().is_authenticated() {
            tracing::info!("User signed out");
        }
        self.tx.send_replace(AuthSession::signed_out());
    }

    pub fn session(&self) -> AuthSession {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    /// The channel closes once every handle has been dropped.
    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_logout_are_observable() {
        let auth = AuthHandle::new();
        let mut rx = auth.subscribe();
        assert!(!rx.borrow().is_authenticated());

        auth.login(AuthUser::new("u1"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().user_id().map(|id| id.as_str()), Some("u1"));

        auth.logout();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_channel_closes_when_handles_drop() {
        let auth = AuthHandle::new();
        let mut rx = auth.subscribe();
        drop(auth);
        assert!(rx.changed().await.is_err());
    }
}

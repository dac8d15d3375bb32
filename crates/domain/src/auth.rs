//! Authenticated session as observed by the client.
//!
//! Token storage and the login flow itself live elsewhere; the realtime layer only
//! needs to know *who* is signed in, if anyone.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

impl AuthUser {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            email: String::new(),
            role: UserRole::Customer,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// `{ user, isAuthenticated }` pair published by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthSession {
    pub user: Option<AuthUser>,
}

impl AuthSession {
    pub fn signed_out() -> Self {
        Self { user: None }
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }
}

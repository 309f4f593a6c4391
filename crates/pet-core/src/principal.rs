//! # Principals and Roles
//!
//! The authenticated actor behind a request, its role set and the user
//! store port used to look principals up by bearer token.

use crate::error::LocaleError;
use crate::locale::LocaleCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::RwLock;

/// Storage id of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles a user may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

/// Things a role may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Enable or disable languages
    ManageLanguages,
    /// Read orders owned by other users
    ViewAnyOrder,
    /// Change other users' roles
    ManageUsers,
}

impl Role {
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => matches!(
                capability,
                Capability::ManageLanguages | Capability::ViewAnyOrder
            ),
            Role::User => false,
        }
    }
}

/// An authenticated user as seen by request handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    /// Null or a currently enabled language code
    pub language_code: Option<LocaleCode>,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// New principal holding only the `User` role
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            language_code: None,
            roles: BTreeSet::from([Role::User]),
        }
    }

    /// Builder: add a role
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    /// Builder: set the stored language preference
    pub fn with_language(mut self, code: LocaleCode) -> Self {
        self.language_code = Some(code);
        self
    }

    /// True if any held role grants the capability
    pub fn can(&self, capability: Capability) -> bool {
        self.roles.iter().any(|role| role.grants(capability))
    }
}

/// Port over the user table and token issuance collaborator
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolve a bearer token to its principal
    async fn find_by_token(&self, token: &str) -> Result<Option<Principal>, LocaleError>;

    /// Persist a new language preference
    async fn update_language(&self, user_id: UserId, code: &LocaleCode) -> Result<(), LocaleError>;
}

/// In-memory user store for development and tests
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, Principal>>,
    tokens: RwLock<HashMap<String, UserId>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and the bearer token that identifies it
    pub async fn insert(&self, principal: Principal, token: impl Into<String>) {
        let id = principal.id;
        self.users.write().await.insert(id, principal);
        self.tokens.write().await.insert(token.into(), id);
    }

    pub async fn get(&self, user_id: UserId) -> Option<Principal> {
        self.users.read().await.get(&user_id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<Principal>, LocaleError> {
        let Some(id) = self.tokens.read().await.get(token).copied() else {
            return Ok(None);
        };
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_language(&self, user_id: UserId, code: &LocaleCode) -> Result<(), LocaleError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| LocaleError::Persistence(format!("user {user_id} not found")))?;
        user.language_code = Some(code.clone());
        Ok(())
    }
}

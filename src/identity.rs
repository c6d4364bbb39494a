use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque id of the authenticated user; scopes every row access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` means unauthenticated: no session, or an expired one.
    async fn resolve_current_identity(&self) -> Option<Identity>;
}

/// Fixed identity, used with the local store.
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn resolve_current_identity(&self) -> Option<Identity> {
        self.user_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| Identity(id.clone()))
    }
}

//! Change notification transports.
//!
//! The sync controller only sees [`ChangeFeed`]; whether events come from an
//! in-process publisher or from polling the store is decided at wiring time.

pub mod local;
pub mod polling;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::store::Collection;

pub use local::LocalChangeFeed;
pub use polling::PollingChangeFeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub owner: String,
    pub kind: ChangeKind,
    pub record_id: Option<String>,
}

pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub collection: Collection,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        collection: Collection,
        owner: &str,
        on_change: ChangeHandler,
    ) -> Result<SubscriptionHandle, StoreError>;

    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Number of live subscriptions.
    fn active_subscriptions(&self) -> usize;
}

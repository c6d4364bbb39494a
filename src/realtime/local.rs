use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeHandler, SubscriptionHandle};
use crate::store::Collection;

struct Subscriber {
    collection: Collection,
    owner: String,
    handler: ChangeHandler,
}

/// In-process feed. Writers call [`LocalChangeFeed::publish`] after each
/// successful mutation.
#[derive(Default)]
pub struct LocalChangeFeed {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl LocalChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: ChangeEvent) {
        // Handlers run outside the lock; they may subscribe or unsubscribe.
        let handlers: Vec<ChangeHandler> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers
                .values()
                .filter(|s| s.collection == event.collection && s.owner == event.owner)
                .map(|s| s.handler.clone())
                .collect(),
            Err(_) => return,
        };

        debug!(
            collection = %event.collection,
            kind = ?event.kind,
            listeners = handlers.len(),
            "publishing change"
        );
        for handler in handlers {
            handler(event.clone());
        }
    }
}

#[async_trait]
impl ChangeFeed for LocalChangeFeed {
    async fn subscribe(
        &self,
        collection: Collection,
        owner: &str,
        on_change: ChangeHandler,
    ) -> Result<SubscriptionHandle, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| StoreError::Conflict("subscriber registry poisoned".to_string()))?;
        subscribers.insert(
            id,
            Subscriber {
                collection,
                owner: owner.to_string(),
                handler: on_change,
            },
        );
        Ok(SubscriptionHandle { id, collection })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&handle.id);
        }
    }

    fn active_subscriptions(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeHandler, ChangeKind, SubscriptionHandle};
use crate::store::{Collection, OrderBy, RemoteStore, Row};

/// Change feed for stores without a push channel.
///
/// Each subscription runs a task that lists the collection every `interval`
/// and reports the rows that appeared, changed or disappeared since the
/// previous poll. The baseline is read before `subscribe` returns, so a
/// caller that loads the collection afterwards misses nothing. If that read
/// fails, the first successful poll reports one event without a record id.
pub struct PollingChangeFeed {
    store: Arc<dyn RemoteStore>,
    interval: Duration,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl PollingChangeFeed {
    pub fn new(store: Arc<dyn RemoteStore>, interval_secs: u64) -> Self {
        Self::with_interval(store, Duration::from_secs(interval_secs.max(1)))
    }

    pub fn with_interval(store: Arc<dyn RemoteStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl Drop for PollingChangeFeed {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.lock() {
            for task in tasks.values() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn subscribe(
        &self,
        collection: Collection,
        owner: &str,
        on_change: ChangeHandler,
    ) -> Result<SubscriptionHandle, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let store = self.store.clone();
        let interval = self.interval;
        let owner = owner.to_string();

        info!(
            collection = %collection,
            "Starting change polling (interval: {:?})", interval
        );

        let mut previous = match store
            .fetch_all(collection, &owner, &OrderBy::newest_first())
            .await
        {
            Ok(rows) => Some(index_by_id(rows)),
            Err(e) => {
                warn!(collection = %collection, "baseline poll failed: {}", e);
                None
            }
        };

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);

            loop {
                ticker.tick().await;

                let rows = match store
                    .fetch_all(collection, &owner, &OrderBy::newest_first())
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        // Keep polling; the next tick may succeed.
                        warn!(collection = %collection, "change poll failed: {}", e);
                        continue;
                    }
                };

                let current = index_by_id(rows);
                match &previous {
                    Some(previous) => {
                        for (kind, record_id) in diff(previous, &current) {
                            debug!(collection = %collection, ?kind, %record_id, "change detected");
                            on_change(ChangeEvent {
                                collection,
                                owner: owner.clone(),
                                kind,
                                record_id: Some(record_id),
                            });
                        }
                    }
                    // No baseline: anything may have changed since subscribing.
                    None => on_change(ChangeEvent {
                        collection,
                        owner: owner.clone(),
                        kind: ChangeKind::Update,
                        record_id: None,
                    }),
                }
                previous = Some(current);
            }
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| StoreError::Conflict("poll registry poisoned".to_string()))?;
        tasks.insert(id, task);
        Ok(SubscriptionHandle { id, collection })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(&handle.id) {
                task.abort();
            }
        }
    }

    fn active_subscriptions(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }
}

fn index_by_id(rows: Vec<Row>) -> HashMap<String, Row> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_str)?.to_string();
            Some((id, row))
        })
        .collect()
}

fn diff(previous: &HashMap<String, Row>, current: &HashMap<String, Row>) -> Vec<(ChangeKind, String)> {
    let mut changes = Vec::new();
    for (id, row) in current {
        match previous.get(id) {
            None => changes.push((ChangeKind::Insert, id.clone())),
            Some(old) if old != row => changes.push((ChangeKind::Update, id.clone())),
            Some(_) => {}
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            changes.push((ChangeKind::Delete, id.clone()));
        }
    }
    changes
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::identity::{Identity, IdentityProvider};
use crate::models::{Course, Preferences, Snapshot, StudyProgram};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeHandler, SubscriptionHandle};
use crate::store::{Collection, RemoteStore, repository};

/// What happened to the result of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched rows replaced the slice.
    Applied,
    /// A newer fetch of the same collection had already been applied.
    Stale,
    /// The controller was torn down or restarted while the fetch ran.
    Discarded,
    /// The fetch failed; the previous slice is kept and the error recorded.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionErrors {
    pub courses: Option<String>,
    pub study_programs: Option<String>,
    pub preferences: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub loading: bool,
    pub owner: Option<Identity>,
    pub errors: CollectionErrors,
    pub subscriptions: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Slice<T> {
    data: T,
    applied_seq: u64,
    error: Option<String>,
    subscription_error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Slice<T> {
    /// A failed fetch is reported before a failed subscription.
    fn reported_error(&self) -> Option<String> {
        self.error.clone().or_else(|| self.subscription_error.clone())
    }
}

#[derive(Debug, Default)]
struct SyncState {
    courses: Slice<Vec<Course>>,
    study_programs: Slice<Vec<StudyProgram>>,
    preferences: Slice<Option<Preferences>>,
    loading: bool,
    owner: Option<Identity>,
    subscriptions: Vec<SubscriptionHandle>,
}

/// Owns the snapshot of the current identity's data and keeps it in step
/// with the remote store.
///
/// Every fetch carries a per-collection sequence number; a result is only
/// applied if no newer fetch of that collection has been applied first. A
/// teardown bumps the epoch, and results from fetches issued under an older
/// epoch are dropped. Public operations never fail: failures are recorded
/// in [`SyncStatus::errors`].
pub struct SyncController {
    store: Arc<dyn RemoteStore>,
    feed: Arc<dyn ChangeFeed>,
    identity: Arc<dyn IdentityProvider>,
    state: RwLock<SyncState>,
    issued: [AtomicU64; 3],
    epoch: AtomicU64,
}

fn slot(collection: Collection) -> usize {
    match collection {
        Collection::Courses => 0,
        Collection::StudyPrograms => 1,
        Collection::Preferences => 2,
    }
}

impl SyncController {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        feed: Arc<dyn ChangeFeed>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            feed,
            identity,
            state: RwLock::new(SyncState::default()),
            issued: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            epoch: AtomicU64::new(0),
        })
    }

    /// Subscribes to changes, then loads all three collections concurrently,
    /// so a change made while the initial fetches run is still delivered.
    /// `loading` stays true until every initial fetch has resolved.
    pub async fn start(self: &Arc<Self>) {
        let epoch = {
            let mut state = self.state.write().await;
            state.loading = true;
            self.epoch.load(Ordering::SeqCst)
        };

        let owner = self.identity.resolve_current_identity().await;
        match &owner {
            Some(owner) => info!(owner = %owner.as_str(), "Starting sync controller"),
            None => info!("Starting sync controller without a session"),
        }

        if let Some(owner) = &owner {
            self.subscribe_all(epoch, owner).await;
        }

        let (courses, programs, preferences) = tokio::join!(
            self.refresh(Collection::Courses),
            self.refresh(Collection::StudyPrograms),
            self.refresh(Collection::Preferences),
        );
        debug!(?courses, ?programs, ?preferences, "initial load finished");

        let mut state = self.state.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        state.loading = false;
        state.owner = owner;
    }

    /// Closes every subscription and stops applying results of fetches that
    /// are still in flight.
    pub async fn shutdown(&self) {
        let handles = {
            let mut state = self.state.write().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            state.loading = false;
            std::mem::take(&mut state.subscriptions)
        };

        let count = handles.len();
        for handle in handles {
            self.feed.unsubscribe(handle);
        }
        info!(closed = count, "Sync controller stopped");
    }

    /// Tears down, forgets the previous identity's data and starts over.
    pub async fn restart(self: &Arc<Self>) {
        self.shutdown().await;
        {
            let mut state = self.state.write().await;
            state.courses = Slice::default();
            state.study_programs = Slice::default();
            state.preferences = Slice::default();
            state.owner = None;
        }
        self.start().await;
    }

    pub async fn refresh_courses(&self) -> RefreshOutcome {
        self.refresh(Collection::Courses).await
    }

    pub async fn refresh_study_programs(&self) -> RefreshOutcome {
        self.refresh(Collection::StudyPrograms).await
    }

    pub async fn refresh_preferences(&self) -> RefreshOutcome {
        self.refresh(Collection::Preferences).await
    }

    pub async fn refresh_all(&self) -> [RefreshOutcome; 3] {
        let (courses, programs, preferences) = tokio::join!(
            self.refresh(Collection::Courses),
            self.refresh(Collection::StudyPrograms),
            self.refresh(Collection::Preferences),
        );
        [courses, programs, preferences]
    }

    /// Re-fetches one whole collection and replaces its slice.
    pub async fn refresh(&self, collection: Collection) -> RefreshOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let seq = self.issued[slot(collection)].fetch_add(1, Ordering::SeqCst) + 1;

        let owner = self.identity.resolve_current_identity().await;
        let owner = owner.as_ref().map(Identity::as_str);
        let store = self.store.as_ref();

        match collection {
            Collection::Courses => {
                let result = match owner {
                    Some(owner) => repository::fetch_courses(store, owner).await,
                    None => Ok(Vec::new()),
                };
                self.apply(collection, epoch, seq, result, |s| &mut s.courses).await
            }
            Collection::StudyPrograms => {
                let result = match owner {
                    Some(owner) => repository::fetch_study_programs(store, owner).await,
                    None => Ok(Vec::new()),
                };
                self.apply(collection, epoch, seq, result, |s| &mut s.study_programs)
                    .await
            }
            Collection::Preferences => {
                let result = match owner {
                    Some(owner) => repository::fetch_or_create_preferences(store, owner)
                        .await
                        .map(Some),
                    None => Ok(None),
                };
                self.apply(collection, epoch, seq, result, |s| &mut s.preferences)
                    .await
            }
        }
    }

    async fn apply<T>(
        &self,
        collection: Collection,
        epoch: u64,
        seq: u64,
        result: Result<T, StoreError>,
        select: impl for<'a> FnOnce(&'a mut SyncState) -> &'a mut Slice<T>,
    ) -> RefreshOutcome {
        let mut state = self.state.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(collection = %collection, seq, "dropping result from before teardown");
            return RefreshOutcome::Discarded;
        }

        let slice = select(&mut state);
        if seq <= slice.applied_seq {
            debug!(
                collection = %collection,
                seq,
                applied = slice.applied_seq,
                "dropping out-of-order result"
            );
            return RefreshOutcome::Stale;
        }

        match result {
            Ok(data) => {
                slice.data = data;
                slice.applied_seq = seq;
                slice.error = None;
                slice.refreshed_at = Some(Utc::now());
                RefreshOutcome::Applied
            }
            Err(e) => {
                warn!(collection = %collection, "refresh failed, keeping previous data: {}", e);
                let message = e.to_string();
                slice.error = Some(message.clone());
                RefreshOutcome::Failed(message)
            }
        }
    }

    async fn subscribe_all(self: &Arc<Self>, epoch: u64, owner: &Identity) {
        let mut handles = Vec::new();
        for collection in Collection::ALL {
            match self
                .feed
                .subscribe(collection, owner.as_str(), self.change_handler())
                .await
            {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(collection = %collection, "subscription failed: {}", e);
                    let mut state = self.state.write().await;
                    let error = Some(format!("subscription failed: {}", e));
                    match collection {
                        Collection::Courses => state.courses.subscription_error = error,
                        Collection::StudyPrograms => state.study_programs.subscription_error = error,
                        Collection::Preferences => state.preferences.subscription_error = error,
                    }
                }
            }
        }

        let mut state = self.state.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // Torn down while subscribing.
            drop(state);
            for handle in handles {
                self.feed.unsubscribe(handle);
            }
            return;
        }
        state.subscriptions.extend(handles);
    }

    fn change_handler(self: &Arc<Self>) -> ChangeHandler {
        let controller = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::current();

        Arc::new(move |event: ChangeEvent| {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            debug!(
                collection = %event.collection,
                kind = ?event.kind,
                record = ?event.record_id,
                "change detected"
            );
            runtime.spawn(async move {
                controller.refresh(event.collection).await;
            });
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            courses: state.courses.data.clone(),
            study_programs: state.study_programs.data.clone(),
            preferences: state.preferences.data.clone(),
        }
    }

    pub async fn courses(&self) -> Vec<Course> {
        self.state.read().await.courses.data.clone()
    }

    pub async fn study_programs(&self) -> Vec<StudyProgram> {
        self.state.read().await.study_programs.data.clone()
    }

    pub async fn preferences(&self) -> Option<Preferences> {
        self.state.read().await.preferences.data.clone()
    }

    pub async fn program(&self, id: &str) -> Option<StudyProgram> {
        let state = self.state.read().await;
        state.study_programs.data.iter().find(|p| p.id == id).cloned()
    }

    pub async fn course(&self, id: &str) -> Option<Course> {
        let state = self.state.read().await;
        state.courses.data.iter().find(|c| c.id == id).cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.read().await;
        SyncStatus {
            loading: state.loading,
            owner: state.owner.clone(),
            errors: CollectionErrors {
                courses: state.courses.reported_error(),
                study_programs: state.study_programs.reported_error(),
                preferences: state.preferences.reported_error(),
            },
            subscriptions: state.subscriptions.len(),
            last_refreshed_at: [
                state.courses.refreshed_at,
                state.study_programs.refreshed_at,
                state.preferences.refreshed_at,
            ]
            .into_iter()
            .flatten()
            .max(),
        }
    }
}

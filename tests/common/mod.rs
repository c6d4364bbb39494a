#![allow(dead_code, unused_macros)]

/// Polls the condition until it holds or two seconds pass.
macro_rules! eventually {
    ($cond:expr) => {{
        let mut holds = false;
        for _ in 0..200 {
            if $cond {
                holds = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        holds
    }};
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

use studydash::error::StoreError;
use studydash::identity::{Identity, IdentityProvider};
use studydash::models::{Course, Degree, NewCourseRequest, NewStudyProgramRequest, StudyProgram};
use studydash::store::sqlite::SqliteStore;
use studydash::store::{Collection, Filter, OrderBy, RemoteStore, Row};

pub const USER: &str = "user-1";

pub async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create database"),
    )
}

pub fn program_request(name: &str, credits: f64) -> NewStudyProgramRequest {
    NewStudyProgramRequest {
        name: name.to_string(),
        degree: Degree::Bachelor,
        institution: "TU Somewhere".to_string(),
        semesters: 6,
        current_semester: 1,
        credits,
        finished: false,
        description: None,
    }
}

pub fn course_request(program_id: &str, name: &str, credits: f64, grade: Option<f64>) -> NewCourseRequest {
    NewCourseRequest {
        program_id: program_id.to_string(),
        course_code: format!("{}-101", &name[..name.len().min(3)].to_uppercase()),
        name: name.to_string(),
        credits,
        grade,
        semesters: 1,
        finished: grade.is_some(),
        tags: None,
    }
}

pub fn program(id: &str, credits: f64, finished: bool) -> StudyProgram {
    StudyProgram {
        id: id.to_string(),
        user_id: USER.to_string(),
        name: format!("Program {}", id),
        degree: Degree::Bachelor,
        institution: String::new(),
        semesters: 6,
        current_semester: 1,
        finished,
        credits,
        description: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

pub fn course(id: &str, program_id: &str, credits: f64, grade: Option<f64>, finished: bool) -> Course {
    Course {
        id: id.to_string(),
        user_id: USER.to_string(),
        program_id: program_id.to_string(),
        course_code: id.to_uppercase(),
        name: format!("Course {}", id),
        credits,
        grade,
        semesters: 1,
        finished,
        tags: None,
        editor_state: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        updated_at: None,
    }
}

/// Identity that can be switched mid-test, like a user signing out and
/// another signing in.
pub struct SwitchableIdentity {
    current: Mutex<Option<String>>,
}

impl SwitchableIdentity {
    pub fn new(user_id: Option<&str>) -> Self {
        Self {
            current: Mutex::new(user_id.map(str::to_string)),
        }
    }

    pub fn set(&self, user_id: Option<&str>) {
        *self.current.lock().unwrap() = user_id.map(str::to_string);
    }
}

#[async_trait]
impl IdentityProvider for SwitchableIdentity {
    async fn resolve_current_identity(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone().map(Identity)
    }
}

/// Wraps a store so tests can hold listing fetches open or make them fail.
///
/// A held fetch reads its rows first and then waits for release, so its
/// result reflects the store at the time it was issued.
pub struct GatedStore {
    inner: Arc<dyn RemoteStore>,
    gates: Mutex<VecDeque<(Collection, oneshot::Receiver<()>)>>,
    waiting: AtomicUsize,
    fail_fetches: AtomicBool,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            gates: Mutex::new(VecDeque::new()),
            waiting: AtomicUsize::new(0),
            fail_fetches: AtomicBool::new(false),
        }
    }

    /// The next `fetch_all` of `collection` waits until the returned sender
    /// fires or is dropped.
    pub fn hold_next_fetch(&self, collection: Collection) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back((collection, rx));
        tx
    }

    /// Number of fetches currently held.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_fetches.store(failing, Ordering::SeqCst);
    }

    fn take_gate(&self, collection: Collection) -> Option<oneshot::Receiver<()>> {
        let mut gates = self.gates.lock().unwrap();
        let index = gates.iter().position(|(c, _)| *c == collection)?;
        gates.remove(index).map(|(_, rx)| rx)
    }
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn fetch_all(
        &self,
        collection: Collection,
        owner: &str,
        order: &OrderBy,
    ) -> Result<Vec<Row>, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Remote {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        let rows = self.inner.fetch_all(collection, owner, order).await;
        if let Some(gate) = self.take_gate(collection) {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        rows
    }

    async fn fetch_one(
        &self,
        collection: Collection,
        owner: &str,
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Remote {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        self.inner.fetch_one(collection, owner, filter).await
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row, StoreError> {
        self.inner.insert(collection, row).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner: &str,
        patch: Row,
    ) -> Result<Row, StoreError> {
        self.inner.update(collection, id, owner, patch).await
    }

    async fn delete(&self, collection: Collection, id: &str, owner: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id, owner).await
    }
}

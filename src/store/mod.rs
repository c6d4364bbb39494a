//! Remote store abstraction.
//!
//! A store is a generic, owner-scoped CRUD surface over JSON rows. Typed
//! access (and the decoding that rejects malformed rows) lives in
//! [`repository`].

pub mod repository;
pub mod sqlite;
pub mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A raw row as the store returns it.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Courses,
    StudyPrograms,
    Preferences,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Courses,
        Collection::StudyPrograms,
        Collection::Preferences,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Courses => "courses",
            Collection::StudyPrograms => "study_programs",
            Collection::Preferences => "preferences",
        }
    }

    pub fn from_table(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.table() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    /// Newest first, the order every collection is listed in.
    pub fn newest_first() -> Self {
        Self {
            column: "created_at".to_string(),
            ascending: false,
        }
    }
}

/// Equality filters, combined with AND.
pub type Filter = Vec<(String, serde_json::Value)>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_all(
        &self,
        collection: Collection,
        owner: &str,
        order: &OrderBy,
    ) -> Result<Vec<Row>, StoreError>;

    /// `Ok(None)` when no row matches; absence is not an error.
    async fn fetch_one(
        &self,
        collection: Collection,
        owner: &str,
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError>;

    /// `row` must carry `user_id`. The store fills in `id` and timestamps.
    async fn insert(&self, collection: Collection, row: Row) -> Result<Row, StoreError>;

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner: &str,
        patch: Row,
    ) -> Result<Row, StoreError>;

    async fn delete(&self, collection: Collection, id: &str, owner: &str) -> Result<(), StoreError>;
}

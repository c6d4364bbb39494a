//! Local store on SQLite.
//!
//! Rows are kept as JSON documents so the store stays schema-agnostic like
//! the hosted one; the hosted store's server-side rules (owner scoping,
//! program references, cascading deletes, one preferences row per owner) are
//! reproduced here. Every write is published on the attached
//! [`LocalChangeFeed`].
//!
//! Writes are serialized through one lock so each read-check-write runs as a
//! unit; the unique index on preferences backs the singleton rule at the
//! database level as well.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::realtime::{ChangeEvent, ChangeKind, LocalChangeFeed};
use crate::store::{Collection, Filter, OrderBy, RemoteStore, Row};

pub struct SqliteStore {
    db: SqlitePool,
    feed: Arc<LocalChangeFeed>,
    writes: Mutex<()>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database lives and dies with its single connection.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("local store ready at {}", database_url);

        Ok(Self::new(pool))
    }

    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            feed: Arc::new(LocalChangeFeed::new()),
            writes: Mutex::new(()),
        }
    }

    pub fn feed(&self) -> Arc<LocalChangeFeed> {
        self.feed.clone()
    }

    fn publish(&self, collection: Collection, owner: &str, kind: ChangeKind, id: &str) {
        self.feed.publish(ChangeEvent {
            collection,
            owner: owner.to_string(),
            kind,
            record_id: Some(id.to_string()),
        });
    }

    async fn load_all(&self, collection: Collection, owner: &str) -> Result<Vec<Row>, StoreError> {
        let bodies: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM records WHERE collection = ? AND user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(collection.table())
        .bind(owner)
        .fetch_all(&self.db)
        .await?;

        bodies
            .into_iter()
            .map(|(body,)| parse_body(&body))
            .collect()
    }

    async fn load_one(
        &self,
        collection: Collection,
        id: &str,
        owner: &str,
    ) -> Result<Option<Row>, StoreError> {
        let body: Option<(String,)> = sqlx::query_as(
            "SELECT body FROM records WHERE collection = ? AND id = ? AND user_id = ?",
        )
        .bind(collection.table())
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;

        body.map(|(body,)| parse_body(&body)).transpose()
    }

    async fn ensure_program_exists(&self, program_id: &Value, owner: &str) -> Result<(), StoreError> {
        let program_id = program_id.as_str().unwrap_or_default();
        if self
            .load_one(Collection::StudyPrograms, program_id, owner)
            .await?
            .is_none()
        {
            return Err(StoreError::Conflict(format!(
                "courses.program_id {} does not reference a study program",
                program_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn fetch_all(
        &self,
        collection: Collection,
        owner: &str,
        order: &OrderBy,
    ) -> Result<Vec<Row>, StoreError> {
        let mut rows = self.load_all(collection, owner).await?;
        if order.column != "created_at" || order.ascending {
            // Stable sort keeps newest-first among equal keys.
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        Ok(rows)
    }

    async fn fetch_one(
        &self,
        collection: Collection,
        owner: &str,
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError> {
        let rows = self.load_all(collection, owner).await?;
        Ok(rows
            .into_iter()
            .find(|row| filter.iter().all(|(key, value)| row.get(key) == Some(value))))
    }

    async fn insert(&self, collection: Collection, mut row: Row) -> Result<Row, StoreError> {
        let _write = self.writes.lock().await;
        let owner = row
            .get("user_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Remote {
                status: 400,
                message: "user_id is required".to_string(),
            })?;

        match collection {
            Collection::Courses => {
                let program_id = row.get("program_id").cloned().unwrap_or(Value::Null);
                self.ensure_program_exists(&program_id, &owner).await?;
            }
            Collection::Preferences => {
                if !self.load_all(collection, &owner).await?.is_empty() {
                    return Err(StoreError::Conflict(
                        "preferences already exist for this user".to_string(),
                    ));
                }
            }
            Collection::StudyPrograms => {}
        }

        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = timestamp();
        row.insert("id".to_string(), Value::String(id.clone()));
        row.insert("created_at".to_string(), Value::String(now.clone()));
        row.insert("updated_at".to_string(), Value::Null);

        let body = serde_json::to_string(&row)?;
        sqlx::query(
            "INSERT INTO records (collection, id, user_id, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        )
        .bind(collection.table())
        .bind(&id)
        .bind(&owner)
        .bind(&body)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(conflict_on_unique)?;

        debug!(collection = %collection, %id, "inserted row");
        self.publish(collection, &owner, ChangeKind::Insert, &id);
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner: &str,
        patch: Row,
    ) -> Result<Row, StoreError> {
        let _write = self.writes.lock().await;
        let mut current = self
            .load_one(collection, id, owner)
            .await?
            .ok_or(StoreError::NotFound)?;

        if collection == Collection::Courses {
            if let Some(program_id) = patch.get("program_id") {
                self.ensure_program_exists(program_id, owner).await?;
            }
        }

        for (key, value) in patch {
            if matches!(key.as_str(), "id" | "user_id" | "created_at") {
                continue;
            }
            current.insert(key, value);
        }
        let now = timestamp();
        current.insert("updated_at".to_string(), Value::String(now.clone()));

        let body = serde_json::to_string(&current)?;
        sqlx::query(
            "UPDATE records SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4 AND user_id = ?5",
        )
        .bind(&body)
        .bind(&now)
        .bind(collection.table())
        .bind(id)
        .bind(owner)
        .execute(&self.db)
        .await?;

        debug!(collection = %collection, %id, "updated row");
        self.publish(collection, owner, ChangeKind::Update, id);
        Ok(current)
    }

    async fn delete(&self, collection: Collection, id: &str, owner: &str) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ? AND user_id = ?")
            .bind(collection.table())
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }

        let cascaded: Vec<(String,)> = if collection == Collection::StudyPrograms {
            sqlx::query_as(
                "DELETE FROM records WHERE collection = 'courses' AND user_id = ? AND json_extract(body, '$.program_id') = ? RETURNING id",
            )
            .bind(owner)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
        } else {
            Vec::new()
        };
        tx.commit().await?;

        debug!(collection = %collection, %id, cascaded = cascaded.len(), "deleted row");
        self.publish(collection, owner, ChangeKind::Delete, id);
        for (course_id,) in &cascaded {
            self.publish(Collection::Courses, owner, ChangeKind::Delete, course_id);
        }
        Ok(())
    }
}

fn conflict_on_unique(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => other.into(),
    }
}

fn parse_body(body: &str) -> Result<Row, StoreError> {
    Ok(serde_json::from_str(body)?)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_values_puts_nulls_first() {
        assert_eq!(compare_values(Some(&json!(1)), Some(&json!(2.5))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(None, Some(&json!(0))), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None), Ordering::Equal);
    }
}

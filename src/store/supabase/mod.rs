pub mod dto;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::identity::{Identity, IdentityProvider};
use crate::store::{Collection, Filter, OrderBy, RemoteStore, Row};

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    pub anon_key: String,
    /// Session JWT of the signed-in user. Without it every request runs as
    /// the anonymous role and row filtering returns nothing.
    pub access_token: Option<String>,
}

/// PostgREST + GoTrue client for a Supabase project.
pub struct SupabaseClient {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn rest_url(&self, collection: Collection) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            collection.table()
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        request
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    fn owned(&self, collection: Collection, method: reqwest::Method, id: &str, owner: &str) -> RequestBuilder {
        self.authorized(self.client.request(method, self.rest_url(collection)))
            .query(&[("id", eq(id)), ("user_id", eq(owner))])
            .header("Prefer", "return=representation")
    }
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn fetch_all(
        &self,
        collection: Collection,
        owner: &str,
        order: &OrderBy,
    ) -> Result<Vec<Row>, StoreError> {
        let direction = if order.ascending { "asc" } else { "desc" };
        let response = self
            .authorized(self.client.get(self.rest_url(collection)))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(owner)),
                ("order", format!("{}.{}", order.column, direction)),
            ])
            .send()
            .await?;

        let rows = read_rows(response).await?;
        debug!(collection = %collection, count = rows.len(), "fetched rows");
        Ok(rows)
    }

    async fn fetch_one(
        &self,
        collection: Collection,
        owner: &str,
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError> {
        let mut params: Vec<(String, String)> = vec![
            ("select".to_string(), "*".to_string()),
            ("user_id".to_string(), eq(owner)),
            ("limit".to_string(), "1".to_string()),
        ];
        for (column, value) in filter {
            params.push((column.clone(), eq(&filter_value(value))));
        }

        let response = self
            .authorized(self.client.get(self.rest_url(collection)))
            .query(&params)
            .send()
            .await?;

        Ok(read_rows(response).await?.into_iter().next())
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row, StoreError> {
        let response = self
            .authorized(self.client.post(self.rest_url(collection)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        single(read_rows(response).await?)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner: &str,
        patch: Row,
    ) -> Result<Row, StoreError> {
        let response = self
            .owned(collection, reqwest::Method::PATCH, id, owner)
            .json(&patch)
            .send()
            .await?;

        single(read_rows(response).await?)
    }

    async fn delete(&self, collection: Collection, id: &str, owner: &str) -> Result<(), StoreError> {
        let response = self
            .owned(collection, reqwest::Method::DELETE, id, owner)
            .send()
            .await?;

        single(read_rows(response).await?).map(|_| ())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn resolve_current_identity(&self) -> Option<Identity> {
        let token = self.config.access_token.as_ref()?;
        let url = format!("{}/auth/v1/user", self.config.url.trim_end_matches('/'));

        let response = match self
            .client
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("identity lookup failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("session rejected ({}), treating as signed out", status);
            return None;
        }
        if !status.is_success() {
            warn!("identity lookup returned {}", status);
            return None;
        }

        match response.json::<dto::AuthUser>().await {
            Ok(user) => Some(Identity(user.id)),
            Err(e) => {
                warn!("failed to parse auth user: {}", e);
                None
            }
        }
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn single(rows: Vec<Row>) -> Result<Row, StoreError> {
    rows.into_iter().next().ok_or(StoreError::NotFound)
}

async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(classify_error(status, &body));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str::<Vec<Row>>(&body)
        .map_err(|e| StoreError::Decode(format!("unexpected response body: {}", e)))
}

fn classify_error(status: StatusCode, body: &str) -> StoreError {
    let parsed = serde_json::from_str::<dto::PostgrestError>(body).ok();

    if status == StatusCode::NOT_FOUND
        || parsed.as_ref().and_then(|p| p.code.as_deref()) == Some("PGRST116")
    {
        return StoreError::NotFound;
    }

    let message = parsed
        .as_ref()
        .map(|p| p.describe())
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::CONFLICT || parsed.as_ref().is_some_and(|p| p.is_conflict()) {
        return StoreError::Conflict(message);
    }

    StoreError::Remote {
        status: status.as_u16(),
        message,
    }
}

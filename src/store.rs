use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Profile;

/// Collection
///
/// The tables of the hosted store this service reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    Stories,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Stories => "stories",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// ListQuery
///
/// The narrow filter vocabulary the service needs: one equality match, newest
/// first ordering on `created_at`, and a row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub eq: Option<(String, String)>,
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// The `limit` newest rows.
    pub fn recent(limit: usize) -> Self {
        Self {
            eq: None,
            newest_first: true,
            limit: Some(limit),
        }
    }

    /// The single row whose `id` equals `id`.
    pub fn by_id(id: Uuid) -> Self {
        Self {
            eq: Some(("id".to_string(), id.to_string())),
            newest_first: false,
            limit: Some(1),
        }
    }
}

/// Page
///
/// Rows returned by a list call plus the exact number of rows matching the
/// filter, ignoring the limit, when the backend reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: Option<u64>,
}

/// StoreError
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected request on {collection}: HTTP {status}")]
    Rejected {
        collection: Collection,
        status: StatusCode,
    },

    #[error("malformed {collection} record: {source}")]
    Decode {
        collection: Collection,
        source: serde_json::Error,
    },

    #[error("{0} unavailable")]
    Unavailable(Collection),
}

/// DataStore
///
/// The two verbs this service issues against the hosted database. Schema
/// details stay with the backend; callers decode rows with `list_as`.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list(&self, collection: Collection, query: &ListQuery)
    -> Result<Page<Value>, StoreError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;
}

/// StoreState
///
/// Shared handle to the data store used across the application state.
pub type StoreState = Arc<dyn DataStore>;

/// list_as
///
/// Lists `collection` and decodes every row as `T`.
pub async fn list_as<T: DeserializeOwned>(
    store: &dyn DataStore,
    collection: Collection,
    query: &ListQuery,
) -> Result<Page<T>, StoreError> {
    let page = store.list(collection, query).await?;
    let rows = page
        .rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| StoreError::Decode { collection, source })?;
    Ok(Page {
        rows,
        total: page.total,
    })
}

/// fetch_profile
///
/// Looks up the profile mirroring an identity-provider user.
pub async fn fetch_profile(store: &dyn DataStore, id: Uuid) -> Result<Option<Profile>, StoreError> {
    let page = list_as::<Profile>(store, Collection::Profiles, &ListQuery::by_id(id)).await?;
    Ok(page.rows.into_iter().next())
}

// --- PostgREST implementation ---

/// SupabaseStore
///
/// `DataStore` over the hosted backend's PostgREST gateway (`/rest/v1`).
/// Authenticates with the service key.
#[derive(Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn endpoint(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }
}

#[async_trait]
impl DataStore for SupabaseStore {
    async fn list(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Page<Value>, StoreError> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        if let Some((field, value)) = &query.eq {
            params.push((field.clone(), format!("eq.{}", value)));
        }
        if query.newest_first {
            params.push(("order".to_string(), "created_at.desc".to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint(collection))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected { collection, status });
        }

        let total = parse_total(response.headers());
        let rows = response.json::<Vec<Value>>().await?;
        tracing::debug!(%collection, rows = rows.len(), ?total, "store list");
        Ok(Page { rows, total })
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.endpoint(collection))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected { collection, status });
        }
        tracing::debug!(%collection, %id, "store delete");
        Ok(())
    }
}

/// parse_total
///
/// Reads the exact count from a PostgREST `Content-Range` header
/// (`0-9/42`, `*/0`). An unknown total (`0-9/*`) yields `None`.
fn parse_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

// --- In-memory implementation ---

/// InMemoryStore
///
/// `DataStore` held in process memory. Used when no hosted backend is
/// configured locally, and by tests. Each collection can be switched into a
/// failing state to simulate an unavailable backend.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<Collection, Vec<Value>>>,
    failing_lists: RwLock<Vec<Collection>>,
    fail_deletes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to `collection`. Records are stored as JSON so the
    /// store stays schema-agnostic like the hosted backend.
    pub async fn insert<T: serde::Serialize>(&self, collection: Collection, record: &T) {
        match serde_json::to_value(record) {
            Ok(value) => self.rows.write().await.entry(collection).or_default().push(value),
            Err(e) => tracing::error!(%collection, "in-memory insert skipped: {}", e),
        }
    }

    pub async fn set_list_failing(&self, collection: Collection, failing: bool) {
        let mut failing_lists = self.failing_lists.write().await;
        failing_lists.retain(|c| *c != collection);
        if failing {
            failing_lists.push(collection);
        }
    }

    pub fn set_delete_failing(&self, failing: bool) {
        self.fail_deletes.store(failing, Ordering::SeqCst);
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.rows.read().await.get(&collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn list(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Page<Value>, StoreError> {
        if self.failing_lists.read().await.contains(&collection) {
            return Err(StoreError::Unavailable(collection));
        }

        let rows = self.rows.read().await;
        let mut matching: Vec<Value> = rows
            .get(&collection)
            .map(|all| {
                all.iter()
                    .filter(|row| match &query.eq {
                        Some((field, value)) => row.get(field).and_then(Value::as_str) == Some(value),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if query.newest_first {
            // RFC 3339 timestamps in one offset sort lexicographically.
            matching.sort_by(|a, b| {
                let created = |row: &Value| row.get("created_at").and_then(Value::as_str).map(str::to_owned);
                created(b).cmp(&created(a))
            });
        }

        let total = matching.len() as u64;
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(Page {
            rows: matching,
            total: Some(total),
        })
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(collection));
        }
        let id = id.to_string();
        if let Some(rows) = self.rows.write().await.get_mut(&collection) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(range: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_RANGE, HeaderValue::from_str(range).unwrap());
        headers
    }

    #[test]
    fn total_is_read_from_content_range() {
        assert_eq!(parse_total(&headers("0-9/42")), Some(42));
        assert_eq!(parse_total(&headers("*/0")), Some(0));
        assert_eq!(parse_total(&headers("0-9/*")), None);
        assert_eq!(parse_total(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn in_memory_list_orders_filters_and_counts() {
        let store = InMemoryStore::new();
        for (i, day) in ["01", "03", "02"].iter().enumerate() {
            store
                .insert(
                    Collection::Stories,
                    &serde_json::json!({
                        "id": Uuid::from_u128(i as u128).to_string(),
                        "title": format!("story {}", i),
                        "created_at": format!("2025-01-{}T00:00:00Z", day),
                    }),
                )
                .await;
        }

        let page = store
            .list(Collection::Stories, &ListQuery::recent(2))
            .await
            .unwrap();
        assert_eq!(page.total, Some(3));
        let titles: Vec<_> = page.rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["story 1", "story 2"]);

        let one = store
            .list(Collection::Stories, &ListQuery::by_id(Uuid::from_u128(2)))
            .await
            .unwrap();
        assert_eq!(one.rows.len(), 1);
        assert_eq!(one.rows[0]["title"], "story 2");
    }

    #[tokio::test]
    async fn in_memory_failures_are_per_collection() {
        let store = InMemoryStore::new();
        store.set_list_failing(Collection::Profiles, true).await;
        assert!(store.list(Collection::Profiles, &ListQuery::default()).await.is_err());
        assert!(store.list(Collection::Stories, &ListQuery::default()).await.is_ok());
    }
}

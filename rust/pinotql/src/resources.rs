//! Schema resources discovered for the current params, and the adapter that fetches them.
//!
//! The fetch side is external: anything implementing [`ResourceAdapter`] can back the
//! editor. Failures never surface to the editor; they collapse to empty lists so defaulting
//! and gating keep working with whatever has arrived.

use crate::{
    params::EditorParams,
    preview::{PreviewContext, PreviewRequest, PreviewResponse},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    future::Future,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

pub const STRING_DATA_TYPE: &str = "STRING";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub data_type: String,
    /// Computed by the backend rather than stored raw.
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default)]
    pub is_time: bool,
    #[serde(default)]
    pub is_metric: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Granularity {
    pub name: String,
    #[serde(default)]
    pub optimized: bool,
    #[serde(default)]
    pub seconds: i64,
}

/// Raw adapter results. `None` marks a list that is still loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLists {
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    #[serde(default)]
    pub granularities: Option<Vec<Granularity>>,
    #[serde(default)]
    pub sql_preview: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFlags {
    pub tables: bool,
    pub columns: bool,
    pub granularities: bool,
    pub sql_preview: bool,
}

/// Read-only view over the resources of one params bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub tables: Vec<String>,
    pub columns: Vec<Column>,
    pub granularities: Vec<Granularity>,
    pub sql_preview: String,
    pub loading: LoadingFlags,
}

impl Resources {
    pub fn from_lists(lists: ResourceLists) -> Self {
        let loading = LoadingFlags {
            tables: lists.tables.is_none(),
            columns: lists.columns.is_none(),
            granularities: lists.granularities.is_none(),
            sql_preview: lists.sql_preview.is_none(),
        };

        Self {
            tables: lists.tables.unwrap_or_default(),
            columns: lists.columns.unwrap_or_default(),
            granularities: lists.granularities.unwrap_or_default(),
            sql_preview: lists.sql_preview.unwrap_or_default(),
            loading,
        }
    }

    /// The table to default to, when the choice is unambiguous.
    pub fn single_table(&self) -> Option<&str> {
        match self.tables.as_slice() {
            [only] if !only.is_empty() => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn time_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|col| col.is_time && !col.is_derived)
            .collect()
    }

    pub fn metric_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|col| col.is_metric && !col.is_time)
            .collect()
    }

    pub fn string_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|col| col.data_type == STRING_DATA_TYPE)
            .collect()
    }

    /// Candidates for filters and group-by.
    pub fn dimension_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|col| !col.is_time).collect()
    }
}

#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    async fn tables(&self) -> anyhow::Result<Vec<String>>;

    async fn columns(&self, table_name: &str) -> anyhow::Result<Vec<Column>>;

    async fn granularities(
        &self,
        table_name: &str,
        time_column: &str,
    ) -> anyhow::Result<Vec<Granularity>>;

    async fn preview(&self, request: &PreviewRequest) -> anyhow::Result<PreviewResponse>;
}

/// Fetches every resource the params currently allow. Pass interpolated params so the
/// preview reflects resolved variables.
pub async fn load_resources<A>(
    adapter: &A,
    params: &EditorParams,
    ctx: &PreviewContext,
) -> Resources
where
    A: ResourceAdapter + ?Sized,
{
    let tables = settle("tables", adapter.tables().await);

    let table_name = params.table_name();
    let columns = if table_name.is_empty() {
        Vec::new()
    } else {
        settle("columns", adapter.columns(table_name).await)
    };

    let granularities = match params {
        EditorParams::TimeSeries(p) if !p.table_name.is_empty() && !p.time_column.is_empty() => {
            settle(
                "granularities",
                adapter.granularities(&p.table_name, &p.time_column).await,
            )
        }
        _ => Vec::new(),
    };

    let sql_preview = match params.preview_request(ctx) {
        Some(request) => settle(
            "sql_preview",
            adapter.preview(&request).await.map(PreviewResponse::into_sql),
        ),
        None => String::new(),
    };

    Resources::from_lists(ResourceLists {
        tables: Some(tables),
        columns: Some(columns),
        granularities: Some(granularities),
        sql_preview: Some(sql_preview),
    })
}

fn settle<T: Default>(resource: &'static str, result: anyhow::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(resource, error = %err, "resource fetch failed, treating as empty");
            T::default()
        }
    }
}

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    payload: String,
    value: Value,
    stored_at: Instant,
}

/// Holds the latest result per resource slot (tables, columns, granularities, preview).
/// A fetch is served from the slot only when its payload matches and the entry is younger
/// than the TTL; any other fetch replaces the slot. Failures are not cached.
pub struct CachedAdapter<A> {
    inner: A,
    ttl: Duration,
    entries: Mutex<HashMap<&'static str, CacheEntry>>,
}

impl<A: ResourceAdapter> CachedAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(inner: A, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn lookup(&self, slot: &str, payload: &str) -> Option<Value> {
        let entries = self.entries.lock();
        let entry = entries.get(slot)?;
        (entry.payload == payload && entry.stored_at.elapsed() < self.ttl)
            .then(|| entry.value.clone())
    }

    async fn cached<P, T, F, Fut>(
        &self,
        slot: &'static str,
        payload: &P,
        fetch: F,
    ) -> anyhow::Result<T>
    where
        P: Serialize + ?Sized + Sync,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let payload = serde_json::to_string(payload)?;
        if let Some(value) = self.lookup(slot, &payload) {
            match serde_json::from_value(value) {
                Ok(parsed) => return Ok(parsed),
                Err(err) => debug!(slot, error = %err, "discarding unreadable cache entry"),
            }
        }

        let fresh = fetch().await?;
        let entry = CacheEntry {
            payload,
            value: serde_json::to_value(&fresh)?,
            stored_at: Instant::now(),
        };
        self.entries.lock().insert(slot, entry);
        Ok(fresh)
    }
}

#[async_trait]
impl<A: ResourceAdapter> ResourceAdapter for CachedAdapter<A> {
    async fn tables(&self) -> anyhow::Result<Vec<String>> {
        self.cached("tables", &(), || self.inner.tables()).await
    }

    async fn columns(&self, table_name: &str) -> anyhow::Result<Vec<Column>> {
        self.cached("columns", table_name, || self.inner.columns(table_name))
            .await
    }

    async fn granularities(
        &self,
        table_name: &str,
        time_column: &str,
    ) -> anyhow::Result<Vec<Granularity>> {
        self.cached("granularities", &(table_name, time_column), || {
            self.inner.granularities(table_name, time_column)
        })
        .await
    }

    async fn preview(&self, request: &PreviewRequest) -> anyhow::Result<PreviewResponse> {
        self.cached("preview", request, || self.inner.preview(request))
            .await
    }
}

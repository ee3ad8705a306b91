//! Request shapes handed to the query endpoint for previews and execution.
//!
//! Builders return `None` whenever a prerequisite is missing; nothing partial goes out.

use crate::{
    model::{
        ComplexField, DimensionFilter, DisplayType, JsonExtractor, OrderByClause, QueryOption,
        RegexpExtractor,
    },
    time::TimeRange,
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;
use tracing::debug;

/// Per-request inputs that do not live in the params bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewContext {
    pub time_range: Option<TimeRange>,
    pub interval_size: Option<Duration>,
    pub max_limit: Option<i64>,
}

impl PreviewContext {
    pub fn new(time_range: Option<TimeRange>) -> Self {
        Self {
            time_range,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_size = Some(interval);
        self
    }

    pub fn with_max_limit(mut self, max_limit: i64) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    /// Zero or negative limits are treated as unset.
    pub fn limit(&self, requested: i64) -> Option<i64> {
        if requested <= 0 {
            return None;
        }
        Some(match self.max_limit {
            Some(max) => requested.min(max.max(1)),
            None => requested,
        })
    }

    pub(crate) fn interval_ms(&self) -> Option<u64> {
        self.interval_size
            .and_then(|interval| u64::try_from(interval.as_millis()).ok())
            .filter(|millis| *millis > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PreviewRequest {
    Builder(BuilderPreviewRequest),
    Logs(LogsPreviewRequest),
    Code(CodePreviewRequest),
    DistinctValues(DistinctValuesPreviewRequest),
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderPreviewRequest {
    pub time_range: TimeRange,
    pub interval_ms: Option<u64>,
    pub table_name: String,
    pub time_column: String,
    pub metric_column: Option<ComplexField>,
    pub aggregation_function: String,
    pub granularity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by_columns: Vec<ComplexField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<DimensionFilter>,
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_options: Vec<QueryOption>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsPreviewRequest {
    pub time_range: TimeRange,
    pub table_name: String,
    pub time_column: String,
    pub log_column: Option<ComplexField>,
    pub log_column_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_columns: Vec<ComplexField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_extractors: Vec<JsonExtractor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regexp_extractors: Vec<RegexpExtractor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<DimensionFilter>,
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_options: Vec<QueryOption>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePreviewRequest {
    pub time_range: Option<TimeRange>,
    pub interval_ms: u64,
    pub table_name: String,
    pub code: String,
    pub display_type: DisplayType,
    pub time_column_alias: Option<String>,
    pub metric_column_alias: Option<String>,
    pub log_column_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_options: Vec<QueryOption>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctValuesPreviewRequest {
    pub table_name: String,
    pub column: ComplexField,
    pub time_column: Option<String>,
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<DimensionFilter>,
}

/// Envelope every preview endpoint answers with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub result: Option<String>,
}

impl PreviewResponse {
    /// A missing result is an empty preview, not an error.
    pub fn into_sql(self) -> String {
        self.result.unwrap_or_default()
    }
}

/// Builds the distinct-values lookup used for variable queries and filter value suggestions.
/// Filters on the looked-up column itself are left out so they do not narrow their own
/// candidates. The time bound is only sent when both a time column and a range are known.
pub fn distinct_values_request(
    table_name: &str,
    column: &ComplexField,
    time_column: &str,
    filters: &[DimensionFilter],
    ctx: &PreviewContext,
) -> Option<PreviewRequest> {
    if table_name.is_empty() || column.is_empty() {
        return None;
    }

    let (time_column, time_range) = match (time_column.is_empty(), ctx.time_range.as_ref()) {
        (false, Some(range)) => (Some(time_column.to_string()), Some(range.clone())),
        _ => (None, None),
    };

    let filters = request_filters(filters)
        .into_iter()
        .filter(|filter| filter.column() != *column)
        .collect();

    Some(PreviewRequest::DistinctValues(DistinctValuesPreviewRequest {
        table_name: table_name.to_string(),
        column: column.clone(),
        time_column,
        time_range,
        filters,
    }))
}

pub(crate) fn request_fields(fields: &[ComplexField]) -> Vec<ComplexField> {
    fields.iter().filter_map(ComplexField::non_empty).collect()
}

/// Keeps filters that name a column and a known operator, cut to their operator's arity.
pub(crate) fn request_filters(filters: &[DimensionFilter]) -> Vec<DimensionFilter> {
    filters
        .iter()
        .filter(|filter| !filter.column().is_empty() && filter.operator().is_some())
        .map(DimensionFilter::normalized)
        .collect()
}

pub(crate) fn request_order_by(clauses: &[OrderByClause]) -> Vec<OrderByClause> {
    clauses
        .iter()
        .filter(|clause| !clause.column().is_empty())
        .cloned()
        .collect()
}

/// Keeps named options. Names outside the known catalog still go out; they are only logged.
pub(crate) fn request_options(options: &[QueryOption]) -> Vec<QueryOption> {
    options
        .iter()
        .filter(|option| option.name.as_deref().is_some_and(|name| !name.is_empty()))
        .inspect(|option| {
            if !option.is_known() {
                debug!(name = ?option.name, "passing custom query option");
            }
        })
        .cloned()
        .collect()
}

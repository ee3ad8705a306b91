//! Aggregated time-series builder.

use super::{
    default_table, non_empty_list, non_empty_string, non_zero, normalized_filters,
};
use crate::{
    model::{
        ComplexField, DimensionFilter, DisplayType, EditorMode, OrderByClause, PersistedQuery,
        QueryOption, AGGREGATION_COUNT, AGGREGATION_SUM,
    },
    preview::{
        request_fields, request_filters, request_options, request_order_by,
        BuilderPreviewRequest, PreviewContext, PreviewRequest,
    },
    resources::Resources,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesBuilderParams {
    pub table_name: String,
    pub time_column: String,
    pub metric_column: ComplexField,
    pub granularity: String,
    pub aggregation_function: String,
    pub limit: i64,
    pub filters: Vec<DimensionFilter>,
    pub group_by_columns: Vec<ComplexField>,
    pub order_by: Vec<OrderByClause>,
    pub query_options: Vec<QueryOption>,
    pub legend: String,
    pub series_limit: i64,
}

pub fn params_from(query: &PersistedQuery) -> TimeSeriesBuilderParams {
    TimeSeriesBuilderParams {
        table_name: query.table_name.clone().unwrap_or_default(),
        time_column: query.time_column.clone().unwrap_or_default(),
        metric_column: metric_column_of(query),
        granularity: query.granularity.clone().unwrap_or_default(),
        aggregation_function: query.aggregation_function.clone().unwrap_or_default(),
        limit: query.limit.unwrap_or_default(),
        filters: query.filters.clone().unwrap_or_default(),
        group_by_columns: group_by_columns_of(query),
        order_by: query.order_by.clone().unwrap_or_default(),
        query_options: query.query_options.clone().unwrap_or_default(),
        legend: query.legend.clone().unwrap_or_default(),
        series_limit: query.series_limit.unwrap_or_default(),
    }
}

/// Prefers the structured field and upgrades the legacy string when only that is present.
fn metric_column_of(query: &PersistedQuery) -> ComplexField {
    if let Some(field) = query.metric_column_v2.as_ref().filter(|f| !f.is_empty()) {
        return field.clone();
    }
    match query.metric_column.as_deref() {
        Some(legacy) if !legacy.is_empty() => ComplexField::named(legacy),
        _ => ComplexField::default(),
    }
}

fn group_by_columns_of(query: &PersistedQuery) -> Vec<ComplexField> {
    if let Some(fields) = &query.group_by_columns_v2 {
        return fields.clone();
    }
    query
        .group_by_columns
        .iter()
        .flatten()
        .filter(|name| !name.is_empty())
        .map(ComplexField::named)
        .collect()
}

pub fn can_run_query(params: &TimeSeriesBuilderParams) -> bool {
    !params.table_name.is_empty()
        && !params.time_column.is_empty()
        && (!params.metric_column.is_empty()
            || params.aggregation_function == AGGREGATION_COUNT)
}

pub fn apply_defaults(params: &mut TimeSeriesBuilderParams, resources: &Resources) -> bool {
    let mut changed = default_table(&mut params.table_name, resources);

    if params.time_column.is_empty() {
        if let Some(column) = resources.time_columns().first() {
            params.time_column = column.name.clone();
            changed = true;
        }
    }

    if params.metric_column.is_empty() && params.aggregation_function != AGGREGATION_COUNT {
        if let Some(column) = resources.metric_columns().first() {
            params.metric_column = ComplexField::from(*column);
            changed = true;
        }
    }

    if params.aggregation_function.is_empty() && !params.metric_column.is_empty() {
        params.aggregation_function = AGGREGATION_SUM.to_string();
        changed = true;
    }

    if changed {
        debug!(
            table = %params.table_name,
            time_column = %params.time_column,
            "applied time-series defaults"
        );
    }
    changed
}

/// Writes the builder fields over `query`, clearing the legacy shapes and every field
/// owned by another mode.
pub fn data_query_of(query: &PersistedQuery, params: &TimeSeriesBuilderParams) -> PersistedQuery {
    PersistedQuery {
        editor_mode: Some(EditorMode::Builder),
        display_type: Some(DisplayType::Timeseries),
        table_name: non_empty_string(&params.table_name),
        time_column: non_empty_string(&params.time_column),
        metric_column: None,
        metric_column_v2: params.metric_column.non_empty(),
        granularity: non_empty_string(&params.granularity),
        aggregation_function: non_empty_string(&params.aggregation_function),
        limit: non_zero(params.limit),
        group_by_columns: None,
        group_by_columns_v2: non_empty_list(&params.group_by_columns),
        order_by: non_empty_list(&params.order_by),
        filters: normalized_filters(&params.filters),
        query_options: non_empty_list(&params.query_options),
        legend: non_empty_string(&params.legend),
        series_limit: non_zero(params.series_limit),
        ..query.host_fields()
    }
}

pub fn preview_request(
    params: &TimeSeriesBuilderParams,
    ctx: &PreviewContext,
) -> Option<PreviewRequest> {
    let time_range = ctx.time_range.clone()?;
    if params.table_name.is_empty()
        || params.time_column.is_empty()
        || params.aggregation_function.is_empty()
    {
        return None;
    }

    let metric_column = params.metric_column.non_empty();
    if metric_column.is_none() && params.aggregation_function != AGGREGATION_COUNT {
        return None;
    }

    Some(PreviewRequest::Builder(BuilderPreviewRequest {
        time_range,
        interval_ms: ctx.interval_ms(),
        table_name: params.table_name.clone(),
        time_column: params.time_column.clone(),
        metric_column,
        aggregation_function: params.aggregation_function.clone(),
        granularity: non_empty_string(&params.granularity),
        group_by_columns: request_fields(&params.group_by_columns),
        order_by: request_order_by(&params.order_by),
        filters: request_filters(&params.filters),
        limit: ctx.limit(params.limit),
        query_options: request_options(&params.query_options),
    }))
}

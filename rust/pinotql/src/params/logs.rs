//! Log-search builder.

use super::{default_table, non_empty_list, non_empty_string, non_zero, normalized_filters};
use crate::{
    model::{
        ComplexField, DimensionFilter, DisplayType, EditorMode, JsonExtractor, PersistedQuery,
        QueryOption, RegexpExtractor,
    },
    preview::{
        request_fields, request_filters, request_options, LogsPreviewRequest, PreviewContext,
        PreviewRequest,
    },
    resources::Resources,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogsBuilderParams {
    pub table_name: String,
    pub time_column: String,
    pub log_column: ComplexField,
    pub log_column_alias: String,
    pub metadata_columns: Vec<ComplexField>,
    pub json_extractors: Vec<JsonExtractor>,
    pub regexp_extractors: Vec<RegexpExtractor>,
    pub filters: Vec<DimensionFilter>,
    pub query_options: Vec<QueryOption>,
    pub limit: i64,
}

pub fn params_from(query: &PersistedQuery) -> LogsBuilderParams {
    LogsBuilderParams {
        table_name: query.table_name.clone().unwrap_or_default(),
        time_column: query.time_column.clone().unwrap_or_default(),
        log_column: query.log_column.clone().unwrap_or_default(),
        log_column_alias: query.log_column_alias.clone().unwrap_or_default(),
        metadata_columns: query.metadata_columns.clone().unwrap_or_default(),
        json_extractors: query.json_extractors.clone().unwrap_or_default(),
        regexp_extractors: query.regexp_extractors.clone().unwrap_or_default(),
        filters: query.filters.clone().unwrap_or_default(),
        query_options: query.query_options.clone().unwrap_or_default(),
        limit: query.limit.unwrap_or_default(),
    }
}

pub fn can_run_query(params: &LogsBuilderParams) -> bool {
    !params.table_name.is_empty()
        && !params.time_column.is_empty()
        && !params.log_column.is_empty()
}

pub fn apply_defaults(params: &mut LogsBuilderParams, resources: &Resources) -> bool {
    let mut changed = default_table(&mut params.table_name, resources);

    if params.time_column.is_empty() {
        if let Some(column) = resources.time_columns().first() {
            params.time_column = column.name.clone();
            changed = true;
        }
    }

    if params.log_column.is_empty() {
        let candidate = resources
            .string_columns()
            .into_iter()
            .find(|column| !column.is_time);
        if let Some(column) = candidate {
            params.log_column = ComplexField::from(column);
            changed = true;
        }
    }

    if changed {
        debug!(
            table = %params.table_name,
            log_column = %params.log_column.label(),
            "applied logs defaults"
        );
    }
    changed
}

pub fn data_query_of(query: &PersistedQuery, params: &LogsBuilderParams) -> PersistedQuery {
    PersistedQuery {
        editor_mode: Some(EditorMode::Builder),
        display_type: Some(DisplayType::Logs),
        table_name: non_empty_string(&params.table_name),
        time_column: non_empty_string(&params.time_column),
        log_column: params.log_column.non_empty(),
        log_column_alias: non_empty_string(&params.log_column_alias),
        metadata_columns: non_empty_list(&params.metadata_columns),
        json_extractors: non_empty_list(&params.json_extractors),
        regexp_extractors: non_empty_list(&params.regexp_extractors),
        filters: normalized_filters(&params.filters),
        query_options: non_empty_list(&params.query_options),
        limit: non_zero(params.limit),
        ..query.host_fields()
    }
}

/// Extractors whose pattern does not compile are left out of the request.
pub fn preview_request(params: &LogsBuilderParams, ctx: &PreviewContext) -> Option<PreviewRequest> {
    let time_range = ctx.time_range.clone()?;
    if params.table_name.is_empty() || params.time_column.is_empty() {
        return None;
    }

    let json_extractors = params
        .json_extractors
        .iter()
        .filter(|extractor| extractor.source.as_ref().is_some_and(|s| !s.is_empty()))
        .cloned()
        .collect();
    let regexp_extractors = params
        .regexp_extractors
        .iter()
        .filter(|extractor| {
            extractor.source.as_ref().is_some_and(|s| !s.is_empty())
                && extractor.has_valid_pattern()
        })
        .cloned()
        .collect();

    Some(PreviewRequest::Logs(LogsPreviewRequest {
        time_range,
        table_name: params.table_name.clone(),
        time_column: params.time_column.clone(),
        log_column: params.log_column.non_empty(),
        log_column_alias: non_empty_string(&params.log_column_alias),
        metadata_columns: request_fields(&params.metadata_columns),
        json_extractors,
        regexp_extractors,
        filters: request_filters(&params.filters),
        limit: ctx.limit(params.limit),
        query_options: request_options(&params.query_options),
    }))
}

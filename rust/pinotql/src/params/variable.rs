//! Dashboard variable queries.

use super::{default_table, non_empty_string};
use crate::{
    codec::complex_field::parse_column_name,
    model::{PersistedQuery, VariableColumnType, VariableType},
    preview::{distinct_values_request, PreviewContext, PreviewRequest},
    resources::Resources,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableParams {
    pub variable_type: VariableType,
    pub table_name: String,
    /// Column label, possibly keyed (`labels['env']`).
    pub column_name: String,
    pub column_type: VariableColumnType,
    pub pinot_ql_code: String,
}

pub fn params_from(query: &PersistedQuery) -> VariableParams {
    VariableParams {
        variable_type: query.variable_type.unwrap_or_default(),
        table_name: query.table_name.clone().unwrap_or_default(),
        column_name: query.column_name.clone().unwrap_or_default(),
        column_type: query.column_type.unwrap_or_default(),
        pinot_ql_code: query.pinot_ql_code.clone().unwrap_or_default(),
    }
}

/// Variable queries always run; the backend answers incomplete ones with an empty list.
pub fn can_run_query(_params: &VariableParams) -> bool {
    true
}

pub fn apply_defaults(params: &mut VariableParams, resources: &Resources) -> bool {
    params.variable_type.needs_table() && default_table(&mut params.table_name, resources)
}

pub fn data_query_of(query: &PersistedQuery, params: &VariableParams) -> PersistedQuery {
    PersistedQuery {
        variable_type: Some(params.variable_type),
        table_name: non_empty_string(&params.table_name),
        column_name: non_empty_string(&params.column_name),
        column_type: Some(params.column_type),
        pinot_ql_code: non_empty_string(&params.pinot_ql_code),
        ..query.host_fields()
    }
}

/// Only distinct-values variables have a preview.
pub fn preview_request(params: &VariableParams, ctx: &PreviewContext) -> Option<PreviewRequest> {
    if params.variable_type != VariableType::DistinctValues {
        return None;
    }
    let column = parse_column_name(Some(params.column_name.as_str()));
    distinct_values_request(&params.table_name, &column, "", &[], ctx)
}

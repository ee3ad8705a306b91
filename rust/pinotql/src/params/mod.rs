//! Per-mode params bags and the dispatch over them.
//!
//! Each mode module exposes the same free functions: `params_from`, `can_run_query`,
//! `apply_defaults`, `data_query_of` and `preview_request`. [`EditorParams`] routes to the
//! right module for callers that only hold a tagged bag.

pub mod code;
pub mod logs;
pub mod time_series;
pub mod variable;

use crate::{
    model::{DimensionFilter, DisplayType, EditorMode, PersistedQuery},
    preview::{PreviewContext, PreviewRequest},
    resources::Resources,
};
use serde::{Deserialize, Serialize};

pub use code::CodeParams;
pub use logs::LogsBuilderParams;
pub use time_series::TimeSeriesBuilderParams;
pub use variable::VariableParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorKind {
    TimeSeries,
    Logs,
    Code,
    Variable,
}

impl EditorKind {
    /// Classifies a persisted query by its discriminator fields.
    pub fn of(query: &PersistedQuery) -> Self {
        if query.variable_type.is_some() {
            EditorKind::Variable
        } else if query.editor_mode == Some(EditorMode::Code) {
            EditorKind::Code
        } else if query.display_type == Some(DisplayType::Logs) {
            EditorKind::Logs
        } else {
            EditorKind::TimeSeries
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "params", rename_all = "camelCase")]
pub enum EditorParams {
    TimeSeries(TimeSeriesBuilderParams),
    Logs(LogsBuilderParams),
    Code(CodeParams),
    Variable(VariableParams),
}

impl EditorParams {
    pub fn from_query(kind: EditorKind, query: &PersistedQuery) -> Self {
        match kind {
            EditorKind::TimeSeries => EditorParams::TimeSeries(time_series::params_from(query)),
            EditorKind::Logs => EditorParams::Logs(logs::params_from(query)),
            EditorKind::Code => EditorParams::Code(code::params_from(query)),
            EditorKind::Variable => EditorParams::Variable(variable::params_from(query)),
        }
    }

    pub fn kind(&self) -> EditorKind {
        match self {
            EditorParams::TimeSeries(_) => EditorKind::TimeSeries,
            EditorParams::Logs(_) => EditorKind::Logs,
            EditorParams::Code(_) => EditorKind::Code,
            EditorParams::Variable(_) => EditorKind::Variable,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            EditorParams::TimeSeries(p) => &p.table_name,
            EditorParams::Logs(p) => &p.table_name,
            EditorParams::Code(p) => &p.table_name,
            EditorParams::Variable(p) => &p.table_name,
        }
    }

    pub fn can_run_query(&self) -> bool {
        match self {
            EditorParams::TimeSeries(p) => time_series::can_run_query(p),
            EditorParams::Logs(p) => logs::can_run_query(p),
            EditorParams::Code(p) => code::can_run_query(p),
            EditorParams::Variable(p) => variable::can_run_query(p),
        }
    }

    pub fn apply_defaults(&mut self, resources: &Resources) -> bool {
        match self {
            EditorParams::TimeSeries(p) => time_series::apply_defaults(p, resources),
            EditorParams::Logs(p) => logs::apply_defaults(p, resources),
            EditorParams::Code(p) => code::apply_defaults(p, resources),
            EditorParams::Variable(p) => variable::apply_defaults(p, resources),
        }
    }

    pub fn data_query_of(&self, query: &PersistedQuery) -> PersistedQuery {
        match self {
            EditorParams::TimeSeries(p) => time_series::data_query_of(query, p),
            EditorParams::Logs(p) => logs::data_query_of(query, p),
            EditorParams::Code(p) => code::data_query_of(query, p),
            EditorParams::Variable(p) => variable::data_query_of(query, p),
        }
    }

    pub fn preview_request(&self, ctx: &PreviewContext) -> Option<PreviewRequest> {
        match self {
            EditorParams::TimeSeries(p) => time_series::preview_request(p, ctx),
            EditorParams::Logs(p) => logs::preview_request(p, ctx),
            EditorParams::Code(p) => code::preview_request(p, ctx),
            EditorParams::Variable(p) => variable::preview_request(p, ctx),
        }
    }
}

pub(crate) fn non_empty_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub(crate) fn non_zero(value: i64) -> Option<i64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn non_empty_list<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

pub(crate) fn normalized_filters(filters: &[DimensionFilter]) -> Option<Vec<DimensionFilter>> {
    non_empty_list(
        &filters
            .iter()
            .map(DimensionFilter::normalized)
            .collect::<Vec<_>>(),
    )
}

/// Fills an empty table name when exactly one table is known.
pub(crate) fn default_table(table_name: &mut String, resources: &Resources) -> bool {
    if !table_name.is_empty() {
        return false;
    }
    match resources.single_table() {
        Some(table) => {
            *table_name = table.to_string();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariableType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn classifies_queries_by_discriminators() {
        let mut query = PersistedQuery::default();
        assert_eq!(EditorKind::of(&query), EditorKind::TimeSeries);

        query.display_type = Some(DisplayType::Logs);
        assert_eq!(EditorKind::of(&query), EditorKind::Logs);

        query.editor_mode = Some(EditorMode::Code);
        assert_eq!(EditorKind::of(&query), EditorKind::Code);

        query.variable_type = Some(VariableType::ColumnList);
        assert_eq!(EditorKind::of(&query), EditorKind::Variable);
    }

    #[test]
    fn dispatch_serializes_the_matching_mode() {
        let params = EditorParams::Code(CodeParams {
            table_name: "t".into(),
            pinot_ql_code: "SELECT 1".into(),
            ..Default::default()
        });

        let query = params.data_query_of(&PersistedQuery::default());
        assert_eq!(EditorKind::of(&query), EditorKind::Code);
        assert_eq!(EditorParams::from_query(params.kind(), &query), params);
        assert!(params.can_run_query());
        assert_eq!(params.table_name(), "t");
    }

    #[test]
    fn tagged_json_form() {
        let params: EditorParams = serde_json::from_value(json!({
            "mode": "timeSeries",
            "params": { "tableName": "t", "timeColumn": "ts" }
        }))
        .unwrap();

        let EditorParams::TimeSeries(inner) = &params else {
            panic!("expected time-series params");
        };
        assert_eq!(inner.table_name, "t");
        assert_eq!(inner.time_column, "ts");
        assert_eq!(inner.limit, 0);
        assert!(inner.filters.is_empty());
    }

    #[test]
    fn serialization_helpers_treat_empty_as_absent() {
        assert_eq!(non_empty_string(""), None);
        assert_eq!(non_zero(0), None);
        assert_eq!(non_zero(-1), Some(-1));
        assert_eq!(non_empty_list::<String>(&[]), None);
        assert_eq!(normalized_filters(&[]), None);
    }
}

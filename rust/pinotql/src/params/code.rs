//! Free-form code editor.
//!
//! The code is opaque text. Only its blankness matters here; macros such as
//! `$__timeFilter` are expanded by the backend.

use super::{default_table, non_empty_list, non_empty_string, non_zero};
use crate::{
    model::{DisplayType, EditorMode, PersistedQuery, QueryOption},
    preview::{request_options, CodePreviewRequest, PreviewContext, PreviewRequest},
    resources::Resources,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const TEMPLATE_LIMIT: i64 = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeParams {
    pub table_name: String,
    pub pinot_ql_code: String,
    pub display_type: DisplayType,
    pub time_column_alias: String,
    pub metric_column_alias: String,
    pub log_column_alias: String,
    pub legend: String,
    pub series_limit: i64,
    pub query_options: Vec<QueryOption>,
}

pub fn params_from(query: &PersistedQuery) -> CodeParams {
    CodeParams {
        table_name: query.table_name.clone().unwrap_or_default(),
        pinot_ql_code: query.pinot_ql_code.clone().unwrap_or_default(),
        display_type: query.display_type.unwrap_or_default(),
        time_column_alias: query.time_column_alias.clone().unwrap_or_default(),
        metric_column_alias: query.metric_column_alias.clone().unwrap_or_default(),
        log_column_alias: query.log_column_alias.clone().unwrap_or_default(),
        legend: query.legend.clone().unwrap_or_default(),
        series_limit: query.series_limit.unwrap_or_default(),
        query_options: query.query_options.clone().unwrap_or_default(),
    }
}

pub fn can_run_query(params: &CodeParams) -> bool {
    !params.table_name.is_empty() && !params.pinot_ql_code.trim().is_empty()
}

pub fn apply_defaults(params: &mut CodeParams, resources: &Resources) -> bool {
    let mut changed = default_table(&mut params.table_name, resources);

    if params.pinot_ql_code.trim().is_empty() {
        if let Some(time_column) = resources.time_columns().first() {
            let metric = resources.metric_columns().first().map(|col| col.name.as_str());
            params.pinot_ql_code = code_template(params.display_type, &time_column.name, metric);
            changed = true;
            debug!(time_column = %time_column.name, "seeded code template");
        }
    }

    changed
}

/// Starter query for an empty editor. Time-series queries bucket by the time column and
/// aggregate the metric, falling back to a row count.
pub fn code_template(display_type: DisplayType, time_column: &str, metric: Option<&str>) -> String {
    match display_type {
        DisplayType::Timeseries => {
            let aggregate = match metric {
                Some(metric) => format!("SUM(\"{metric}\")"),
                None => "COUNT(*)".to_string(),
            };
            format!(
                "SELECT\n    $__timeGroup(\"{time_column}\") AS $__timeAlias(),\n    \
                 {aggregate} AS $__metricAlias()\nFROM $__table()\nWHERE $__timeFilter(\"{time_column}\")\n\
                 GROUP BY $__timeGroup(\"{time_column}\")\nORDER BY $__timeAlias() DESC\nLIMIT {limit}",
                limit = TEMPLATE_LIMIT
            )
        }
        DisplayType::Table | DisplayType::Logs => format!(
            "SELECT *\nFROM $__table()\nWHERE $__timeFilter(\"{time_column}\")\n\
             ORDER BY \"{time_column}\" DESC\nLIMIT {limit}",
            limit = TEMPLATE_LIMIT
        ),
    }
}

pub fn data_query_of(query: &PersistedQuery, params: &CodeParams) -> PersistedQuery {
    PersistedQuery {
        editor_mode: Some(EditorMode::Code),
        display_type: Some(params.display_type),
        table_name: non_empty_string(&params.table_name),
        pinot_ql_code: non_empty_string(&params.pinot_ql_code),
        time_column_alias: non_empty_string(&params.time_column_alias),
        metric_column_alias: non_empty_string(&params.metric_column_alias),
        log_column_alias: non_empty_string(&params.log_column_alias),
        legend: non_empty_string(&params.legend),
        series_limit: non_zero(params.series_limit),
        query_options: non_empty_list(&params.query_options),
        ..query.host_fields()
    }
}

pub fn preview_request(params: &CodeParams, ctx: &PreviewContext) -> Option<PreviewRequest> {
    let interval_ms = ctx.interval_ms()?;
    if !can_run_query(params) {
        return None;
    }

    Some(PreviewRequest::Code(CodePreviewRequest {
        time_range: ctx.time_range.clone(),
        interval_ms,
        table_name: params.table_name.clone(),
        code: params.pinot_ql_code.clone(),
        display_type: params.display_type,
        time_column_alias: non_empty_string(&params.time_column_alias),
        metric_column_alias: non_empty_string(&params.metric_column_alias),
        log_column_alias: non_empty_string(&params.log_column_alias),
        query_options: request_options(&params.query_options),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{fixtures::*, ResourceLists};
    use pretty_assertions::assert_eq;
    use quickcheck::{quickcheck, TestResult};
    use serde_json::json;
    use std::time::Duration;

    fn resources(tables: &[&str], columns: Vec<crate::resources::Column>) -> Resources {
        Resources::from_lists(ResourceLists {
            tables: Some(tables.iter().map(|t| t.to_string()).collect()),
            columns: Some(columns),
            ..Default::default()
        })
    }

    #[test]
    fn params_round_trip_through_query() {
        let p = CodeParams {
            table_name: "t".into(),
            pinot_ql_code: "SELECT * FROM t".into(),
            display_type: DisplayType::Table,
            time_column_alias: "time".into(),
            metric_column_alias: "value".into(),
            log_column_alias: "line".into(),
            legend: "{{host}}".into(),
            series_limit: 5,
            query_options: vec![QueryOption::new("timeoutMs", "100")],
        };
        for p in [p, CodeParams::default()] {
            let query = data_query_of(&PersistedQuery::default(), &p);
            assert_eq!(query.editor_mode, Some(EditorMode::Code));
            assert_eq!(params_from(&query), p);
        }
    }

    #[test]
    fn query_round_trip_preserves_mode_fields() {
        let query: PersistedQuery = serde_json::from_value(json!({
            "refId": "B",
            "hide": true,
            "editorMode": "Code",
            "displayType": "TABLE",
            "tableName": "airlineStats",
            "pinotQlCode": "SELECT * FROM $__table() WHERE $__timeFilter(ts)",
            "timeColumnAlias": "time",
            "metricColumnAlias": "value",
            "logColumnAlias": "line",
            "legend": "{{carrier}}",
            "seriesLimit": 10,
            "queryOptions": [{ "name": "useMultistageEngine", "value": "true" }],
            "datasource": { "uid": "pinot" }
        }))
        .unwrap();

        assert_eq!(data_query_of(&query, &params_from(&query)), query);
    }

    quickcheck! {
        fn generated_params_round_trip(
            table_name: String,
            pinot_ql_code: String,
            display: u8,
            aliases: (String, String, String),
            legend: String,
            series_limit: i64
        ) -> TestResult {
            let display_type = [DisplayType::Timeseries, DisplayType::Table, DisplayType::Logs]
                [usize::from(display % 3)];
            let (time_column_alias, metric_column_alias, log_column_alias) = aliases;
            let p = CodeParams {
                table_name,
                pinot_ql_code,
                display_type,
                time_column_alias,
                metric_column_alias,
                log_column_alias,
                legend,
                series_limit,
                query_options: Vec::new(),
            };

            let query = data_query_of(&PersistedQuery::default(), &p);
            let reread = params_from(&query);
            TestResult::from_bool(reread == p && data_query_of(&query, &reread) == query)
        }
    }

    #[test]
    fn gate_requires_table_and_code_in_any_order() {
        let steps: [fn(&mut CodeParams); 2] = [
            |p| p.table_name = "t".into(),
            |p| p.pinot_ql_code = "SELECT 1".into(),
        ];

        for order in [[0, 1], [1, 0]] {
            let mut p = CodeParams::default();
            for (applied, index) in order.iter().enumerate() {
                assert!(!can_run_query(&p), "ran after {applied} steps of {order:?}");
                steps[*index](&mut p);
            }
            assert!(can_run_query(&p));
        }
    }

    #[test]
    fn gate_rejects_blank_code() {
        let mut p = CodeParams {
            table_name: "t".into(),
            pinot_ql_code: "  \n\t".into(),
            ..Default::default()
        };
        assert!(!can_run_query(&p));
        p.pinot_ql_code = "SELECT 1".into();
        assert!(can_run_query(&p));
        p.table_name.clear();
        assert!(!can_run_query(&p));
    }

    #[test]
    fn template_references_time_and_metric_columns() {
        let res = resources(&["t"], vec![time_column("ts"), metric_column("met")]);
        let mut p = CodeParams::default();

        assert!(apply_defaults(&mut p, &res));
        assert_eq!(p.table_name, "t");
        assert!(p.pinot_ql_code.contains("$__timeGroup(\"ts\")"));
        assert!(p.pinot_ql_code.contains("SUM(\"met\")"));
        assert!(p.pinot_ql_code.ends_with("LIMIT 100000"));
        assert!(can_run_query(&p));
        assert!(!apply_defaults(&mut p, &res));
    }

    #[test]
    fn template_counts_rows_without_metric() {
        let template = code_template(DisplayType::Timeseries, "ts", None);
        assert!(template.contains("COUNT(*) AS $__metricAlias()"));

        let table = code_template(DisplayType::Table, "ts", Some("met"));
        assert!(table.starts_with("SELECT *"));
        assert!(!table.contains("met"));
    }

    #[test]
    fn defaults_leave_written_code_alone() {
        let res = resources(&["t", "u"], vec![time_column("ts")]);
        let mut p = CodeParams {
            pinot_ql_code: "SELECT 1".into(),
            ..Default::default()
        };
        assert!(!apply_defaults(&mut p, &res));
        assert_eq!(p.pinot_ql_code, "SELECT 1");

        let mut empty = CodeParams::default();
        assert!(!apply_defaults(&mut empty, &resources(&[], Vec::new())));
        assert_eq!(empty, CodeParams::default());
    }

    #[test]
    fn preview_needs_interval() {
        let p = CodeParams {
            table_name: "t".into(),
            pinot_ql_code: "SELECT 1".into(),
            ..Default::default()
        };

        assert!(preview_request(&p, &PreviewContext::default()).is_none());
        assert!(
            preview_request(&p, &PreviewContext::default().with_interval(Duration::ZERO))
                .is_none()
        );

        let ctx = PreviewContext::default().with_interval(Duration::from_secs(60));
        let Some(PreviewRequest::Code(request)) = preview_request(&p, &ctx) else {
            panic!("expected code request");
        };
        assert_eq!(request.interval_ms, 60_000);
        assert_eq!(request.time_range, None);
        assert_eq!(request.display_type, DisplayType::Timeseries);
    }
}

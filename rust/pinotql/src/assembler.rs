//! Turns an edited params bag into the query the host stores and, when runnable, the
//! request it executes.

use crate::{
    interpolate::{interpolate_query, VariableResolver},
    model::PersistedQuery,
    params::EditorParams,
    preview::{PreviewContext, PreviewRequest, PreviewResponse},
    resources::{load_resources, ResourceAdapter, Resources},
};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assembled {
    pub query: PersistedQuery,
    pub run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<PreviewRequest>,
}

/// Serializes `params` over `query`, evaluates the run gate and, when the gate passes,
/// builds the execution request from the interpolated params.
pub fn assemble<R>(
    query: &PersistedQuery,
    params: &EditorParams,
    resolver: &R,
    ctx: &PreviewContext,
) -> Assembled
where
    R: VariableResolver + ?Sized,
{
    let query = params.data_query_of(query);
    let run = params.can_run_query();
    let request = if run {
        interpolated_params(&query, params, resolver).preview_request(ctx)
    } else {
        None
    };

    Assembled {
        query,
        run,
        request,
    }
}

/// Params re-read from the interpolated form of their own serialized query.
pub fn interpolated_params<R>(
    query: &PersistedQuery,
    params: &EditorParams,
    resolver: &R,
) -> EditorParams
where
    R: VariableResolver + ?Sized,
{
    let resolved = interpolate_query(&params.data_query_of(query), resolver);
    EditorParams::from_query(params.kind(), &resolved)
}

/// Callbacks into the embedding editor.
pub trait QueryHost {
    fn on_change(&self, query: PersistedQuery);

    fn on_run_query(&self);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub query: PersistedQuery,
    pub run: bool,
    pub sql_preview: String,
}

pub struct QueryAssembler<A> {
    adapter: A,
    ctx: PreviewContext,
}

impl<A: ResourceAdapter> QueryAssembler<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            ctx: PreviewContext::default(),
        }
    }

    pub fn with_context(mut self, ctx: PreviewContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Handles one edit: hands the new query to the host, signals a run when the gate
    /// passes, and fetches the SQL preview. A failed preview is reported as empty.
    pub async fn on_change<H, R>(
        &self,
        host: &H,
        query: &PersistedQuery,
        params: &EditorParams,
        resolver: &R,
    ) -> EditOutcome
    where
        H: QueryHost + ?Sized,
        R: VariableResolver + ?Sized,
    {
        let Assembled {
            query,
            run,
            request,
        } = assemble(query, params, resolver, &self.ctx);

        host.on_change(query.clone());
        if run {
            host.on_run_query();
        }

        let sql_preview = match request {
            Some(request) => match self.adapter.preview(&request).await {
                Ok(response) => PreviewResponse::into_sql(response),
                Err(err) => {
                    warn!(error = %err, "sql preview failed");
                    String::new()
                }
            },
            None => String::new(),
        };

        debug!(kind = ?params.kind(), run, "query edited");
        EditOutcome {
            query,
            run,
            sql_preview,
        }
    }

    /// Loads resources for the interpolated params so lookups see resolved names.
    pub async fn resources<R>(
        &self,
        query: &PersistedQuery,
        params: &EditorParams,
        resolver: &R,
    ) -> Resources
    where
        R: VariableResolver + ?Sized,
    {
        let resolved = interpolated_params(query, params, resolver);
        load_resources(&self.adapter, &resolved, &self.ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interpolate::TemplateVariables,
        model::ComplexField,
        params::{CodeParams, TimeSeriesBuilderParams},
        resources::fixtures::*,
        time::TimeRange,
    };
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHost {
        changes: Mutex<Vec<PersistedQuery>>,
        runs: AtomicUsize,
    }

    impl QueryHost for RecordingHost {
        fn on_change(&self, query: PersistedQuery) {
            self.changes.lock().push(query);
        }

        fn on_run_query(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> PreviewContext {
        PreviewContext::new(Some(TimeRange {
            from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap(),
        }))
    }

    fn variable_params() -> EditorParams {
        EditorParams::TimeSeries(TimeSeriesBuilderParams {
            table_name: "$table".into(),
            time_column: "$timeColumn".into(),
            metric_column: ComplexField::named("met"),
            aggregation_function: "SUM".into(),
            ..Default::default()
        })
    }

    fn variables() -> TemplateVariables {
        TemplateVariables::new()
            .with("table", "airlineStats")
            .with("timeColumn", "ts")
    }

    #[test]
    fn request_is_built_from_interpolated_params() {
        let assembled = assemble(
            &PersistedQuery::default(),
            &variable_params(),
            &variables(),
            &ctx(),
        );

        assert!(assembled.run);
        assert_eq!(assembled.query.time_column.as_deref(), Some("$timeColumn"));
        let Some(PreviewRequest::Builder(request)) = assembled.request else {
            panic!("expected builder request");
        };
        assert_eq!(request.table_name, "airlineStats");
        assert_eq!(request.time_column, "ts");
    }

    #[test]
    fn gated_params_produce_no_request() {
        let params = EditorParams::TimeSeries(TimeSeriesBuilderParams {
            table_name: "t".into(),
            ..Default::default()
        });

        let assembled = assemble(&PersistedQuery::default(), &params, &variables(), &ctx());
        assert!(!assembled.run);
        assert_eq!(assembled.request, None);
        assert_eq!(assembled.query.table_name.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn on_change_notifies_host_and_fetches_preview() {
        let assembler = QueryAssembler::new(StaticAdapter {
            sql: Some("SELECT SUM(met) FROM airlineStats".into()),
            ..Default::default()
        })
        .with_context(ctx());
        let host = RecordingHost::default();

        let outcome = assembler
            .on_change(
                &host,
                &PersistedQuery::default(),
                &variable_params(),
                &variables(),
            )
            .await;

        assert!(outcome.run);
        assert_eq!(outcome.sql_preview, "SELECT SUM(met) FROM airlineStats");
        assert_eq!(host.runs.load(Ordering::SeqCst), 1);
        assert_eq!(host.changes.lock().as_slice(), [outcome.query.clone()]);

        let previews = assembler.adapter().previews.lock();
        let PreviewRequest::Builder(request) = &previews[0] else {
            panic!("expected builder preview");
        };
        assert_eq!(request.table_name, "airlineStats");
    }

    #[tokio::test]
    async fn failed_preview_is_empty_and_gate_still_runs() {
        let assembler = QueryAssembler::new(StaticAdapter {
            fail: true,
            ..Default::default()
        })
        .with_context(ctx());
        let host = RecordingHost::default();

        let outcome = assembler
            .on_change(
                &host,
                &PersistedQuery::default(),
                &variable_params(),
                &variables(),
            )
            .await;

        assert!(outcome.run);
        assert_eq!(outcome.sql_preview, "");
        assert_eq!(host.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn incomplete_code_does_not_run() {
        let assembler = QueryAssembler::new(StaticAdapter::default());
        let host = RecordingHost::default();
        let params = EditorParams::Code(CodeParams {
            table_name: "t".into(),
            ..Default::default()
        });

        let outcome = assembler
            .on_change(&host, &PersistedQuery::default(), &params, &variables())
            .await;

        assert!(!outcome.run);
        assert_eq!(host.runs.load(Ordering::SeqCst), 0);
        assert_eq!(host.changes.lock().len(), 1);
        assert_eq!(assembler.adapter().calls(), 0);
    }

    #[tokio::test]
    async fn resources_use_resolved_table() {
        let assembler = QueryAssembler::new(StaticAdapter {
            tables: vec!["airlineStats".into()],
            columns: vec![time_column("ts")],
            ..Default::default()
        });

        let resources = assembler
            .resources(&PersistedQuery::default(), &variable_params(), &variables())
            .await;

        assert_eq!(resources.tables, vec!["airlineStats"]);
        assert_eq!(resources.columns.len(), 1);
    }
}

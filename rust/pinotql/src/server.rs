use crate::{
    assembler::{assemble, Assembled},
    config::AppConfig,
    error::Result,
    interpolate::{interpolate_query, TemplateVariables},
    model::PersistedQuery,
    params::{EditorKind, EditorParams},
    resources::{ResourceLists, Resources},
    state::AppState,
    time::RawTimeRange,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct ParamsRequest {
    #[serde(default)]
    pub query: PersistedQuery,
    #[serde(default)]
    pub kind: Option<EditorKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsResponse {
    pub kind: EditorKind,
    pub params: EditorParams,
    pub can_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct DefaultsRequest {
    pub params: EditorParams,
    #[serde(default)]
    pub resources: ResourceLists,
}

#[derive(Debug, Serialize)]
pub struct DefaultsResponse {
    pub params: EditorParams,
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[serde(default)]
    pub query: PersistedQuery,
    pub params: EditorParams,
    #[serde(default)]
    pub variables: TemplateVariables,
    #[serde(default)]
    pub time_range: Option<RawTimeRange>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct InterpolateRequest {
    pub query: PersistedQuery,
    #[serde(default)]
    pub variables: TemplateVariables,
}

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState::new(Arc::clone(&config));
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/healthz", get(Self::health))
            .route("/api/params", post(Self::params))
            .route("/api/defaults", post(Self::defaults))
            .route("/api/apply", post(Self::apply))
            .route("/api/interpolate", post(Self::interpolate))
            .with_state(self.state.clone());
        self.with_layers(routes)
    }

    fn with_layers(&self, routes: Router) -> Router {
        routes
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.request_timeout,
            ))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, max_limit = self.config.max_limit, "pinotql listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn params(Json(request): Json<ParamsRequest>) -> Json<ParamsResponse> {
        let kind = request
            .kind
            .unwrap_or_else(|| EditorKind::of(&request.query));
        let params = EditorParams::from_query(kind, &request.query);
        let can_run = params.can_run_query();

        Json(ParamsResponse {
            kind,
            params,
            can_run,
        })
    }

    async fn defaults(Json(request): Json<DefaultsRequest>) -> Json<DefaultsResponse> {
        let resources = Resources::from_lists(request.resources);
        let mut params = request.params;
        let changed = params.apply_defaults(&resources);

        Json(DefaultsResponse { params, changed })
    }

    async fn apply(
        State(state): State<AppState>,
        Json(request): Json<ApplyRequest>,
    ) -> Result<Json<Assembled>> {
        let time_range = request
            .time_range
            .as_ref()
            .map(|raw| raw.resolve(Utc::now()))
            .transpose()?;
        let ctx = state.preview_context(time_range, request.interval_ms);

        let assembled = assemble(&request.query, &request.params, &request.variables, &ctx);
        debug!(
            kind = ?request.params.kind(),
            run = assembled.run,
            "assembled query"
        );
        Ok(Json(assembled))
    }

    async fn interpolate(Json(request): Json<InterpolateRequest>) -> Json<PersistedQuery> {
        Json(interpolate_query(&request.query, &request.variables))
    }
}

use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use pinotql::{config::AppConfig, server::Server};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;

/// Router over the embedded configuration, driven in-process.
pub struct EditorHarness {
    router: Router,
}

impl EditorHarness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::embedded())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            router: Server::new(config).router(),
        }
    }

    pub async fn get(&self, path: &str) -> http::Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("failed to build harness request");
        self.send(request).await
    }

    pub async fn post<T>(&self, path: &str, payload: &T) -> http::Response<Body>
    where
        T: Serialize,
    {
        let body = serde_json::to_vec(payload).expect("request payload should serialize");
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("failed to build harness request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> http::Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should deserialize");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}

//! HTTP server for the knowledge-base service

pub mod routes;
pub mod state;

use axum::{extract::State, http::HeaderValue, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{RagConfig, ServerConfig};
use crate::error::{Error, Result};
use state::AppState;

/// Knowledge-base HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server, building every provider from `config`
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state);

        tracing::info!("Starting knowledge-base server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Full router: health endpoints, API routes and middleware
pub fn build_router(state: AppState) -> Router {
    let server = state.config().server.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/warmup", get(warmup))
        .nest("/api", routes::api_routes(server.max_upload_size))
        .with_state(state)
        // Middleware layers (order matters - applied bottom to top)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&server))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.cors_origins.is_empty() || server.cors_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Exercise the embedding model and the index once
async fn warmup(State(state): State<AppState>) -> Json<Value> {
    let outcome = async {
        state.embedder().embed("warmup").await?;
        state.index().query("warmup", 1).await?;
        Ok::<_, Error>(())
    }
    .await;

    match outcome {
        Ok(()) => Json(json!({ "ok": true })),
        Err(e) => {
            tracing::warn!("Warmup failed: {}", e);
            Json(json!({ "ok": false, "error": e.to_string() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::vector_store::VectorStoreProvider;
    use crate::providers::MemoryVectorStore;
    use crate::testing::{docx_bytes, KeywordEmbedder, ScriptedLlm};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "kbragtestboundary";

    fn test_state(root: &std::path::Path) -> AppState {
        test_state_with(root, |_| {})
    }

    fn test_state_with(root: &std::path::Path, tweak: impl FnOnce(&mut RagConfig)) -> AppState {
        let mut config = RagConfig::default();
        config.ingestion.data_dir = root.join("data");
        config.jobs.jobs_dir = root.join("jobs");
        config.jobs.upload_root = root.join("uploads");
        tweak(&mut config);

        let embedder = Arc::new(KeywordEmbedder);
        let index: Arc<dyn VectorStoreProvider> =
            Arc::new(MemoryVectorStore::in_memory(embedder.clone()));
        let llm = Arc::new(ScriptedLlm::new("Revenue grew.\n- revenue up"));
        AppState::from_parts(config, embedder, index, llm).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(files: &[(&str, Vec<u8>)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/api/ingest/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_warmup() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let (status, body) = send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let (status, body) = send(&router, Request::get("/warmup").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_chat_requires_query() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let (status, body) = send(&router, post_json("/api/chat", json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "bad_request");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nnothing attached\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::post("/api/ingest/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("No files provided"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let uri = format!("/api/ingest/status/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_malformed_job_id_is_404() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let (status, body) = send(
            &router,
            Request::get("/api/ingest/status/not-a-job").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
        assert_eq!(body["error"]["message"], "Job not found: not-a-job");
    }

    #[tokio::test]
    async fn test_upload_then_ask() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let (status, accepted) = send(
            &router,
            multipart(&[(
                "q3.docx",
                docx_bytes(&["Revenue growth reached twelve percent in the third quarter."]),
            )]),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(accepted["status"], "queued");
        let job_id = accepted["job_id"].as_str().unwrap().to_string();

        let mut job = Value::Null;
        for _ in 0..500 {
            let uri = format!("/api/ingest/status/{}", job_id);
            let (status, body) = send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "done" || body["status"] == "error" {
                job = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(job["status"], "done");
        assert_eq!(job["result"]["chunks_added"], 1);

        let (_, sources) = send(&router, Request::get("/api/debug/sources").body(Body::empty()).unwrap()).await;
        assert_eq!(sources, json!({ "total_sources": 1, "sources": ["q3.docx"] }));

        let (status, retrieved) = send(
            &router,
            post_json("/api/debug/retrieve", json!({ "query": "revenue growth", "k": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retrieved["k"], 3);
        assert_eq!(retrieved["results"][0]["source"], "q3.docx");
        assert_eq!(retrieved["results"][0]["page"], 1);

        let (status, answer) = send(&router, post_json("/api/chat", json!({ "query": "Revenue growth?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["answer"], "Revenue grew.\n- revenue up");
        assert_eq!(answer["citations"], json!([{ "source": "q3.docx", "page": 1 }]));

        let (_, jobs) = send(&router, Request::get("/api/jobs").body(Body::empty()).unwrap()).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_413() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state_with(root.path(), |config| {
            config.server.max_upload_size = 1024;
        }));

        let (status, body) = send(&router, multipart(&[("big.docx", vec![b'x'; 4096])])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["type"], "payload_too_large");

        let (_, jobs) = send(&router, Request::get("/api/jobs").body(Body::empty()).unwrap()).await;
        assert_eq!(jobs, json!([]));
    }

    #[tokio::test]
    async fn test_rebuild_without_data_dir() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let (status, body) = send(&router, post_json("/api/ingest/rebuild", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks_added"], 0);
        assert!(body["note"].as_str().unwrap().starts_with("No data dir: "));
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::options("/api/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_origin_list_skips_invalid_entries() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state_with(root.path(), |config| {
            config.server.cors_origins =
                vec!["https://kb.example.com".to_string(), "bad\norigin".to_string()];
        }));

        let response = router.clone().oneshot(preflight("https://kb.example.com")).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://kb.example.com"
        );

        let response = router.oneshot(preflight("https://elsewhere.example.org")).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_cors_defaults_to_any_origin() {
        let root = tempfile::tempdir().unwrap();
        let router = build_router(test_state(root.path()));

        let response = router.oneshot(preflight("https://elsewhere.example.org")).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}

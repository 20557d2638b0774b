//! Web server implementation

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use vizdiff_core::{
    compare_once, BatchManager, CaptureOptions, ChromiumComparator, Config, JobStore, Viewport,
};

use crate::input;

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<AppState>,
}

struct AppState {
    manager: BatchManager,
    config: Config,
}

impl WebServer {
    /// Create a new web server over a fresh job store and Chromium comparator
    pub fn new(config: Config) -> Self {
        let store = Arc::new(JobStore::new(config.max_retained_jobs));
        let comparator = Arc::new(ChromiumComparator::new(config.clone()));
        let manager = BatchManager::new(&config, comparator, store);

        Self {
            state: Arc::new(AppState { manager, config }),
        }
    }

    /// Build the application router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/compare", post(compare_handler))
            .route("/api/batch", post(submit_batch_handler))
            .route("/api/batch/:job_id", get(batch_status_handler))
            .route("/api/batch/:job_id/cancel", post(cancel_batch_handler))
            .nest_service(
                "/artifacts",
                ServeDir::new(&self.state.config.output_dir),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.state.config.output_dir)?;
        info!("vizdiff web console starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

pub async fn serve(addr: SocketAddr, config: Config) -> anyhow::Result<()> {
    let server = WebServer::new(config);
    server.serve(addr).await
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompareRequest {
    url_old: String,
    url_new: String,
    #[serde(default)]
    viewport: Option<String>,
    #[serde(default)]
    hide_selectors: Vec<String>,
    #[serde(default)]
    full_page: bool,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    /// CSV content: header row, then `old_url,new_url` rows
    csv: String,
    #[serde(default)]
    viewport: Option<String>,
    #[serde(default)]
    hide_selectors: Vec<String>,
    #[serde(default)]
    full_page: bool,
}

fn capture_options(
    viewport: Option<&str>,
    hide_selectors: Vec<String>,
    full_page: bool,
) -> Result<CaptureOptions, vizdiff_core::Error> {
    let viewport = match viewport {
        Some(name) => Viewport::by_name(name)?,
        None => Viewport::default(),
    };
    Ok(CaptureOptions {
        viewport,
        hide_selectors,
        full_page,
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "vizdiff-web",
        "version": vizdiff_core::VERSION,
        "jobs": state.manager.job_count(),
    }))
}

async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompareRequest>,
) -> impl IntoResponse {
    let options = match capture_options(req.viewport.as_deref(), req.hide_selectors, req.full_page)
    {
        Ok(options) => options,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("{}", e)})),
            )
                .into_response();
        }
    };

    match compare_once(&state.config, &req.url_old, &req.url_new, &options).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": format!("{}", e)})),
        )
            .into_response(),
    }
}

async fn submit_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> impl IntoResponse {
    let options = match capture_options(req.viewport.as_deref(), req.hide_selectors, req.full_page)
    {
        Ok(options) => options,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("{}", e)})),
            )
                .into_response();
        }
    };

    let pairs = input::parse_url_pairs(&req.csv);
    if pairs.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "no valid URL pairs in CSV"})),
        )
            .into_response();
    }

    let job_id = state.manager.submit(pairs, options);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"job_id": job_id})),
    )
        .into_response()
}

async fn batch_status_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    // A malformed id is just an unknown job to the poller
    let job = Uuid::parse_str(&job_id)
        .ok()
        .and_then(|id| state.manager.query(id));

    match job {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"status": "not_found"})),
        )
            .into_response(),
    }
}

async fn cancel_batch_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let cancelled = Uuid::parse_str(&job_id)
        .map(|id| state.manager.cancel(id))
        .unwrap_or(false);

    if cancelled {
        (StatusCode::OK, Json(serde_json::json!({"cancelled": true}))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"status": "not_found"})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_server() -> WebServer {
        let mut config = Config::default();
        config.output_dir = std::env::temp_dir().join("vizdiff-web-tests");
        WebServer::new(config)
    }

    #[tokio::test]
    async fn health_reports_job_count() {
        let response = test_server()
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["jobs"], 0);
    }

    #[tokio::test]
    async fn unknown_and_malformed_job_ids_are_not_found() {
        let server = test_server();

        let response = server
            .router()
            .oneshot(
                Request::get(format!("/api/batch/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server
            .router()
            .oneshot(
                Request::get("/api/batch/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_csv_is_rejected() {
        let response = test_server()
            .router()
            .oneshot(
                Request::post("/api/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"csv": "old,new\n"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_viewport_is_rejected() {
        let response = test_server()
            .router()
            .oneshot(
                Request::post("/api/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"csv": "old,new\nhttp://a.test/1,http://a.test/2\n", "viewport": "watch"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submitted_batch_is_immediately_queryable() {
        let server = test_server();

        let response = server
            .router()
            .oneshot(
                Request::post("/api/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"csv": "old,new\nhttp://a.test/1,http://a.test/2\n"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let job_id = json["job_id"].as_str().unwrap().to_string();

        let response = server
            .router()
            .oneshot(
                Request::get(format!("/api/batch/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total"], 1);
    }
}

//! Local HTTP endpoint that makes the helper single-instance
//!
//! A resident helper listens on loopback. Later launches forward their deep
//! link here instead of starting a second, competing batch.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::app::{ActivationError, PrintHelper};
use crate::error::PrintError;
use crate::guard::GuardState;
use crate::logging::{self, LogEntry};
use crate::printer::{self, PrinterInfo};
use crate::progress::{ProgressBoard, ProgressSnapshot};

/// Server state
pub struct ServerState {
    pub helper: Arc<PrintHelper>,
    pub board: Arc<ProgressBoard>,
}

/// Response for /ping endpoint
#[derive(Serialize)]
struct PingResponse {
    app: &'static str,
    version: &'static str,
    state: GuardState,
}

#[derive(Serialize, Deserialize)]
pub struct ActivateRequest {
    pub url: String,
}

/// Response for /activate endpoint
#[derive(Serialize, Deserialize)]
pub struct ActivateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct LogsQuery {
    count: Option<usize>,
    level: Option<String>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    // permissive: the service's web pages trigger activations from the browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(handle_ping))
        .route("/printers", get(handle_printers))
        .route("/activate", post(handle_activate))
        .route("/progress", get(handle_progress))
        .route("/logs", get(handle_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and serve until the process exits
pub async fn start_server(state: Arc<ServerState>, port: u16) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    tracing::info!("Starting single-instance server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await
}

async fn handle_ping(State(state): State<Arc<ServerState>>) -> Json<PingResponse> {
    Json(PingResponse {
        app: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        state: state.helper.runner().guard().state(),
    })
}

async fn handle_printers() -> (StatusCode, Json<serde_json::Value>) {
    printers_response(printer::list_printers().await)
}

fn printers_response(
    listed: Result<Vec<PrinterInfo>, PrintError>,
) -> (StatusCode, Json<serde_json::Value>) {
    match listed {
        Ok(printers) => (StatusCode::OK, Json(json!({ "printers": printers }))),
        Err(e) => {
            tracing::error!("Failed to list printers: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "printers": [], "error": e.to_string() })),
            )
        }
    }
}

async fn handle_activate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ActivateRequest>,
) -> (StatusCode, Json<ActivateResponse>) {
    match state.helper.start_activation(&request.url) {
        Ok(_handle) => (
            StatusCode::ACCEPTED,
            Json(ActivateResponse { success: true, error: None }),
        ),
        Err(e) => {
            let status = match e {
                ActivationError::Decode(_) => StatusCode::BAD_REQUEST,
                ActivationError::Busy(_) => StatusCode::CONFLICT,
            };
            (
                status,
                Json(ActivateResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn handle_progress(State(state): State<Arc<ServerState>>) -> Json<ProgressSnapshot> {
    Json(state.board.snapshot())
}

async fn handle_logs(Query(query): Query<LogsQuery>) -> Json<Vec<LogEntry>> {
    Json(logging::recent_logs(query.count, query.level.as_deref()))
}

/// What a resident helper said about a forwarded activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Accepted,
    Busy(String),
    Rejected(String),
}

/// Hand an activation to a resident helper. A connection error means no
/// helper is running.
pub async fn forward_activation(
    port: u16,
    url: &str,
    timeout: Duration,
) -> Result<ForwardOutcome, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .post(format!("http://127.0.0.1:{}/activate", port))
        .json(&ActivateRequest { url: url.to_string() })
        .send()
        .await?;

    let status = response.status();
    let body: ActivateResponse = response.json().await?;
    let message = body.error.unwrap_or_default();

    Ok(match status {
        StatusCode::ACCEPTED | StatusCode::OK => ForwardOutcome::Accepted,
        StatusCode::CONFLICT => ForwardOutcome::Busy(message),
        _ => ForwardOutcome::Rejected(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_listing_failure_is_a_server_error() {
        let err = PrintError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "lpstat"));
        let (status, Json(body)) = printers_response(Err(err));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["printers"], json!([]));
        assert!(body["error"].as_str().unwrap().contains("lpstat"));
    }

    #[test]
    fn listed_printers_are_returned() {
        let printers = vec![PrinterInfo {
            name: "Office".into(),
            is_default: true,
            status: "ready".into(),
        }];
        let (status, Json(body)) = printers_response(Ok(printers));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "printers": [{ "name": "Office", "isDefault": true, "status": "ready" }] })
        );
    }
}

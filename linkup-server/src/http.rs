//! Linkup HTTP REST API
//!
//! Axum-based HTTP server exposing the connection and mailbox operations.
//! Runs alongside the Unix socket IPC server on port 8767 (configurable).
//!
//! Each endpoint has a thin axum handler that builds a `LinkupRequest` and
//! delegates to the same router the IPC server uses, so both transports share
//! one code path. Error codes map to HTTP statuses in `status_for_code`.
//!
//! Endpoints:
//! - GET    /health                              - health check with backend status
//! - GET    /version                             - server version info
//! - POST   /connections                         - request a connection
//! - GET    /connections/:edge_id                - inspect an edge
//! - POST   /connections/:edge_id/respond        - accept or reject
//! - GET    /members/:member_id/connections      - accepted connections
//! - GET    /members/:member_id/pending          - pending incoming requests
//! - GET    /members/:member_id/eligibility/:target - dry-run eligibility
//! - POST   /messages                            - send a message
//! - GET    /members/:member_id/inbox            - inbox (?include_deleted=true)
//! - DELETE /messages/:message_id?actor=…        - soft-delete a message

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use linkup_core::ipc::{LinkupRequest, LinkupResponse};
use linkup_core::{Decision, LinkupConfig, Network};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub network: Network,
    pub config: LinkupConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/connections", post(request_connection_handler))
        .route("/connections/:edge_id", get(get_connection_handler))
        .route("/connections/:edge_id/respond", post(respond_connection_handler))
        .route("/members/:member_id/connections", get(list_connections_handler))
        .route("/members/:member_id/pending", get(list_pending_handler))
        .route(
            "/members/:member_id/eligibility/:target",
            get(eligibility_handler),
        )
        .route("/members/:member_id/inbox", get(list_inbox_handler))
        .route("/messages", post(send_message_handler))
        .route("/messages/:message_id", delete(delete_message_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    network: Network,
    config: LinkupConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { network, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Linkup HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConnectionRequestBody {
    pub requester: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub actor: String,
    pub decision: Decision,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub sender: String,
    pub receiver: String,
    pub body: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct InboxQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor: String,
}

// ============================================================================
// Dispatch
// ============================================================================

/// HTTP status for a `DomainError` wire code.
pub fn status_for_code(code: Option<&str>) -> StatusCode {
    match code {
        Some("self_request") | Some("empty_body") => StatusCode::BAD_REQUEST,
        Some("unreachable") | Some("unauthorized") => StatusCode::FORBIDDEN,
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("already_connected") | Some("invalid_transition") => StatusCode::CONFLICT,
        Some("store_unavailable") => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a router response into `(status, body)`.
pub fn response_to_http(response: LinkupResponse, success: StatusCode) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        (success, response.data.unwrap_or(serde_json::json!({})))
    } else {
        let status = status_for_code(response.code.as_deref());
        (
            status,
            serde_json::json!({
                "status": "error",
                "error": response.error.unwrap_or_else(|| "unknown error".to_string()),
                "code": response.code,
            }),
        )
    }
}

/// Route a request through the shared router and shape the HTTP reply.
pub async fn dispatch_inner(
    network: &Network,
    request: LinkupRequest,
    success: StatusCode,
) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(request, network).await;
    response_to_http(response, success)
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "linkup/1",
    })
}

/// Inner health check - reports the storage backend and socket path.
pub async fn health_inner(network: &Network, socket_path: &str) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(LinkupRequest::Health, network).await;
    let (status, mut body) = response_to_http(response, StatusCode::OK);
    if status != StatusCode::OK {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": body["error"],
            }),
        );
    }

    body["version"] = serde_json::json!(env!("CARGO_PKG_VERSION"));
    body["socket"] = serde_json::json!(socket_path);
    (StatusCode::OK, body)
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.network, &state.config.service.socket_path).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn request_connection_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ConnectionRequestBody>,
) -> impl IntoResponse {
    let request = LinkupRequest::RequestConnection {
        requester: req.requester,
        target: req.target,
    };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::CREATED).await;
    (status, Json(body))
}

pub async fn get_connection_handler(
    State(state): State<Arc<HttpState>>,
    Path(edge_id): Path<Uuid>,
) -> impl IntoResponse {
    let request = LinkupRequest::GetConnection { edge_id };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn respond_connection_handler(
    State(state): State<Arc<HttpState>>,
    Path(edge_id): Path<Uuid>,
    Json(req): Json<RespondBody>,
) -> impl IntoResponse {
    let request = LinkupRequest::RespondConnection {
        edge_id,
        actor: req.actor,
        decision: req.decision,
    };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn list_connections_handler(
    State(state): State<Arc<HttpState>>,
    Path(member_id): Path<String>,
) -> impl IntoResponse {
    let request = LinkupRequest::ListConnections { member_id };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn list_pending_handler(
    State(state): State<Arc<HttpState>>,
    Path(member_id): Path<String>,
) -> impl IntoResponse {
    let request = LinkupRequest::ListPendingIncoming { member_id };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn eligibility_handler(
    State(state): State<Arc<HttpState>>,
    Path((requester, target)): Path<(String, String)>,
) -> impl IntoResponse {
    let request = LinkupRequest::CheckEligibility { requester, target };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn list_inbox_handler(
    State(state): State<Arc<HttpState>>,
    Path(receiver): Path<String>,
    Query(query): Query<InboxQuery>,
) -> impl IntoResponse {
    let request = LinkupRequest::ListInbox {
        receiver,
        include_deleted: query.include_deleted,
    };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

pub async fn send_message_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SendMessageBody>,
) -> impl IntoResponse {
    let request = LinkupRequest::SendMessage {
        sender: req.sender,
        receiver: req.receiver,
        body: req.body,
    };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::CREATED).await;
    (status, Json(body))
}

pub async fn delete_message_handler(
    State(state): State<Arc<HttpState>>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> impl IntoResponse {
    let request = LinkupRequest::DeleteMessage {
        message_id,
        actor: query.actor,
    };
    let (status, body) = dispatch_inner(&state.network, request, StatusCode::OK).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use linkup_core::config::ReachabilityConfig;

    fn network() -> Network {
        Network::in_memory(ReachabilityConfig::default())
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "linkup/1");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for_code(Some("self_request")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code(Some("empty_body")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code(Some("unreachable")), StatusCode::FORBIDDEN);
        assert_eq!(status_for_code(Some("unauthorized")), StatusCode::FORBIDDEN);
        assert_eq!(status_for_code(Some("not_found")), StatusCode::NOT_FOUND);
        assert_eq!(status_for_code(Some("already_connected")), StatusCode::CONFLICT);
        assert_eq!(status_for_code(Some("invalid_transition")), StatusCode::CONFLICT);
        assert_eq!(
            status_for_code(Some("store_unavailable")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for_code(None), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_to_http_ok_no_data() {
        let mut resp = LinkupResponse::ok(serde_json::json!({}));
        resp.data = None;
        let (status, body) = response_to_http(resp, StatusCode::OK);
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_object());
    }

    #[test]
    fn test_response_to_http_error_no_message() {
        let mut resp = LinkupResponse::err("x");
        resp.error = None;
        let (status, body) = response_to_http(resp, StatusCode::OK);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unknown error");
    }

    #[tokio::test]
    async fn test_health_inner_memory_backend() {
        let (status, body) = health_inner(&network(), "/tmp/linkup.sock").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["socket"], "/tmp/linkup.sock");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_duplicate_request_is_conflict() {
        let net = network();
        let req = || LinkupRequest::RequestConnection {
            requester: "alice".into(),
            target: "bob".into(),
        };

        let (status, body) = dispatch_inner(&net, req(), StatusCode::CREATED).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["edge_id"].is_string());

        let (status, body) = dispatch_inner(&net, req(), StatusCode::CREATED).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_connected");
    }
}

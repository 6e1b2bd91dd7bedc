//! HTTP surface for UI clients (popup, side panel, dashboards).
//!
//! `POST /api/message` carries the raw bus protocol; the typed routes are
//! conveniences over the same dispatch table.

use crate::error::EngineError;
use crate::router::{Request, RequestRouter};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

struct ApiState {
    router: RequestRouter,
}

pub async fn start_api_server(router: RequestRouter, host: &str, port: u16) {
    let state = Arc::new(ApiState { router });

    let app = Router::new()
        .route("/api/message", post(post_message))
        .route("/api/stats", get(get_stats))
        .route("/api/toggle", post(toggle_mode))
        .route("/api/reset", post(reset_stats))
        .with_state(state);

    let addr = format!("{host}:{port}");
    tracing::info!("API Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn post_message(
    State(state): State<Arc<ApiState>>,
    Json(message): Json<Value>,
) -> impl IntoResponse {
    match state.router.dispatch(&message).await {
        Some(Ok(response)) => Json(response.into_json()).into_response(),
        Some(Err(e)) => error_response(e),
        // Not a recognized request kind: the bus sends no response.
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    answer(state.router.handle(Request::GetStats).await)
}

async fn toggle_mode(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    answer(state.router.handle(Request::ToggleMode).await)
}

async fn reset_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    answer(state.router.handle(Request::ResetStats).await)
}

fn answer(result: Result<crate::router::Response, EngineError>) -> axum::response::Response {
    match result {
        Ok(response) => Json(response.into_json()).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: EngineError) -> axum::response::Response {
    tracing::error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

use std::path::PathBuf;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dashboard_common::DashboardView;
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::host::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(app: AppState, web_root: PathBuf) -> Router {
    Router::new()
        .route("/api/view", get(handle_get_view))
        .route("/api/state", get(handle_get_state))
        .route("/api/led/toggle", post(handle_toggle_led))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app)
}

async fn handle_get_view(State(app): State<AppState>) -> impl IntoResponse {
    Json(DashboardView::from_state(&app.store.snapshot()))
}

async fn handle_get_state(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.store.snapshot())
}

/// Accepted, not applied: the view changes once the write echoes back.
async fn handle_toggle_led(State(app): State<AppState>) -> axum::response::Response {
    if !app.toggle_led() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable");
    }
    (
        StatusCode::ACCEPTED,
        Json(DashboardView::from_state(&app.store.snapshot())),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

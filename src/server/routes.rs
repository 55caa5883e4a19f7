use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::AuthError;
use crate::server::server::AppState;

pub const STATUS_PATH: &str = "/status";
pub const AUTHORIZE_PATH: &str = "/authorize";

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub code: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(STATUS_PATH, get(get_status))
        .route(AUTHORIZE_PATH, post(post_authorize))
}

async fn get_status(State(state): State<AppState>) -> Response {
    Json(state.manager.get_status().await).into_response()
}

/// Completes a consent grant: the caller obtained `code` from the provider's
/// redirect. Responds with the new status, never with token values.
///
/// There is no authentication on this route. The server binds to loopback by
/// default and must stay reachable only from the local host.
async fn post_authorize(State(state): State<AppState>, Json(request): Json<AuthorizeRequest>) -> Response {
    if request.code.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "code must not be empty"}))).into_response();
    }
    info!("authorization code received over http");

    match state.manager.authorize(request.code.trim()).await {
        Ok(_) => Json(state.manager.get_status().await).into_response(),
        Err(err) => {
            let status = match err {
                AuthError::InvalidGrant(_) | AuthError::Rejected { .. } => StatusCode::BAD_REQUEST,
                AuthError::Transient(_) | AuthError::Malformed(_) => StatusCode::BAD_GATEWAY,
            };
            (status, Json(json!({"error": err.reason(), "message": err.to_string()}))).into_response()
        }
    }
}

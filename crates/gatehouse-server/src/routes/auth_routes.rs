//! Login and logout.

use crate::api::{ApiError, ApiResult, success, success_with};
use crate::auth::AuthContext;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `POST /login` — verify credentials and issue a session token.
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let credentials = &state.auth.credentials;
    if request.username != credentials.username()
        || !credentials.verify_password(&request.password)
    {
        warn!(username = %request.username, "login rejected");
        return Err(ApiError {
            status: axum::http::StatusCode::UNAUTHORIZED,
            message: "Invalid credentials".to_string(),
        });
    }

    let token = state.auth.sessions.issue(&request.username);
    info!(username = %request.username, "session issued");
    Ok(success_with(json!({"token": token})))
}

/// `POST /logout` — revoke the presented session token.
pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    if let Some(token) = AuthContext::bearer_token(&headers) {
        state.auth.sessions.revoke(&token);
    }
    Ok(success())
}

//! User enrollment, blocklist and privacy routes.

use crate::api::{ApiError, ApiResult, success, success_with};
use crate::routes::body_str;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use gatehouse_core::{CardNumber, User};
use serde_json::{Value, json};
use tracing::warn;

fn card_from(body: &Value) -> ApiResult<CardNumber> {
    let raw = body_str(body, "card_number")
        .ok_or_else(|| ApiError::bad_request("card_number required"))?;
    CardNumber::new(&raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// `GET /get_users` — all users with blocklist membership, sorted by
/// name.
pub(crate) async fn get_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    Ok(success_with(json!({"users": state.users.list()})))
}

/// `POST /add_user` — enroll a card holder; a duplicate card replaces
/// the existing entry.
pub(crate) async fn add_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;

    let card = card_from(&body)?;
    let id = body_str(&body, "id").unwrap_or_default();
    let name = body_str(&body, "name").unwrap_or_default();
    if id.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request("card_number,id,name required"));
    }

    state.users.add(User {
        id,
        name,
        card_number: card,
        ref_id: body_str(&body, "ref_id").unwrap_or_default(),
        privacy_protected: false,
    })?;
    Ok(success())
}

/// `POST /delete_user`
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;
    let card = card_from(&body)?;
    state.users.delete(&card)?;
    Ok(success())
}

/// `POST /block_user` — works for cards with no user record too.
pub(crate) async fn block_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;
    let card = card_from(&body)?;
    state.users.set_blocked(&card, true)?;
    Ok(success())
}

/// `POST /unblock_user`
pub(crate) async fn unblock_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;
    let card = card_from(&body)?;
    state.users.set_blocked(&card, false)?;
    Ok(success())
}

/// `POST /toggle_privacy` — requires the admin password in the body on
/// top of normal authentication; this flag suppresses audit records.
pub(crate) async fn toggle_privacy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;

    let card = card_from(&body)?;
    let password = body_str(&body, "password").unwrap_or_default();
    let enable = body
        .get("enable")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    if !state.auth.credentials.verify_password(&password) {
        warn!(%card, "privacy toggle rejected: password re-verification failed");
        return Err(ApiError::unauthorized());
    }

    let user = state.users.set_privacy(&card, enable)?;
    let action = if enable { "enabled" } else { "disabled" };
    Ok(success_with(json!({
        "message": format!("Privacy protection {action} for {}", user.name),
    })))
}

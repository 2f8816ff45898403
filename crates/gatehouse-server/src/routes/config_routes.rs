//! Configuration snapshot, hot-reload and runtime security settings.

use crate::api::{ApiError, ApiResult, success_with};
use crate::routes::body_str;
use crate::state::{AppState, DecoderReload, decoder_config};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use gatehouse_storage::RuntimeConfig;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, warn};

/// How long `/update_config` waits for the decoder supervisor before
/// reporting the restart as failed.
const RELOAD_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// `GET /get_config`
pub(crate) async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    Ok(success_with(json!({"config": state.config.get()})))
}

/// `POST /update_config` — validate, persist, and restart the decoders
/// when the Wiegand widths or timeout changed.
///
/// A failed restart does not roll the persisted config back: the
/// response downgrades to `"status":"warning"` and the system continues
/// with best-effort reinitialization.
pub(crate) async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;

    let new: RuntimeConfig = serde_json::from_value(
        body.get("config")
            .cloned()
            .ok_or_else(|| ApiError::bad_request("config object required"))?,
    )
    .map_err(|e| ApiError::bad_request(format!("invalid config: {e}")))?;

    // Serialize validate + persist + decoder restart.
    let _write_guard = state.config_write_lock.lock().await;

    let previous = state.config.update(new.clone())?;
    if !previous.requires_decoder_restart(&new) {
        return Ok(success_with(json!({"message": "Configuration updated"})));
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    let request = DecoderReload {
        config: decoder_config(&new),
        reply: reply_tx,
    };

    let restart_error: Option<String> = if state.reload_tx.send(request).await.is_err() {
        error!("decoder supervisor unavailable");
        Some("decoder supervisor unavailable".to_string())
    } else {
        match tokio::time::timeout(RELOAD_REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(message))) => Some(message),
            Ok(Err(_)) => Some("decoder supervisor dropped the request".to_string()),
            Err(_) => Some("decoder restart timed out".to_string()),
        }
    };

    match restart_error {
        None => Ok(success_with(json!({
            "message": "Configuration updated and readers reinitialized",
        }))),
        Some(message) => {
            warn!(%message, "config persisted but decoder restart failed");
            Ok(Json(json!({
                "status": "warning",
                "message": format!("Config saved but reader reinit failed: {message}"),
            })))
        }
    }
}

/// `POST /update_security` — runtime change of the admin password
/// and/or the legacy API key. Not persisted; the environment remains
/// the durable source across restarts.
pub(crate) async fn update_security(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let username = state.auth.require_write(&headers)?;

    let mut changed = false;
    if let Some(new_password) = body_str(&body, "new_password").filter(|p| !p.is_empty()) {
        state.auth.credentials.set_password(&new_password)?;
        warn!(%username, "admin password changed");
        changed = true;
    }
    if let Some(new_api_key) = body_str(&body, "new_api_key").filter(|k| !k.is_empty()) {
        state.auth.credentials.set_api_key(&new_api_key)?;
        warn!(%username, "API key changed");
        changed = true;
    }

    if !changed {
        return Err(ApiError::bad_request(
            "new_password or new_api_key required",
        ));
    }
    Ok(success_with(json!({
        "message": "Security settings updated. Please update your saved credentials!",
    })))
}

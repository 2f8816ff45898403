//! Manual relay control.

use crate::api::{ApiError, ApiResult, success_with};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use gatehouse_core::constants::DEFAULT_PULSE_SECS;
use gatehouse_hardware::RelayAction;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct RelayRequest {
    relay: Option<u64>,
    action: Option<RelayAction>,
}

/// `POST /relay` — `{"relay": 1..N, "action": "pulse" | "open_hold" |
/// "close_hold" | "normal"}`.
pub(crate) async fn relay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> ApiResult<Json<Value>> {
    let username = state.auth.require_write(&headers)?;

    let relay_number = request.relay.unwrap_or(1);
    let count = state.relays.len().await as u64;
    if !(1..=count).contains(&relay_number) {
        return Err(ApiError::bad_request(format!(
            "relay must be 1-{count}, got {relay_number}"
        )));
    }
    let action = request
        .action
        .ok_or_else(|| ApiError::bad_request("action required"))?;

    let index = (relay_number - 1) as usize;
    let pulse = Duration::from_secs_f64(DEFAULT_PULSE_SECS);
    state
        .relays
        .apply(index, action, pulse)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let action_name = match action {
        RelayAction::Pulse => "pulse",
        RelayAction::OpenHold => "open_hold",
        RelayAction::CloseHold => "close_hold",
        RelayAction::Normal => "normal",
    };
    info!(%username, relay = relay_number, action = action_name, "manual relay command");
    Ok(success_with(json!({
        "message": format!("relay {relay_number}:{action_name}"),
    })))
}

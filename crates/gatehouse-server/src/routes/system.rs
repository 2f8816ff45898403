//! System status, health and time control.

use crate::api::{ApiError, ApiResult, success_with};
use crate::state::AppState;
use crate::sysinfo;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::Ordering;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// `GET /status` — public component and storage overview.
pub(crate) async fn status(State(state): State<AppState>) -> Json<Value> {
    let decoders_ok = state.decoders_ok.load(Ordering::SeqCst);
    let tx_gb = state.txlog.size_bytes() as f64 / BYTES_PER_GB;

    Json(json!({
        "system": "online",
        "timestamp": Utc::now().to_rfc3339(),
        "components": {
            "remote": state.remote_attached,
            "rfid_readers": decoders_ok,
            "internet": state.probe.is_reachable().await,
        },
        "storage": {
            "tx_dir_gb": (tx_gb * 1000.0).round() / 1000.0,
            "cap_gb": state.storage_cap_bytes as f64 / BYTES_PER_GB,
            "cleanup_fraction": state.cleanup_fraction,
        },
        "files": {
            "users": state.users.users_file_exists(),
            "blocked": state.users.blocked_file_exists(),
            "daily_stats": state.stats.file_exists(),
        },
        "temperature": {
            "cpu_celsius": sysinfo::cpu_temperature(),
        },
    }))
}

/// `GET /health` — liveness booleans.
pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "internet": state.probe.is_reachable().await,
        "remote": state.remote_attached,
        "decoders": state.decoders_ok.load(Ordering::SeqCst),
    }))
}

/// `GET /get_system_time`
pub(crate) async fn get_system_time(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    let now = Local::now();
    Ok(success_with(json!({
        "system_time": now.to_rfc3339(),
        "timestamp": now.timestamp(),
        "timezone": now.format("%Z %z").to_string(),
        "formatted": now.format("%Y-%m-%d %H:%M:%S").to_string(),
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetTimeRequest {
    timestamp: Option<i64>,
}

/// `POST /set_system_time` — set the OS clock from a unix timestamp.
pub(crate) async fn set_system_time(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SetTimeRequest>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;

    let timestamp = request
        .timestamp
        .ok_or_else(|| ApiError::bad_request("Timestamp required"))?;
    let new_time = sysinfo::set_system_time(timestamp).await?;

    Ok(success_with(json!({
        "message": format!("System time set to {}", new_time.format("%Y-%m-%d %H:%M:%S")),
        "new_time": new_time.to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NtpRequest {
    enable: Option<bool>,
}

/// `POST /enable_ntp` — toggle NTP synchronization.
pub(crate) async fn enable_ntp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NtpRequest>,
) -> ApiResult<Json<Value>> {
    state.auth.require_write(&headers)?;

    let enable = request.enable.unwrap_or(true);
    sysinfo::set_ntp(enable).await?;

    let action = if enable { "enabled" } else { "disabled" };
    Ok(success_with(json!({
        "message": format!("NTP time synchronization {action}"),
    })))
}

//! Route table for the control plane.
//!
//! Public: `/status`, `/health`, `POST /login`. Everything else requires
//! a session token or (when enabled) HTTP Basic; mutating routes
//! additionally honor the legacy API-key check when one is configured.

mod auth_routes;
mod config_routes;
mod relay_routes;
mod system;
mod transactions;
mod users;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};

/// Build the full router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/status", get(system::status))
        .route("/health", get(system::health))
        .route("/login", post(auth_routes::login))
        // Session management
        .route("/logout", post(auth_routes::logout))
        // Users and blocklist
        .route("/get_users", get(users::get_users))
        .route("/add_user", post(users::add_user))
        .route("/delete_user", post(users::delete_user))
        .route("/block_user", post(users::block_user))
        .route("/unblock_user", post(users::unblock_user))
        .route("/toggle_privacy", post(users::toggle_privacy))
        // Transactions and analytics
        .route("/get_transactions", get(transactions::get_transactions))
        .route("/get_today_stats", get(transactions::get_today_stats))
        .route("/get_analytics", get(transactions::get_analytics))
        .route("/get_user_report", get(transactions::get_user_report))
        .route(
            "/download_transactions_csv",
            get(transactions::download_transactions_csv),
        )
        // Relays
        .route("/relay", post(relay_routes::relay))
        // Configuration and security
        .route("/get_config", get(config_routes::get_config))
        .route("/update_config", post(config_routes::update_config))
        .route("/update_security", post(config_routes::update_security))
        // System time
        .route("/get_system_time", get(system::get_system_time))
        .route("/set_system_time", post(system::set_system_time))
        .route("/enable_ntp", post(system::enable_ntp))
        .with_state(state)
}

/// Pull a string field out of a JSON body, accepting numbers too (the
/// dashboard sends card numbers both ways).
pub(crate) fn body_str(body: &serde_json::Value, key: &str) -> Option<String> {
    match body.get(key) {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

//! Transaction reads, today's stats, analytics and CSV export.

use crate::analytics::{compute_analytics, compute_user_report};
use crate::api::{ApiError, ApiResult, success_with};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use gatehouse_core::CardNumber;
use gatehouse_core::constants::{
    ANALYTICS_MAX_DAYS, ANALYTICS_SCAN_CAP, ANALYTICS_TX_PER_DAY_ESTIMATE, REPORT_SCAN_CAP,
    REPORT_TX_PER_DAY_ESTIMATE,
};
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_TX_LIMIT: usize = 50;
const MAX_TX_LIMIT: usize = 1000;
const DEFAULT_CSV_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyticsQuery {
    days: Option<u32>,
    card: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportQuery {
    card: Option<String>,
    days: Option<u32>,
}

/// `GET /get_transactions?limit=N` — newest first from the local log.
pub(crate) async fn get_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_TX_LIMIT).min(MAX_TX_LIMIT);
    let transactions = state.txlog.recent(limit);
    Ok(success_with(json!({"transactions": transactions})))
}

/// `GET /get_today_stats` — today's counters from the daily stats cache.
pub(crate) async fn get_today_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;
    let today = state.stats.for_day(Utc::now().timestamp());
    Ok(success_with(serde_json::to_value(today).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}

/// `GET /get_analytics?days=N&card=C` — aggregates over the last N days.
pub(crate) async fn get_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;

    let days = query.days.unwrap_or(7).clamp(1, ANALYTICS_MAX_DAYS);
    let card_filter = match query.card.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => {
            Some(CardNumber::new(raw).map_err(|e| ApiError::bad_request(e.to_string()))?)
        }
        None => None,
    };

    let scan_limit = (days as usize * ANALYTICS_TX_PER_DAY_ESTIMATE).min(ANALYTICS_SCAN_CAP);
    let transactions = state.txlog.recent(scan_limit);
    let analytics = compute_analytics(
        &transactions,
        days,
        Utc::now().timestamp(),
        card_filter.as_ref(),
    );

    Ok(success_with(json!({
        "analytics": analytics,
        "user_filter": query.card,
    })))
}

/// `GET /get_user_report?card=C&days=N` — per-card activity report.
pub(crate) async fn get_user_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;

    let raw_card = query
        .card
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Card number required"))?;
    let card = CardNumber::new(raw_card).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let days = query.days.unwrap_or(30).clamp(1, ANALYTICS_MAX_DAYS);

    let record = state
        .users
        .list()
        .into_iter()
        .find(|r| r.card_number == card)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let scan_limit = (days as usize * REPORT_TX_PER_DAY_ESTIMATE).min(REPORT_SCAN_CAP);
    let cutoff = Utc::now().timestamp() - i64::from(days) * 86_400;
    let transactions: Vec<_> = state
        .txlog
        .recent(scan_limit)
        .into_iter()
        .filter(|tx| tx.card == card && tx.timestamp >= cutoff)
        .collect();

    let report = compute_user_report(&record, &transactions, days);
    Ok(success_with(json!({"report": report})))
}

/// `GET /download_transactions_csv?limit=N` — CSV body inside the JSON
/// envelope, for dashboard compatibility.
pub(crate) async fn download_transactions_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    state.auth.require(&headers)?;

    let limit = query.limit.unwrap_or(DEFAULT_CSV_LIMIT).min(MAX_TX_LIMIT);
    let transactions = state.txlog.recent(limit);

    let mut csv = String::from("Timestamp,Name,Card Number,Reader,Status");
    for tx in &transactions {
        let when = DateTime::<Utc>::from_timestamp(tx.timestamp, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let name = tx.name.replace(',', ";");
        csv.push_str(&format!(
            "\n{when},{name},{card},{reader},{status}",
            card = tx.card,
            reader = tx.reader,
            status = tx.status
        ));
    }

    Ok(success_with(json!({"csv": csv})))
}

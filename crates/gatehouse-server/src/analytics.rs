//! Aggregation over the local transaction log.
//!
//! The server computes; the dashboard only renders. All aggregates run
//! over an in-memory slice read from the log with a line cap, filtered
//! to the requested window.

use chrono::{DateTime, Timelike, Utc};
use gatehouse_core::constants::{REPORT_TIMELINE_LIMIT, TOP_CARDS_LIMIT};
use gatehouse_core::{AccessStatus, CardNumber, ReaderId, Transaction};
use gatehouse_storage::UserRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Decision counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub granted: u64,
    pub denied: u64,
    pub blocked: u64,
}

impl StatusBreakdown {
    fn bump(&mut self, status: AccessStatus) {
        match status {
            AccessStatus::Granted => self.granted += 1,
            AccessStatus::Denied => self.denied += 1,
            AccessStatus::Blocked => self.blocked += 1,
        }
    }
}

/// One row of the top-cards table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopUser {
    pub name: String,
    pub card: String,
    pub count: u64,
}

/// The `GET /get_analytics` aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub period_days: u32,
    pub total_transactions: usize,
    pub status_breakdown: StatusBreakdown,
    pub reader_breakdown: BTreeMap<String, u64>,
    pub hourly_distribution: BTreeMap<String, u64>,
    pub daily_distribution: BTreeMap<String, u64>,
    pub top_users: Vec<TopUser>,
    pub peak_hour: u32,
    pub peak_day: String,
    pub busiest_reader: u8,
    pub unique_users: usize,
    pub unique_cards: usize,
}

/// The `GET /get_user_report` payload.
#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user: ReportUser,
    pub period_days: u32,
    pub summary: ReportSummary,
    pub patterns: ReportPatterns,
    pub timeline: Vec<TimelineEntry>,
    pub hourly_pattern: BTreeMap<String, u64>,
    pub reader_usage: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportUser {
    pub name: String,
    pub card: String,
    pub id: String,
    pub ref_id: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub total_accesses: usize,
    pub granted: u64,
    pub denied: u64,
    pub blocked: u64,
    pub avg_per_day: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPatterns {
    pub most_used_reader: u8,
    pub favorite_hour: u32,
    pub first_access: Option<i64>,
    pub last_access: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub timestamp: i64,
    pub reader: ReaderId,
    pub status: AccessStatus,
}

fn hour_of(timestamp: i64) -> u32 {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.hour())
        .unwrap_or(0)
}

fn day_of(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn zeroed_hours() -> BTreeMap<String, u64> {
    (0..24).map(|h| (h.to_string(), 0)).collect()
}

fn zeroed_readers() -> BTreeMap<String, u64> {
    (1..=3).map(|r| (r.to_string(), 0)).collect()
}

fn argmax_hour(hours: &BTreeMap<String, u64>) -> u32 {
    (0..24u32)
        .max_by_key(|h| hours.get(&h.to_string()).copied().unwrap_or(0))
        .unwrap_or(0)
}

fn argmax_reader(readers: &BTreeMap<String, u64>) -> u8 {
    (1..=3u8)
        .max_by_key(|r| readers.get(&r.to_string()).copied().unwrap_or(0))
        .unwrap_or(1)
}

/// Aggregate the last `period_days` of transactions, optionally filtered
/// to one card.
#[must_use]
pub fn compute_analytics(
    transactions: &[Transaction],
    period_days: u32,
    now_ts: i64,
    card_filter: Option<&CardNumber>,
) -> Analytics {
    let cutoff = now_ts - i64::from(period_days) * 86_400;

    let mut status_breakdown = StatusBreakdown::default();
    let mut reader_breakdown = zeroed_readers();
    let mut hourly = zeroed_hours();
    let mut daily: BTreeMap<String, u64> = BTreeMap::new();
    let mut per_card: BTreeMap<String, (String, u64)> = BTreeMap::new();
    let mut total = 0usize;

    for tx in transactions {
        if tx.timestamp < cutoff {
            continue;
        }
        if let Some(filter) = card_filter
            && tx.card != *filter
        {
            continue;
        }

        total += 1;
        status_breakdown.bump(tx.status);
        *reader_breakdown
            .entry(tx.reader.as_u8().to_string())
            .or_insert(0) += 1;
        *hourly.entry(hour_of(tx.timestamp).to_string()).or_insert(0) += 1;
        *daily.entry(day_of(tx.timestamp)).or_insert(0) += 1;

        let entry = per_card
            .entry(tx.card.as_str().to_string())
            .or_insert_with(|| (tx.name.clone(), 0));
        entry.1 += 1;
    }

    let mut top_users: Vec<TopUser> = per_card
        .iter()
        .map(|(card, (name, count))| TopUser {
            name: name.clone(),
            card: card.clone(),
            count: *count,
        })
        .collect();
    top_users.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.card.cmp(&b.card)));
    top_users.truncate(TOP_CARDS_LIMIT);

    let peak_day = daily
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(day, _)| day.clone())
        .unwrap_or_default();

    Analytics {
        period_days,
        total_transactions: total,
        peak_hour: argmax_hour(&hourly),
        busiest_reader: argmax_reader(&reader_breakdown),
        peak_day,
        unique_users: per_card.len(),
        unique_cards: per_card.len(),
        status_breakdown,
        reader_breakdown,
        hourly_distribution: hourly,
        daily_distribution: daily,
        top_users,
    }
}

/// Build the per-user report from transactions already filtered to the
/// window and card.
#[must_use]
pub fn compute_user_report(
    record: &UserRecord,
    transactions: &[Transaction],
    period_days: u32,
) -> UserReport {
    let mut summary = ReportSummary {
        total_accesses: transactions.len(),
        ..ReportSummary::default()
    };
    let mut hourly = zeroed_hours();
    let mut reader_usage = zeroed_readers();
    let mut first_access: Option<i64> = None;
    let mut last_access: Option<i64> = None;

    let mut timeline: Vec<TimelineEntry> = Vec::with_capacity(transactions.len());
    for tx in transactions {
        match tx.status {
            AccessStatus::Granted => summary.granted += 1,
            AccessStatus::Denied => summary.denied += 1,
            AccessStatus::Blocked => summary.blocked += 1,
        }
        *hourly.entry(hour_of(tx.timestamp).to_string()).or_insert(0) += 1;
        *reader_usage
            .entry(tx.reader.as_u8().to_string())
            .or_insert(0) += 1;

        first_access = Some(first_access.map_or(tx.timestamp, |t| t.min(tx.timestamp)));
        last_access = Some(last_access.map_or(tx.timestamp, |t| t.max(tx.timestamp)));

        timeline.push(TimelineEntry {
            timestamp: tx.timestamp,
            reader: tx.reader,
            status: tx.status,
        });
    }

    timeline.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
    timeline.truncate(REPORT_TIMELINE_LIMIT);

    if period_days > 0 {
        summary.avg_per_day =
            (summary.total_accesses as f64 / f64::from(period_days) * 100.0).round() / 100.0;
    }

    UserReport {
        user: ReportUser {
            name: record.name.clone(),
            card: record.card_number.as_str().to_string(),
            id: record.id.clone(),
            ref_id: record.ref_id.clone(),
            blocked: record.blocked,
        },
        period_days,
        patterns: ReportPatterns {
            most_used_reader: argmax_reader(&reader_usage),
            favorite_hour: argmax_hour(&hourly),
            first_access,
            last_access,
        },
        summary,
        timeline,
        hourly_pattern: hourly,
        reader_usage,
    }
}

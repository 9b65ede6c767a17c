//! Sales analytics and display formatting for the dashboard.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::refresh::PanelSnapshot;

/// Headline counters shown on the analytics view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    /// In-progress plus concluded orders currently on the board.
    pub orders_today: usize,
    /// Sum of concluded order totals.
    pub concluded_sales: f64,
    pub in_progress_count: usize,
}

impl SalesSummary {
    pub fn from_snapshot(snapshot: &PanelSnapshot) -> Self {
        let concluded_sales = snapshot
            .concluded
            .iter()
            .map(|o| o.total)
            .filter(|t| t.is_finite())
            .sum();
        Self {
            orders_today: snapshot.in_progress.len() + snapshot.concluded.len(),
            concluded_sales,
            in_progress_count: snapshot.in_progress.len(),
        }
    }
}

/// Two-decimal amount; non-finite values render as `0.00`.
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.2}")
}

/// Local `dd/mm/yyyy HH:MM:SS` for an RFC 3339 timestamp. Empty input is
/// `-`; anything unparseable is shown as given.
pub fn format_date_time(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "-".to_string();
    }
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M:%S")
            .to_string(),
        Err(_) => trimmed.to_string(),
    }
}

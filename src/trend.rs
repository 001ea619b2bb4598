//! Recovery Trend Aggregation
//!
//! Summarizes a date-ascending run of [`RecoveryScoreRecord`]s into the
//! figures shown next to the recovery chart: current score, change since the
//! previous entry, and the trailing weekly average.
//!
//! Recovery logs are expected to be intermittent, so sparse input is never an
//! error. An empty history summarizes to zeros and a single entry is compared
//! against a previous score of zero.
//!
//! The aggregator holds no state. When the display window changes it is
//! simply called again on the new slice.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::RecoveryScoreRecord;
use crate::score::round_half_up;

/// Number of trailing entries in the weekly average
pub const WEEKLY_WINDOW: usize = 7;

/// How much history the chart displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryWindow {
    /// Last 7 days
    #[default]
    Week,
    /// Last 14 days
    Fortnight,
    /// Last 30 days
    Month,
}

impl HistoryWindow {
    pub fn days(&self) -> usize {
        match self {
            HistoryWindow::Week => 7,
            HistoryWindow::Fortnight => 14,
            HistoryWindow::Month => 30,
        }
    }

    /// The most recent entries that fall inside this window
    ///
    /// The window counts logged entries rather than calendar days.
    pub fn apply<'a, T>(&self, records: &'a [T]) -> &'a [T] {
        let start = records.len().saturating_sub(self.days());
        &records[start..]
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Last {} days", self.days())
    }
}

impl FromStr for HistoryWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.trim_end_matches('d') {
            "7" | "week" => Ok(HistoryWindow::Week),
            "14" | "fortnight" => Ok(HistoryWindow::Fortnight),
            "30" | "month" => Ok(HistoryWindow::Month),
            _ => Err(format!("Invalid history window: {} (expected 7, 14 or 30)", s)),
        }
    }
}

/// Headline figures for a run of scored days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySummary {
    /// Score of the latest entry, 0 when there is none
    pub current_score: u8,

    /// Score of the entry before the latest, 0 when there is none
    pub previous_score: u8,

    /// `current_score - previous_score`
    pub score_change: i16,

    /// Rounded mean of the last seven scores
    pub weekly_average: u8,

    /// True when the score held or rose
    pub is_improved: bool,
}

impl RecoverySummary {
    /// Short label such as "5% improved" or "3% decreased"
    pub fn trend_label(&self) -> String {
        let direction = if self.is_improved { "improved" } else { "decreased" };
        format!("{}% {}", self.score_change.unsigned_abs(), direction)
    }
}

/// One point of the recovery chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,

    /// Axis label, e.g. "Oct 19"
    pub formatted_date: String,

    pub recovery_score: u8,
    pub pain_level: u8,
    pub mobility_scale: u8,
    pub mental_health_index: u8,
    pub heart_rate: Option<u16>,
}

impl From<&RecoveryScoreRecord> for ChartPoint {
    fn from(record: &RecoveryScoreRecord) -> Self {
        ChartPoint {
            date: record.date,
            formatted_date: record.date.format("%b %-d").to_string(),
            recovery_score: record.recovery_score,
            pain_level: record.pain_level,
            mobility_scale: record.mobility_scale,
            mental_health_index: record.mental_health_index,
            heart_rate: record.heart_rate,
        }
    }
}

/// Summary plus chart series for one history window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOverview {
    pub window: HistoryWindow,
    pub summary: RecoverySummary,
    pub series: Vec<ChartPoint>,

    /// Date of the latest entry
    pub last_updated: Option<NaiveDate>,
}

/// Stateless trend aggregator
pub struct TrendAggregator;

impl TrendAggregator {
    /// Summarize a date-ascending sequence of records
    ///
    /// The input is not sorted here; a caller passing unsorted records gets
    /// figures computed over the order given.
    pub fn summarize(records: &[RecoveryScoreRecord]) -> RecoverySummary {
        let current_score = records.last().map_or(0, |r| r.recovery_score);
        let previous_score = records
            .len()
            .checked_sub(2)
            .and_then(|i| records.get(i))
            .map_or(0, |r| r.recovery_score);

        let score_change = i16::from(current_score) - i16::from(previous_score);

        RecoverySummary {
            current_score,
            previous_score,
            score_change,
            weekly_average: Self::trailing_average(records, WEEKLY_WINDOW),
            is_improved: score_change >= 0,
        }
    }

    /// Rounded mean score of the last `window` records, 0 if there are none
    pub fn trailing_average(records: &[RecoveryScoreRecord], window: usize) -> u8 {
        let tail = &records[records.len().saturating_sub(window)..];
        if tail.is_empty() {
            return 0;
        }

        let total: u32 = tail.iter().map(|r| u32::from(r.recovery_score)).sum();
        let count = u32::try_from(tail.len()).unwrap_or(u32::MAX);
        u8::try_from(round_half_up(total, count)).unwrap_or(u8::MAX)
    }

    /// Summary and chart series for the records inside `window`
    pub fn overview(records: &[RecoveryScoreRecord], window: HistoryWindow) -> RecoveryOverview {
        let visible = window.apply(records);

        RecoveryOverview {
            window,
            summary: Self::summarize(visible),
            series: visible.iter().map(ChartPoint::from).collect(),
            last_updated: visible.last().map(|r| r.date),
        }
    }
}

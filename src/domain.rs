use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single listing after its date, time, venue and artist have been put into canonical form.
/// Built from exactly one `RawEvent` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Case-folded, noise-stripped artist text. Only used for matching.
    pub artist_canonical: String,
    pub artist_display: String,
    /// Registry venue id when resolved, otherwise the normalized raw venue text
    pub venue_canonical: String,
    pub venue_display: String,
    pub venue_resolved: bool,
    pub calendar_date: NaiveDate,
    pub time_of_day: Option<NaiveTime>,
    /// Original showtime text, trimmed
    pub time_display: Option<String>,
    pub source_id: String,
    pub reliability_weight: f64,
    pub source_note: Option<String>,
}

impl NormalizedEvent {
    pub fn has_time(&self) -> bool {
        self.time_of_day.is_some() || self.time_display.is_some()
    }
}

/// One real-world event, collapsed from every listing that describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedEvent {
    pub event_id: Uuid,
    pub artist_display: String,
    pub artist_canonical: String,
    pub venue_canonical: String,
    pub venue_display: String,
    pub venue_resolved: bool,
    pub calendar_date: NaiveDate,
    pub time_of_day: Option<NaiveTime>,
    pub time_display: Option<String>,
    pub source_note: Option<String>,
    /// Source whose record supplied every scalar field above
    pub base_source: String,
    pub reliability_weight: f64,
    /// Distinct contributing sources in first-seen order
    pub contributing_sources: Vec<String>,
}

impl MergedEvent {
    /// One-line rendering for text summaries, with the showtime in parentheses when known
    pub fn display_line(&self) -> String {
        match &self.time_display {
            Some(time) => format!("{} — {} ({})", self.artist_display, self.venue_display, time),
            None => format!("{} — {}", self.artist_display, self.venue_display),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Partial,
    Failed,
    SkippedNoKey,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Partial => "partial",
            SourceStatus::Failed => "failed",
            SourceStatus::SkippedNoKey => "skipped_no_key",
        }
    }
}

/// Why a raw listing did not make it into the candidate set
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    #[error("incomplete record")]
    IncompleteRecord,

    #[error("unparsable date")]
    UnparsableDate,

    #[error("ambiguous date resolves only to past dates")]
    AmbiguousDateInPast,

    #[error("date {date} is outside the accepted window")]
    OutOfWindow { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    pub source_id: String,
    pub artist: String,
    pub date_text: String,
    pub reason: DropReason,
}

/// What one configured source contributed to a run, or why it did not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub source_id: String,
    pub status: SourceStatus,
    pub raw_count: usize,
    /// Listings the adapter left out as not music; not part of `raw_count`
    #[serde(default)]
    pub filtered_count: usize,
    pub normalized_count: usize,
    pub error_detail: Option<String>,
    pub drops: Vec<DroppedRecord>,
    pub elapsed_ms: u64,
}

impl SourceRunResult {
    pub fn failed(source_id: impl Into<String>, detail: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            source_id: source_id.into(),
            status: SourceStatus::Failed,
            raw_count: 0,
            filtered_count: 0,
            normalized_count: 0,
            error_detail: Some(detail.into()),
            drops: Vec::new(),
            elapsed_ms,
        }
    }
}

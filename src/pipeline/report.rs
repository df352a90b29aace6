use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{MergedEvent, SourceRunResult, SourceStatus};
use crate::error::Result;
use crate::pipeline::orchestrator::RunOutcome;

pub const LOG_FILE: &str = "log.json";
pub const EVENTS_FILE: &str = "events.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTotals {
    pub raw: usize,
    /// Listings adapters left out as not music
    pub filtered: usize,
    pub normalized: usize,
    pub merged: usize,
    pub sources_ok: usize,
    pub sources_partial: usize,
    pub sources_failed: usize,
    pub sources_skipped: usize,
}

/// Machine-readable record of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_timestamp: DateTime<Utc>,
    pub run_date: NaiveDate,
    pub totals: RunTotals,
    pub sources: Vec<SourceRunResult>,
    pub events: Vec<MergedEvent>,
}

impl RunReport {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            run_timestamp: outcome.run_at,
            run_date: outcome.today,
            totals: RunTotals {
                raw: outcome.raw_total,
                filtered: outcome.sources.iter().map(|s| s.filtered_count).sum(),
                normalized: outcome.normalized_total,
                merged: outcome.events.len(),
                sources_ok: outcome.count_with_status(SourceStatus::Ok),
                sources_partial: outcome.count_with_status(SourceStatus::Partial),
                sources_failed: outcome.count_with_status(SourceStatus::Failed),
                sources_skipped: outcome.count_with_status(SourceStatus::SkippedNoKey),
            },
            sources: outcome.sources.clone(),
            events: outcome.events.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub log_path: PathBuf,
    pub events_path: PathBuf,
}

/// Write `log.json` (full report) and `events.json` (ordered calendar) into `output_dir`
pub fn write_outputs<P: AsRef<Path>>(outcome: &RunOutcome, output_dir: P) -> Result<WrittenReport> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let report = RunReport::from_outcome(outcome);

    let log_path = output_dir.join(LOG_FILE);
    fs::write(&log_path, serde_json::to_string_pretty(&report)?)?;

    let events_path = output_dir.join(EVENTS_FILE);
    fs::write(&events_path, serde_json::to_string_pretty(&report.events)?)?;

    info!(
        log = %log_path.display(),
        events = %events_path.display(),
        merged = report.totals.merged,
        "Wrote run report"
    );

    Ok(WrittenReport {
        log_path,
        events_path,
    })
}

/// Plain-text calendar grouped by date, used for dry runs
pub fn render_summary(events: &[MergedEvent]) -> String {
    let mut by_date: BTreeMap<NaiveDate, Vec<&MergedEvent>> = BTreeMap::new();
    for event in events {
        by_date.entry(event.calendar_date).or_default().push(event);
    }

    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{}\nEVENT SUMMARY\n{}", rule, rule);
    for (date, day_events) in &by_date {
        let heading = date.format("%A, %B %-d").to_string().to_uppercase();
        let _ = writeln!(out, "\n--- {} ---", heading);
        for event in day_events {
            let _ = writeln!(out, "  {}", event.display_line());
        }
    }
    let _ = writeln!(out, "\n{}", rule);
    out
}

/// One line per source that did not finish cleanly
pub fn render_failures(sources: &[SourceRunResult]) -> Vec<String> {
    sources
        .iter()
        .filter(|s| matches!(s.status, SourceStatus::Failed | SourceStatus::SkippedNoKey))
        .map(|s| {
            format!(
                "{} ({}): {}",
                s.source_id,
                s.status.as_str(),
                s.error_detail.as_deref().unwrap_or("no detail")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn merged(artist: &str, day: u32, time: Option<&str>) -> MergedEvent {
        MergedEvent {
            event_id: Uuid::nil(),
            artist_display: artist.to_string(),
            artist_canonical: artist.to_lowercase(),
            venue_canonical: "hi-tone".to_string(),
            venue_display: "Hi Tone".to_string(),
            venue_resolved: true,
            calendar_date: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            time_of_day: None,
            time_display: time.map(str::to_string),
            source_note: None,
            base_source: "sheet".to_string(),
            reliability_weight: 3.0,
            contributing_sources: vec!["sheet".to_string()],
        }
    }

    fn outcome() -> RunOutcome {
        RunOutcome {
            run_at: DateTime::parse_from_rfc3339("2026-01-01T18:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            today: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            events: vec![merged("DJ Night", 14, Some("10 PM")), merged("Rock Trio", 15, None)],
            sources: vec![
                SourceRunResult {
                    source_id: "sheet".to_string(),
                    status: SourceStatus::Ok,
                    raw_count: 2,
                    filtered_count: 1,
                    normalized_count: 2,
                    error_detail: None,
                    drops: vec![],
                    elapsed_ms: 12,
                },
                SourceRunResult::failed("dice", "timeout", 30_000),
            ],
            raw_total: 2,
            normalized_total: 2,
        }
    }

    #[test]
    fn test_writes_log_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_outputs(&outcome(), dir.path().join("docs")).unwrap();

        let report: RunReport =
            serde_json::from_str(&fs::read_to_string(&written.log_path).unwrap()).unwrap();
        assert_eq!(report.totals.merged, 2);
        assert_eq!(report.totals.sources_failed, 1);
        assert_eq!(report.totals.filtered, 1);
        assert_eq!(report.sources[0].filtered_count, 1);
        assert_eq!(report.sources[1].error_detail.as_deref(), Some("timeout"));

        let events: Vec<MergedEvent> =
            serde_json::from_str(&fs::read_to_string(&written.events_path).unwrap()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].artist_display, "DJ Night");
    }

    #[test]
    fn test_log_uses_snake_case_statuses() {
        let json = serde_json::to_value(RunReport::from_outcome(&outcome())).unwrap();
        assert_eq!(json["sources"][0]["status"], "ok");
        assert_eq!(json["sources"][1]["status"], "failed");
    }

    #[test]
    fn test_summary_groups_by_date() {
        let summary = render_summary(&outcome().events);
        assert!(summary.contains("SATURDAY, FEBRUARY 14"));
        assert!(summary.contains("DJ Night — Hi Tone (10 PM)"));
        assert!(summary.contains("SUNDAY, FEBRUARY 15"));
        assert!(summary.contains("Rock Trio — Hi Tone"));
    }

    #[test]
    fn test_failures_are_listed() {
        let lines = render_failures(&outcome().sources);
        assert_eq!(lines, vec!["dice (failed): timeout"]);
    }
}

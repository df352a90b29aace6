//! Simple metrics module for the calendar pipeline
//!
//! Metric names live in one enum so there are no magic strings at call sites. Recording
//! without an installed recorder is a no-op, which keeps library code and tests free to emit.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources metrics
    SourcesFetchOk,
    SourcesFetchPartial,
    SourcesFetchFailed,
    SourcesFetchTimeout,
    SourcesSkippedNoKey,
    SourcesFetchDuration,
    SourcesRawEvents,

    // Normalize metrics
    NormalizeRecordsNormalized,
    NormalizeRecordsDropped,
    NormalizeVenuesUnresolved,

    // Dedup metrics
    DedupBuckets,
    DedupGroups,
    DedupMergedEvents,
    DedupDuplicatesCollapsed,

    // Run metrics
    RunDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub const ALL: [MetricName; 15] = [
        MetricName::SourcesFetchOk,
        MetricName::SourcesFetchPartial,
        MetricName::SourcesFetchFailed,
        MetricName::SourcesFetchTimeout,
        MetricName::SourcesSkippedNoKey,
        MetricName::SourcesFetchDuration,
        MetricName::SourcesRawEvents,
        MetricName::NormalizeRecordsNormalized,
        MetricName::NormalizeRecordsDropped,
        MetricName::NormalizeVenuesUnresolved,
        MetricName::DedupBuckets,
        MetricName::DedupGroups,
        MetricName::DedupMergedEvents,
        MetricName::DedupDuplicatesCollapsed,
        MetricName::RunDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesFetchOk => "calendar_sources_fetch_ok_total",
            MetricName::SourcesFetchPartial => "calendar_sources_fetch_partial_total",
            MetricName::SourcesFetchFailed => "calendar_sources_fetch_failed_total",
            MetricName::SourcesFetchTimeout => "calendar_sources_fetch_timeout_total",
            MetricName::SourcesSkippedNoKey => "calendar_sources_skipped_no_key_total",
            MetricName::SourcesFetchDuration => "calendar_sources_fetch_duration_seconds",
            MetricName::SourcesRawEvents => "calendar_sources_raw_events_total",

            MetricName::NormalizeRecordsNormalized => "calendar_normalize_records_normalized_total",
            MetricName::NormalizeRecordsDropped => "calendar_normalize_records_dropped_total",
            MetricName::NormalizeVenuesUnresolved => "calendar_normalize_venues_unresolved_total",

            MetricName::DedupBuckets => "calendar_dedup_buckets",
            MetricName::DedupGroups => "calendar_dedup_groups",
            MetricName::DedupMergedEvents => "calendar_dedup_merged_events",
            MetricName::DedupDuplicatesCollapsed => "calendar_dedup_duplicates_collapsed_total",

            MetricName::RunDuration => "calendar_run_duration_seconds",
        }
    }

    /// Returns (phase, description, unit)
    pub fn metadata(&self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            MetricName::SourcesFetchOk => ("sources", "Sources that returned a complete listing", None),
            MetricName::SourcesFetchPartial => ("sources", "Sources that returned a partial listing", None),
            MetricName::SourcesFetchFailed => ("sources", "Sources that failed to fetch", None),
            MetricName::SourcesFetchTimeout => ("sources", "Sources that exceeded their timeout", None),
            MetricName::SourcesSkippedNoKey => ("sources", "Sources skipped for a missing credential", None),
            MetricName::SourcesFetchDuration => ("sources", "Per-source fetch duration", Some("s")),
            MetricName::SourcesRawEvents => ("sources", "Raw listings collected", None),

            MetricName::NormalizeRecordsNormalized => ("normalize", "Listings normalized", None),
            MetricName::NormalizeRecordsDropped => ("normalize", "Listings dropped with a reason", None),
            MetricName::NormalizeVenuesUnresolved => ("normalize", "Listings whose venue had no alias match", None),

            MetricName::DedupBuckets => ("dedup", "Date and venue buckets per run", None),
            MetricName::DedupGroups => ("dedup", "Identity groups per run", None),
            MetricName::DedupMergedEvents => ("dedup", "Merged events per run", None),
            MetricName::DedupDuplicatesCollapsed => ("dedup", "Listings folded into another listing", None),

            MetricName::RunDuration => ("run", "Whole run duration", Some("s")),
        }
    }
}

/// Attach descriptions to every metric so the exporter emits HELP lines
fn describe_all() {
    for metric in MetricName::ALL {
        let (_, description, unit) = metric.metadata();
        let name = metric.as_str();
        match unit {
            Some("s") => ::metrics::describe_histogram!(name, ::metrics::Unit::Seconds, description),
            _ if name.ends_with("_total") => ::metrics::describe_counter!(name, description),
            _ => ::metrics::describe_gauge!(name, description),
        }
    }
}

/// Install the Prometheus recorder. When `CALENDAR_METRICS_PORT` is set, also serve `/metrics`.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    match std::env::var("CALENDAR_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
    {
        Some(port) => {
            let addr: SocketAddr = ([0, 0, 0, 0], port).into();
            builder
                .with_http_listener(addr)
                .install()
                .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;
            info!("Metrics exporter listening on http://{}/metrics", addr);
        }
        None => {
            builder
                .install_recorder()
                .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
            info!("Metrics recorder installed (no listener)");
        }
    }
    describe_all();
    Ok(())
}

/// Best-effort variant for binaries: a failed install only logs a warning
pub fn init_or_warn() {
    if let Err(e) = init() {
        warn!("Metrics disabled: {}", e);
    }
}

// ============================================================================
// Sources Metrics
// ============================================================================

pub mod sources {
    use super::MetricName;
    use crate::domain::SourceStatus;

    pub fn fetch_finished(source_id: &str, status: SourceStatus, timed_out: bool, secs: f64) {
        let name = if timed_out {
            MetricName::SourcesFetchTimeout
        } else {
            match status {
                SourceStatus::Ok => MetricName::SourcesFetchOk,
                SourceStatus::Partial => MetricName::SourcesFetchPartial,
                SourceStatus::Failed => MetricName::SourcesFetchFailed,
                SourceStatus::SkippedNoKey => MetricName::SourcesSkippedNoKey,
            }
        };
        ::metrics::counter!(name.as_str(), "source" => source_id.to_string()).increment(1);
        ::metrics::histogram!(MetricName::SourcesFetchDuration.as_str(), "source" => source_id.to_string())
            .record(secs);
    }

    pub fn raw_events(source_id: &str, count: usize) {
        ::metrics::counter!(MetricName::SourcesRawEvents.as_str(), "source" => source_id.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized(venue_resolved: bool) {
        ::metrics::counter!(MetricName::NormalizeRecordsNormalized.as_str()).increment(1);
        if !venue_resolved {
            ::metrics::counter!(MetricName::NormalizeVenuesUnresolved.as_str()).increment(1);
        }
    }

    pub fn record_dropped(reason: &'static str) {
        ::metrics::counter!(MetricName::NormalizeRecordsDropped.as_str(), "reason" => reason).increment(1);
    }
}

// ============================================================================
// Dedup Metrics
// ============================================================================

pub mod dedup {
    use super::MetricName;

    pub fn run_summary(buckets: usize, groups: usize, candidates: usize) {
        ::metrics::gauge!(MetricName::DedupBuckets.as_str()).set(buckets as f64);
        ::metrics::gauge!(MetricName::DedupGroups.as_str()).set(groups as f64);
        ::metrics::gauge!(MetricName::DedupMergedEvents.as_str()).set(groups as f64);
        ::metrics::counter!(MetricName::DedupDuplicatesCollapsed.as_str())
            .increment(candidates.saturating_sub(groups) as u64);
    }
}

pub fn run_duration(secs: f64) {
    ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
}

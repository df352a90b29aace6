use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::domain::{MergedEvent, SourceRunResult, SourceStatus};
use crate::observability::metrics;
use crate::pipeline::processing::process_collected;
use crate::registry::ReliabilityRegistry;
use crate::types::{FetchStatus, RawEvent, SourceAdapter, SourceContext, SourceFetch};

pub const TIMEOUT_DETAIL: &str = "timeout";

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    /// Upper bound for a single adapter's fetch
    pub per_source_timeout: Duration,
    /// Wall-clock budget for the whole fetch phase
    pub run_budget: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            per_source_timeout: Duration::from_secs(30),
            run_budget: Duration::from_secs(120),
        }
    }
}

/// Everything one run produced: the ordered calendar and one result per configured source
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub events: Vec<MergedEvent>,
    pub sources: Vec<SourceRunResult>,
    pub raw_total: usize,
    pub normalized_total: usize,
}

impl RunOutcome {
    pub fn source(&self, source_id: &str) -> Option<&SourceRunResult> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }

    pub fn count_with_status(&self, status: SourceStatus) -> usize {
        self.sources.iter().filter(|s| s.status == status).count()
    }
}

enum FetchOutcome {
    Fetched(SourceFetch),
    Errored(String),
    TimedOut,
    Panicked(String),
}

pub struct Orchestrator {
    registry: Arc<ReliabilityRegistry>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ReliabilityRegistry>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        settings: RunSettings,
    ) -> Self {
        let mut seen = HashSet::new();
        for adapter in &adapters {
            if !seen.insert(adapter.source_id().to_string()) {
                warn!(
                    source_id = adapter.source_id(),
                    "Source id configured more than once; its counts will be combined"
                );
            }
        }
        Self {
            registry,
            adapters,
            settings,
        }
    }

    /// Fetch every source concurrently, then normalize, deduplicate and sort.
    ///
    /// Source failures of any kind end up in the returned results; this never fails.
    #[instrument(skip_all, fields(sources = self.adapters.len(), today = %ctx.today))]
    pub async fn run(&self, ctx: SourceContext) -> RunOutcome {
        let started = Instant::now();
        let run_at = ctx.run_at;
        let today = ctx.today;

        let fetched = self.fetch_all(ctx).await;

        let mut raws: Vec<RawEvent> = Vec::new();
        let mut sources: Vec<SourceRunResult> = Vec::with_capacity(self.adapters.len());
        for (adapter, outcome) in self.adapters.iter().zip(fetched) {
            let source_id = adapter.source_id().to_string();
            let (outcome, elapsed) =
                outcome.unwrap_or((FetchOutcome::TimedOut, started.elapsed()));
            let elapsed_ms = elapsed.as_millis() as u64;

            let result = match outcome {
                FetchOutcome::Fetched(fetch) => {
                    let (status, detail) = match fetch.status {
                        FetchStatus::Complete => (SourceStatus::Ok, None),
                        FetchStatus::Partial { detail } => (SourceStatus::Partial, Some(detail)),
                        FetchStatus::MissingCredential { name } => (
                            SourceStatus::SkippedNoKey,
                            Some(format!("missing credential {}", name)),
                        ),
                    };
                    let events = if status == SourceStatus::SkippedNoKey {
                        Vec::new()
                    } else {
                        fetch.events
                    };
                    let raw_count = events.len();
                    raws.extend(events);
                    SourceRunResult {
                        source_id: source_id.clone(),
                        status,
                        raw_count,
                        filtered_count: fetch.filtered,
                        normalized_count: 0,
                        error_detail: detail,
                        drops: Vec::new(),
                        elapsed_ms,
                    }
                }
                FetchOutcome::Errored(message) => {
                    SourceRunResult::failed(&source_id, message, elapsed_ms)
                }
                FetchOutcome::TimedOut => SourceRunResult::failed(&source_id, TIMEOUT_DETAIL, elapsed_ms),
                FetchOutcome::Panicked(message) => {
                    SourceRunResult::failed(&source_id, format!("panicked: {}", message), elapsed_ms)
                }
            };

            let timed_out = result.error_detail.as_deref() == Some(TIMEOUT_DETAIL)
                && result.status == SourceStatus::Failed;
            match result.status {
                SourceStatus::Ok | SourceStatus::Partial => info!(
                    source_id = %result.source_id,
                    status = result.status.as_str(),
                    raw = result.raw_count,
                    filtered = result.filtered_count,
                    elapsed_ms,
                    "Source fetched"
                ),
                SourceStatus::SkippedNoKey => info!(
                    source_id = %result.source_id,
                    "Source skipped, no credential"
                ),
                SourceStatus::Failed => warn!(
                    source_id = %result.source_id,
                    error = result.error_detail.as_deref().unwrap_or(""),
                    elapsed_ms,
                    "Source failed"
                ),
            }
            metrics::sources::fetch_finished(
                &result.source_id,
                result.status,
                timed_out,
                elapsed.as_secs_f64(),
            );
            metrics::sources::raw_events(&result.source_id, result.raw_count);
            sources.push(result);
        }

        let processed = process_collected(&self.registry, today, &raws);
        for result in sources.iter_mut() {
            result.normalized_count = processed.batch.normalized_for(&result.source_id);
            result.drops = processed.batch.drops_for(&result.source_id);
        }

        metrics::run_duration(started.elapsed().as_secs_f64());
        info!(
            raw = raws.len(),
            normalized = processed.batch.events.len(),
            merged = processed.events.len(),
            failed = sources.iter().filter(|s| s.status == SourceStatus::Failed).count(),
            "Run complete"
        );

        RunOutcome {
            run_at,
            today,
            raw_total: raws.len(),
            normalized_total: processed.batch.events.len(),
            events: processed.events,
            sources,
        }
    }

    /// One slot per adapter, in configured order. `None` means the run budget ran out first.
    async fn fetch_all(&self, ctx: SourceContext) -> Vec<Option<(FetchOutcome, Duration)>> {
        let ctx = Arc::new(ctx);
        let per_source = self.settings.per_source_timeout;
        let deadline = tokio::time::Instant::now() + self.settings.run_budget;

        let mut set = JoinSet::new();
        let mut fetch_handles = Vec::with_capacity(self.adapters.len());
        for (index, adapter) in self.adapters.iter().enumerate() {
            let adapter = Arc::clone(adapter);
            let ctx = Arc::clone(&ctx);
            let started = Instant::now();

            // The fetch runs in its own task so a panic surfaces as a JoinError
            let fetch = tokio::spawn(async move {
                tokio::time::timeout(per_source, adapter.fetch(&ctx)).await
            });
            fetch_handles.push(fetch.abort_handle());

            set.spawn(async move {
                let outcome = match fetch.await {
                    Ok(Ok(Ok(result))) => FetchOutcome::Fetched(result),
                    Ok(Ok(Err(e))) => FetchOutcome::Errored(e.to_string()),
                    Ok(Err(_)) => FetchOutcome::TimedOut,
                    Err(e) if e.is_panic() => FetchOutcome::Panicked(panic_message(e.into_panic())),
                    Err(e) => FetchOutcome::Errored(e.to_string()),
                };
                (index, outcome, started.elapsed())
            });
        }

        let mut slots: Vec<Option<(FetchOutcome, Duration)>> =
            (0..self.adapters.len()).map(|_| None).collect();
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((index, outcome, elapsed)))) => slots[index] = Some((outcome, elapsed)),
                Ok(Some(Err(e))) => warn!("Fetch task could not be joined: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = set.len(), "Run budget exhausted, abandoning unfinished sources");
                    set.abort_all();
                    for handle in &fetch_handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }
        slots
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CalendarError, Result};

    struct Fixed {
        id: &'static str,
        fetch: SourceFetch,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        fn source_id(&self) -> &str {
            self.id
        }

        async fn fetch(&self, _ctx: &SourceContext) -> Result<SourceFetch> {
            Ok(self.fetch.clone())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl SourceAdapter for Broken {
        fn source_id(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _ctx: &SourceContext) -> Result<SourceFetch> {
            Err(CalendarError::source_failure("broken", "HTTP 503"))
        }
    }

    fn ctx() -> SourceContext {
        let run_at = DateTime::parse_from_rfc3339("2026-01-01T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        SourceContext::new(run_at, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    #[tokio::test]
    async fn test_statuses_are_mapped_per_source() {
        let registry = Arc::new(ReliabilityRegistry::from_toml_str("").unwrap());
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Fixed {
                id: "sheet",
                fetch: SourceFetch::complete(vec![RawEvent::new(
                    "sheet", "DJ Night", "Bar DKDC", "2/14/2026",
                )]),
            }),
            Arc::new(Fixed {
                id: "artifacts",
                fetch: SourceFetch::partial(vec![], "1 file unreadable"),
            }),
            Arc::new(Fixed {
                id: "ticketmaster",
                fetch: SourceFetch::missing_credential("TICKETMASTER_API_KEY"),
            }),
            Arc::new(Broken),
        ];
        let outcome = Orchestrator::new(registry, adapters, RunSettings::default())
            .run(ctx())
            .await;

        let statuses: Vec<_> = outcome.sources.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                SourceStatus::Ok,
                SourceStatus::Partial,
                SourceStatus::SkippedNoKey,
                SourceStatus::Failed
            ]
        );
        assert_eq!(outcome.source("broken").unwrap().error_detail.as_deref(), Some("Source broken failed: HTTP 503"));
        assert_eq!(outcome.source("sheet").unwrap().normalized_count, 1);
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn test_no_sources_is_an_empty_run() {
        let registry = Arc::new(ReliabilityRegistry::from_toml_str("").unwrap());
        let outcome = Orchestrator::new(registry, vec![], RunSettings::default())
            .run(ctx())
            .await;
        assert!(outcome.events.is_empty());
        assert!(outcome.sources.is_empty());
    }
}

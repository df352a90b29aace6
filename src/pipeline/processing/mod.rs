// Pipeline processing: normalization, identity grouping and conflict resolution

pub mod conflation;
pub mod fingerprint;
pub mod normalize;

use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::info;

use crate::domain::MergedEvent;
use crate::registry::ReliabilityRegistry;
use crate::types::RawEvent;

pub use conflation::ConflictResolver;
pub use fingerprint::{EventGroup, FingerprintEngine};
pub use normalize::{NormalizedBatch, Normalizer};

/// Output of the sequential pass over everything collected in a run
#[derive(Debug, Clone)]
pub struct ProcessedRun {
    pub batch: NormalizedBatch,
    pub events: Vec<MergedEvent>,
}

/// Calendar order: date, resolved venues before unresolved ones, venue, artist, then id
pub fn calendar_order(a: &MergedEvent, b: &MergedEvent) -> Ordering {
    a.calendar_date
        .cmp(&b.calendar_date)
        .then_with(|| b.venue_resolved.cmp(&a.venue_resolved))
        .then_with(|| a.venue_canonical.cmp(&b.venue_canonical))
        .then_with(|| {
            a.artist_display
                .to_lowercase()
                .cmp(&b.artist_display.to_lowercase())
        })
        .then_with(|| a.artist_display.cmp(&b.artist_display))
        .then_with(|| a.event_id.cmp(&b.event_id))
}

/// Normalize, group, merge and sort. Pure over its inputs, so identical raw listings always
/// produce identical output.
pub fn process_collected(
    registry: &ReliabilityRegistry,
    today: NaiveDate,
    raws: &[RawEvent],
) -> ProcessedRun {
    let batch = Normalizer::new(registry, today).normalize_all(raws);

    let engine = FingerprintEngine::new(registry.matching().similarity_threshold);
    let groups = engine.group(&batch.events);

    let mut events = ConflictResolver::new().resolve_all(&groups);
    events.sort_by(calendar_order);

    info!(
        candidates = batch.events.len(),
        groups = groups.len(),
        merged = events.len(),
        "Deduplication complete"
    );

    ProcessedRun { batch, events }
}

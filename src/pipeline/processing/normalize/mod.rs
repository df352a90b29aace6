// Normalization: raw listings into canonical, comparable candidates

pub mod dates;
pub mod text;
pub mod times;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{DropReason, DroppedRecord, NormalizedEvent};
use crate::observability::metrics;
use crate::registry::{venue_key, ReliabilityRegistry};
use crate::types::RawEvent;

pub use dates::{central_today, DateResolver};
pub use text::{artist_canonical, fold_text};
pub use times::parse_time;

/// Result of normalizing a single raw listing
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Normalized(NormalizedEvent),
    Dropped(DroppedRecord),
}

/// Every candidate and every drop from one normalization pass, in input order
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub events: Vec<NormalizedEvent>,
    pub drops: Vec<DroppedRecord>,
}

impl NormalizedBatch {
    pub fn normalized_for(&self, source_id: &str) -> usize {
        self.events.iter().filter(|e| e.source_id == source_id).count()
    }

    pub fn drops_for(&self, source_id: &str) -> Vec<DroppedRecord> {
        self.drops
            .iter()
            .filter(|d| d.source_id == source_id)
            .cloned()
            .collect()
    }
}

/// Converts raw listings into normalized candidates using a shared, read-only registry
pub struct Normalizer<'a> {
    registry: &'a ReliabilityRegistry,
    dates: DateResolver,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a ReliabilityRegistry, today: NaiveDate) -> Self {
        Self {
            registry,
            dates: DateResolver::new(today, registry.window()),
        }
    }

    pub fn normalize(&self, raw: &RawEvent) -> NormalizeOutcome {
        match self.try_normalize(raw) {
            Ok(event) => {
                metrics::normalize::record_normalized(event.venue_resolved);
                NormalizeOutcome::Normalized(event)
            }
            Err(reason) => {
                debug!(
                    source_id = %raw.source_id,
                    artist = %raw.artist,
                    date = %raw.date,
                    reason = %reason,
                    "Dropping listing"
                );
                metrics::normalize::record_dropped(drop_label(&reason));
                NormalizeOutcome::Dropped(DroppedRecord {
                    source_id: raw.source_id.clone(),
                    artist: raw.artist.clone(),
                    date_text: raw.date.clone(),
                    reason,
                })
            }
        }
    }

    pub fn normalize_all(&self, raws: &[RawEvent]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize(raw) {
                NormalizeOutcome::Normalized(event) => batch.events.push(event),
                NormalizeOutcome::Dropped(drop) => batch.drops.push(drop),
            }
        }
        info!(
            raw = raws.len(),
            normalized = batch.events.len(),
            dropped = batch.drops.len(),
            "Normalization pass complete"
        );
        batch
    }

    fn try_normalize(&self, raw: &RawEvent) -> Result<NormalizedEvent, DropReason> {
        let artist_display = raw.artist.trim();
        let venue_text = raw.venue.trim();
        if artist_display.is_empty() || venue_text.is_empty() {
            return Err(DropReason::IncompleteRecord);
        }

        let artist_canonical = artist_canonical(artist_display);
        if artist_canonical.is_empty() {
            return Err(DropReason::IncompleteRecord);
        }

        let (venue_canonical, venue_display, venue_resolved) =
            match self.registry.resolve_venue(venue_text) {
                Some(venue) => (venue.id.clone(), venue.name.clone(), true),
                None => {
                    let key = venue_key(venue_text);
                    if key.is_empty() {
                        return Err(DropReason::IncompleteRecord);
                    }
                    (key, venue_text.to_string(), false)
                }
            };

        let calendar_date = self.dates.resolve(&raw.date)?;

        let time_display = raw
            .time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let time_of_day = time_display.as_deref().and_then(parse_time);

        Ok(NormalizedEvent {
            artist_canonical,
            artist_display: artist_display.to_string(),
            venue_canonical,
            venue_display,
            venue_resolved,
            calendar_date,
            time_of_day,
            time_display,
            source_id: raw.source_id.clone(),
            reliability_weight: self.registry.weight_for(&raw.source_id),
            source_note: raw
                .source_note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        })
    }
}

fn drop_label(reason: &DropReason) -> &'static str {
    match reason {
        DropReason::IncompleteRecord => "incomplete_record",
        DropReason::UnparsableDate => "unparsable_date",
        DropReason::AmbiguousDateInPast => "ambiguous_date_in_past",
        DropReason::OutOfWindow { .. } => "out_of_window",
    }
}

use std::cmp::Ordering;
use uuid::Uuid;

use crate::domain::{MergedEvent, NormalizedEvent};
use crate::pipeline::processing::fingerprint::EventGroup;

/// Deterministic id for a merged event, stable across runs over the same input
pub fn event_id(event: &NormalizedEvent) -> Uuid {
    let name = format!(
        "{}|{}|{}",
        event.calendar_date, event.venue_canonical, event.artist_canonical
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Ordering in which a listing is preferred as the base record: heavier source first, then
/// a listing with a showtime, then a resolved venue, then the alphabetically first source id.
pub fn base_preference(a: &NormalizedEvent, b: &NormalizedEvent) -> Ordering {
    b.reliability_weight
        .total_cmp(&a.reliability_weight)
        .then_with(|| b.has_time().cmp(&a.has_time()))
        .then_with(|| b.venue_resolved.cmp(&a.venue_resolved))
        .then_with(|| a.source_id.cmp(&b.source_id))
}

/// Collapses each identity group into one merged event.
///
/// Every scalar field comes from the single base record; fields are never mixed across
/// members.
#[derive(Debug, Default, Clone)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn select_base<'a>(&self, group: &EventGroup<'a>) -> Option<&'a NormalizedEvent> {
        group
            .members
            .iter()
            .copied()
            .min_by(|a, b| base_preference(a, b))
    }

    pub fn resolve(&self, group: &EventGroup<'_>) -> Option<MergedEvent> {
        let base = self.select_base(group)?;

        let mut contributing_sources: Vec<String> = Vec::new();
        for member in &group.members {
            if !contributing_sources.contains(&member.source_id) {
                contributing_sources.push(member.source_id.clone());
            }
        }

        Some(MergedEvent {
            event_id: event_id(base),
            artist_display: base.artist_display.clone(),
            artist_canonical: base.artist_canonical.clone(),
            venue_canonical: base.venue_canonical.clone(),
            venue_display: base.venue_display.clone(),
            venue_resolved: base.venue_resolved,
            calendar_date: base.calendar_date,
            time_of_day: base.time_of_day,
            time_display: base.time_display.clone(),
            source_note: base.source_note.clone(),
            base_source: base.source_id.clone(),
            reliability_weight: base.reliability_weight,
            contributing_sources,
        })
    }

    pub fn resolve_all(&self, groups: &[EventGroup<'_>]) -> Vec<MergedEvent> {
        groups.iter().filter_map(|g| self.resolve(g)).collect()
    }
}

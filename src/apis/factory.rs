use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::apis::{ArtifactsAdapter, SheetAdapter, TicketmasterAdapter, VenueCalendarAdapter};
use crate::config::AppConfig;
use crate::error::Result;
use crate::infra::ReqwestHttp;
use crate::registry::ReliabilityRegistry;
use crate::types::SourceAdapter;

/// Build every enabled adapter, in a fixed order: ticketmaster, sheet, artifacts, then venue
/// calendars in registry order.
pub fn build_adapters(
    config: &AppConfig,
    registry: &ReliabilityRegistry,
) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let http = ReqwestHttp::new(Duration::from_secs(config.per_source_timeout_secs))?;
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if config.ticketmaster.enabled {
        adapters.push(Arc::new(TicketmasterAdapter::new(
            config.ticketmaster.clone(),
            http.clone(),
            registry.music_filter().clone(),
        )));
    }
    if config.sheet.enabled {
        adapters.push(Arc::new(SheetAdapter::new(
            http.clone(),
            config.sheet.local_csv.clone(),
        )));
    }
    if config.artifacts.enabled {
        adapters.push(Arc::new(ArtifactsAdapter::new(config.artifacts.dir.clone())));
    }
    if config.venue_calendars.enabled {
        let only = &config.venue_calendars.only;
        for venue in registry.venues() {
            if !only.is_empty() && !only.contains(&venue.id) {
                continue;
            }
            if let Some(adapter) =
                VenueCalendarAdapter::for_venue(venue, http.clone(), registry.music_filter().clone())
            {
                adapters.push(Arc::new(adapter));
            }
        }
    }

    info!(
        sources = adapters.len(),
        "Configured sources: {}",
        adapters
            .iter()
            .map(|a| a.source_id())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(adapters)
}

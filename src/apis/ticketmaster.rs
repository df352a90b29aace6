use chrono::{Duration, NaiveTime};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::TicketmasterConfig;
use crate::constants::{TICKETMASTER_API_KEY_ENV, TICKETMASTER_SOURCE};
use crate::error::Result;
use crate::infra::ReqwestHttp;
use crate::registry::MusicFilter;
use crate::types::{RawEvent, SourceAdapter, SourceContext, SourceFetch};

pub const DISCOVERY_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";

/// Ticketmaster Discovery API, music classification around a configured point
pub struct TicketmasterAdapter {
    config: TicketmasterConfig,
    http: ReqwestHttp,
    filter: MusicFilter,
}

impl TicketmasterAdapter {
    pub fn new(config: TicketmasterConfig, http: ReqwestHttp, filter: MusicFilter) -> Self {
        Self {
            config,
            http,
            filter,
        }
    }

    /// Parse one Discovery API page, dropping non-music listings
    fn listings_from_page(&self, data: &Value) -> SourceFetch {
        let parsed = parse_discovery_page(data);
        let parsed_count = parsed.len() as u64;
        let (events, filtered) = self.filter.retain_music(parsed);
        let total = data
            .pointer("/page/totalElements")
            .and_then(Value::as_u64)
            .unwrap_or(parsed_count);

        info!(
            filtered,
            "Fetched {} of {} Ticketmaster events",
            parsed_count,
            total
        );
        let fetch = if total > parsed_count {
            SourceFetch::partial(events, format!("first page only, {} events available", total))
        } else {
            SourceFetch::complete(events)
        };
        fetch.with_filtered(filtered)
    }
}

/// "19:30:00" becomes "7:30 PM", "20:00:00" becomes "8 PM"
fn display_time(local_time: &str) -> Option<String> {
    let time = NaiveTime::parse_from_str(local_time.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(local_time.trim(), "%H:%M"))
        .ok()?;
    Some(time.format("%-I:%M %p").to_string().replace(":00 ", " "))
}

/// Turn a Discovery API page into raw listings. Events without a name or local date are skipped.
pub fn parse_discovery_page(data: &Value) -> Vec<RawEvent> {
    let Some(events) = data
        .pointer("/_embedded/events")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    events
        .iter()
        .filter_map(|event| {
            let name = event.get("name").and_then(Value::as_str)?.trim();
            let start = event.pointer("/dates/start")?;
            let date = start.get("localDate").and_then(Value::as_str)?;
            let venue = event
                .pointer("/_embedded/venues/0/name")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let mut raw = RawEvent::new(TICKETMASTER_SOURCE, name, venue, date);
            if let Some(time) = start
                .get("localTime")
                .and_then(Value::as_str)
                .and_then(display_time)
            {
                raw = raw.with_time(time);
            }
            if let Some(url) = event.get("url").and_then(Value::as_str) {
                raw = raw.with_note(url);
            }
            Some(raw)
        })
        .collect()
}

#[async_trait::async_trait]
impl SourceAdapter for TicketmasterAdapter {
    fn source_id(&self) -> &str {
        TICKETMASTER_SOURCE
    }

    #[instrument(skip_all, fields(source_id = TICKETMASTER_SOURCE))]
    async fn fetch(&self, ctx: &SourceContext) -> Result<SourceFetch> {
        let Some(api_key) = ctx.credential(TICKETMASTER_API_KEY_ENV) else {
            info!("No {} set, skipping", TICKETMASTER_API_KEY_ENV);
            return Ok(SourceFetch::missing_credential(TICKETMASTER_API_KEY_ENV));
        };

        let end = ctx.today + Duration::days(self.config.days_ahead);
        let start_param = format!("{}T00:00:00Z", ctx.today);
        let end_param = format!("{}T23:59:59Z", end);
        let radius = self.config.radius_miles.to_string();
        let size = self.config.page_size.to_string();

        debug!(start = %start_param, end = %end_param, "Querying Discovery API");
        let data: Value = self
            .http
            .client()
            .get(DISCOVERY_URL)
            .query(&[
                ("apikey", api_key),
                ("latlong", self.config.latlong.as_str()),
                ("radius", radius.as_str()),
                ("unit", "miles"),
                ("classificationName", "music"),
                ("startDateTime", start_param.as_str()),
                ("endDateTime", end_param.as_str()),
                ("size", size.as_str()),
                ("sort", "date,asc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(self.listings_from_page(&data))
    }
}

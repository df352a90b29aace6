use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::constants::venue_source_id;
use crate::error::Result;
use crate::infra::ReqwestHttp;
use crate::registry::{MusicFilter, VenueInfo};
use crate::types::{RawEvent, SourceAdapter, SourceContext, SourceFetch};

static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

fn is_event_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.ends_with("Event"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.ends_with("Event")),
        _ => false,
    }
}

/// First `name` found on a value that may be a string, an object or a list of either
fn first_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        Value::Array(items) => items.iter().find_map(first_name),
        _ => None,
    }
}

fn event_from_json_ld(value: &Value, source_id: &str, fallback_venue: Option<&str>) -> Option<RawEvent> {
    let start = value.get("startDate").and_then(Value::as_str)?.trim();
    let (date, time) = match start.split_once('T') {
        Some((date, rest)) => (date, rest.get(..5)),
        None => (start, None),
    };

    let artist = value
        .get("performer")
        .and_then(first_name)
        .or_else(|| value.get("name").and_then(first_name))
        .unwrap_or_default();
    let venue = value
        .get("location")
        .and_then(first_name)
        .or_else(|| fallback_venue.map(str::to_string))
        .unwrap_or_default();

    let mut event = RawEvent::new(source_id, artist, venue, date);
    if let Some(time) = time {
        event = event.with_time(time);
    }
    Some(event)
}

fn collect_events(value: &Value, source_id: &str, fallback_venue: Option<&str>, out: &mut Vec<RawEvent>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_events(item, source_id, fallback_venue, out);
            }
        }
        Value::Object(map) => {
            if is_event_type(value) {
                if let Some(event) = event_from_json_ld(value, source_id, fallback_venue) {
                    out.push(event);
                }
                return;
            }
            for key in ["@graph", "itemListElement", "item", "subEvent"] {
                if let Some(nested) = map.get(key) {
                    collect_events(nested, source_id, fallback_venue, out);
                }
            }
        }
        _ => {}
    }
}

/// Extract schema.org events from every JSON-LD block in an HTML document.
///
/// Blocks that are not valid JSON are skipped.
pub fn extract_json_ld_events(html: &str, source_id: &str, fallback_venue: Option<&str>) -> Vec<RawEvent> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();
    for script in document.select(&JSON_LD) {
        let text = script.inner_html();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => collect_events(&value, source_id, fallback_venue, &mut events),
            Err(e) => debug!(source_id, "Skipping malformed JSON-LD block: {}", e),
        }
    }
    events
}

/// Scrapes one registry venue's own calendar page
pub struct VenueCalendarAdapter {
    source_id: String,
    venue: VenueInfo,
    url: String,
    http: ReqwestHttp,
    filter: MusicFilter,
}

impl VenueCalendarAdapter {
    /// Returns `None` for venues without a calendar page
    pub fn for_venue(venue: &VenueInfo, http: ReqwestHttp, filter: MusicFilter) -> Option<Self> {
        let url = venue.calendar_url.clone()?;
        Some(Self {
            source_id: venue_source_id(&venue.id),
            venue: venue.clone(),
            url,
            http,
            filter,
        })
    }

    /// Mixed-use venues list games and talks next to concerts; only music is kept
    fn listings_from_page(&self, body: &str) -> SourceFetch {
        let found = extract_json_ld_events(body, &self.source_id, Some(&self.venue.name));
        if found.is_empty() {
            warn!(url = %self.url, "No structured event data found on venue calendar");
        }
        let (events, filtered) = self.filter.retain_music(found);
        info!(filtered, "Found {} events on {}", events.len(), self.venue.name);
        SourceFetch::complete(events).with_filtered(filtered)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for VenueCalendarAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    #[instrument(skip_all, fields(source_id = %self.source_id))]
    async fn fetch(&self, _ctx: &SourceContext) -> Result<SourceFetch> {
        debug!(url = %self.url, "Fetching venue calendar");
        let body = self.http.get_text(&self.url).await?;
        Ok(self.listings_from_page(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><head>
<script type="application/ld+json">
{"@context":"https://schema.org","@type":"MusicEvent","name":"Lucero w/ Guests",
 "startDate":"2026-02-14T20:00:00-06:00",
 "location":{"@type":"MusicVenue","name":"Minglewood Hall"},
 "performer":[{"@type":"MusicGroup","name":"Lucero"}]}
</script>
<script type="application/ld+json">
{"@type":"ItemList","itemListElement":[
  {"@type":"ListItem","item":{"@type":"Event","name":"DJ Night","startDate":"2026-02-15"}},
  {"@type":"ListItem","item":{"@type":"Place","name":"Not an event"}}
]}
</script>
<script type="application/ld+json">{ not json </script>
</head><body></body></html>
"#;

    #[test]
    fn test_extracts_events_and_item_lists() {
        let events = extract_json_ld_events(PAGE, "venue:minglewood-hall", Some("Minglewood Hall"));
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].artist, "Lucero");
        assert_eq!(events[0].venue, "Minglewood Hall");
        assert_eq!(events[0].date, "2026-02-14");
        assert_eq!(events[0].time.as_deref(), Some("20:00"));

        assert_eq!(events[1].artist, "DJ Night");
        assert_eq!(events[1].venue, "Minglewood Hall");
        assert_eq!(events[1].time, None);
        assert_eq!(events[1].source_id, "venue:minglewood-hall");
    }

    #[test]
    fn test_graph_container() {
        let html = r#"<script type="application/ld+json">
{"@graph":[{"@type":["Event","MusicEvent"],"name":"Rock Trio","startDate":"2026-03-01T21:30","location":"Hi Tone"}]}
</script>"#;
        let events = extract_json_ld_events(html, "venue:hi-tone", None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].venue, "Hi Tone");
        assert_eq!(events[0].time.as_deref(), Some("21:30"));
    }

    #[test]
    fn test_venue_without_calendar_has_no_adapter() {
        let venue = VenueInfo {
            id: "bar-dkdc".to_string(),
            name: "Bar DKDC".to_string(),
            aliases: vec![],
            calendar_url: None,
        };
        let http = ReqwestHttp::new(std::time::Duration::from_secs(5)).unwrap();
        assert!(VenueCalendarAdapter::for_venue(&venue, http, MusicFilter::default()).is_none());
    }

    #[test]
    fn test_arena_calendar_keeps_only_concerts() {
        let venue = VenueInfo {
            id: "fedexforum".to_string(),
            name: "FedExForum".to_string(),
            aliases: vec![],
            calendar_url: Some("https://www.fedexforum.com/events".to_string()),
        };
        let filter = MusicFilter {
            exclude_keywords: vec!["vs.".into(), "basketball".into()],
            music_keywords: vec!["tour".into()],
        };
        let http = ReqwestHttp::new(std::time::Duration::from_secs(5)).unwrap();
        let adapter = VenueCalendarAdapter::for_venue(&venue, http, filter).unwrap();

        let page = r#"<script type="application/ld+json">[
{"@type":"SportsEvent","name":"Memphis Grizzlies vs. Lakers","startDate":"2026-02-14T19:00"},
{"@type":"MusicEvent","name":"Chris Stapleton","startDate":"2026-02-20T20:00"},
{"@type":"Event","name":"College Basketball Showcase","startDate":"2026-02-21"}
]</script>"#;
        let fetch = adapter.listings_from_page(page);
        assert_eq!(fetch.filtered, 2);
        assert_eq!(fetch.events.len(), 1);
        assert_eq!(fetch.events[0].artist, "Chris Stapleton");
        assert_eq!(fetch.events[0].venue, "FedExForum");
    }
}

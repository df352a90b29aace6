/// Source id and credential name constants shared by the adapters, the factory and the registry

// Source ids (also the keys under [sources] in registry.toml)
pub const TICKETMASTER_SOURCE: &str = "ticketmaster";
pub const SHEET_SOURCE: &str = "sheet";
pub const ARTIFACTS_SOURCE: &str = "artifacts";

/// Venue calendar sources are named `venue:<venue-id>` and share the `venue` weight family
pub const VENUE_SOURCE_FAMILY: &str = "venue";

// Environment variables holding credentials
pub const TICKETMASTER_API_KEY_ENV: &str = "TICKETMASTER_API_KEY";
pub const SHEET_CSV_URL_ENV: &str = "GOOGLE_SHEET_CSV_URL";

/// Build the source id for a venue's own calendar
pub fn venue_source_id(venue_id: &str) -> String {
    format!("{}:{}", VENUE_SOURCE_FAMILY, venue_id)
}

/// Credential names every run looks up in the environment
pub fn credential_names() -> Vec<&'static str> {
    vec![TICKETMASTER_API_KEY_ENV, SHEET_CSV_URL_ENV]
}

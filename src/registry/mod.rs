// Static configuration shared read-only across a run

pub mod music_filter;
pub mod reliability;

pub use music_filter::MusicFilter;
pub use reliability::{venue_key, MatchingSettings, ReliabilityRegistry, VenueInfo, WindowSettings};

// Source adapters: one per origin of raw listings

pub mod artifacts;
pub mod factory;
pub mod sheet;
pub mod ticketmaster;
pub mod venue_calendar;

pub use artifacts::ArtifactsAdapter;
pub use factory::build_adapters;
pub use sheet::SheetAdapter;
pub use ticketmaster::TicketmasterAdapter;
pub use venue_calendar::VenueCalendarAdapter;

pub mod apis;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod infra;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use domain::{DropReason, DroppedRecord, MergedEvent, NormalizedEvent, SourceRunResult, SourceStatus};
pub use error::{CalendarError, Result};
pub use registry::ReliabilityRegistry;
pub use types::{FetchStatus, RawEvent, SourceAdapter, SourceContext, SourceFetch};

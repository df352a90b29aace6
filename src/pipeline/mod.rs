// Calendar pipeline: concurrent source fetch, then one sequential normalize/dedup pass

pub mod orchestrator;
pub mod processing;
pub mod report;

pub use orchestrator::{Orchestrator, RunOutcome, RunSettings};
pub use processing::{process_collected, ProcessedRun};
pub use report::{write_outputs, RunReport};

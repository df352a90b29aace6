// Observability: metrics

pub mod metrics;

pub use metrics::{init, init_or_warn, MetricName};

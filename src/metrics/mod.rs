pub mod collector;
pub mod exporter;

pub use collector::MetricsCollector;
pub use exporter::export_metrics;

pub const RULES_LOADED: &str = "bouncer_processed_secrules_amount";
pub const REQUESTS_PROCESSED: &str = "bouncer_processed_request_total";
pub const REQUESTS_INTERRUPTED: &str = "bouncer_interrupted_request_total";

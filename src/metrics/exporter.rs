use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

/// Content type of the prometheus text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub fn export_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        MetricsCollector, REQUESTS_INTERRUPTED, REQUESTS_PROCESSED, RULES_LOADED,
    };

    #[test]
    fn test_export_contains_bouncer_metrics() {
        let collector = MetricsCollector::new().unwrap();
        collector.set_rules_loaded(3);
        collector.inc_requests_interrupted();

        let text = export_metrics(collector.registry()).unwrap();
        assert!(text.contains(&format!("{} 3", RULES_LOADED)));
        assert!(text.contains(&format!("{} 0", REQUESTS_PROCESSED)));
        assert!(text.contains(&format!("{} 1", REQUESTS_INTERRUPTED)));
    }
}

use super::{REQUESTS_INTERRUPTED, REQUESTS_PROCESSED, RULES_LOADED};
use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Process-wide bouncer metrics registered on a registry owned by the
/// collector rather than the prometheus default registry.
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Registry,
    rules_loaded: IntGauge,
    requests_processed: IntCounter,
    requests_interrupted: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let rules_loaded = IntGauge::with_opts(Opts::new(
            RULES_LOADED,
            "Number of SecRules loaded into the engine",
        ))?;
        let requests_processed = IntCounter::with_opts(Opts::new(
            REQUESTS_PROCESSED,
            "Number of forwardAuth requests evaluated",
        ))?;
        let requests_interrupted = IntCounter::with_opts(Opts::new(
            REQUESTS_INTERRUPTED,
            "Number of requests interrupted by a rule",
        ))?;

        registry.register(Box::new(rules_loaded.clone()))?;
        registry.register(Box::new(requests_processed.clone()))?;
        registry.register(Box::new(requests_interrupted.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            rules_loaded,
            requests_processed,
            requests_interrupted,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn set_rules_loaded(&self, count: usize) {
        self.rules_loaded.set(count as i64);
    }

    pub fn inc_requests_processed(&self) {
        self.requests_processed.inc();
    }

    pub fn inc_requests_interrupted(&self) {
        self.requests_interrupted.inc();
    }

    pub fn rules_loaded(&self) -> i64 {
        self.rules_loaded.get()
    }

    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.get()
    }

    pub fn requests_interrupted(&self) -> u64 {
        self.requests_interrupted.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collectors_are_independent() {
        let a = MetricsCollector::new().unwrap();
        let b = MetricsCollector::new().unwrap();
        a.inc_requests_processed();
        a.set_rules_loaded(12);
        assert_eq!(a.requests_processed(), 1);
        assert_eq!(b.requests_processed(), 0);
        assert_eq!(a.rules_loaded(), 12);
    }
}

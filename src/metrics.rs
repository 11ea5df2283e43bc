use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    snapshot_requests_total: Counter,
    snapshot_failures_total: Counter,
    probe_errors_total: CounterVec,
    health_check_requests_total: Counter,
    health_check_upstream_errors_total: Counter,
    scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let snapshot_requests_total = Counter::with_opts(opts!(
            "hostsnapd_snapshot_requests_total",
            "Snapshot endpoint requests"
        ))?;
        let snapshot_failures_total = Counter::with_opts(opts!(
            "hostsnapd_snapshot_failures_total",
            "Snapshot requests that failed entirely"
        ))?;
        let probe_errors_total = CounterVec::new(
            opts!("hostsnapd_probe_errors_total", "Probe failures by probe"),
            &["probe"],
        )?;
        let health_check_requests_total = Counter::with_opts(opts!(
            "hostsnapd_health_check_requests_total",
            "Health-check proxy requests"
        ))?;
        let health_check_upstream_errors_total = Counter::with_opts(opts!(
            "hostsnapd_health_check_upstream_errors_total",
            "Health-check requests that never reached the upstream"
        ))?;
        let scrape_count_total = Counter::with_opts(opts!(
            "hostsnapd_scrape_count_total",
            "Metrics endpoint scrapes"
        ))?;

        register(&registry, &snapshot_requests_total)?;
        register(&registry, &snapshot_failures_total)?;
        register(&registry, &probe_errors_total)?;
        register(&registry, &health_check_requests_total)?;
        register(&registry, &health_check_upstream_errors_total)?;
        register(&registry, &scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            snapshot_requests_total,
            snapshot_failures_total,
            probe_errors_total,
            health_check_requests_total,
            health_check_upstream_errors_total,
            scrape_count_total,
        }))
    }

    pub fn inc_snapshot_request(&self) {
        self.snapshot_requests_total.inc();
    }

    pub fn inc_snapshot_failure(&self) {
        self.snapshot_failures_total.inc();
    }

    pub fn inc_probe_error(&self, probe: &str) {
        self.probe_errors_total.with_label_values(&[probe]).inc();
    }

    pub fn inc_health_check_request(&self) {
        self.health_check_requests_total.inc();
    }

    pub fn inc_health_check_upstream_error(&self) {
        self.health_check_upstream_errors_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_includes_service_counters() {
        let metrics = Metrics::new().expect("metrics should initialize");
        metrics.inc_snapshot_request();
        metrics.inc_probe_error("bios");

        let text = String::from_utf8(metrics.encode_metrics().expect("encoding should work"))
            .expect("exposition is utf-8");
        assert!(text.contains("hostsnapd_snapshot_requests_total 1"));
        assert!(text.contains("probe=\"bios\""));
    }
}

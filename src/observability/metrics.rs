use prometheus::{Counter, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Central registry for all Prometheus metrics.
pub struct MetricsRegistry {
	registry: Registry,

	// Connection/listener metrics
	pub connections_accepted_total: IntCounter,
	pub hijacked_connections_total: IntCounter,
	pub active_connections: IntGauge,

	// CA metrics
	pub leaf_certs_issued_total: IntCounter,
	pub leaf_cert_cache_hits_total: IntCounter,

	// Activity/classification metrics
	pub activities_classified_total: IntCounter,
	pub activities_by_ecosystem_total: IntCounter,
	pub activities_unclassified_total: IntCounter,

	// Policy decision metrics
	pub decisions_allow_total: IntCounter,
	pub decisions_deny_total: IntCounter,
	pub decisions_alert_total: IntCounter,
	pub decision_errors_total: IntCounter,
	pub decision_duration_seconds: Histogram,

	// Secret scanning metrics
	pub secret_findings_total: IntCounter,
	pub secret_scans_total: IntCounter,

	// Portal upload metrics
	pub portal_uploads_total: IntCounter,
	pub portal_upload_failures_total: IntCounter,
	pub portal_upload_duration_seconds: Histogram,

	// Session registry metrics
	pub sessions_active: Gauge,
	pub sessions_ended_total: IntCounter,
}

impl MetricsRegistry {
	pub fn new() -> Self {
		let registry = Registry::new();

		let connections_accepted_total = IntCounter::with_opts(
			Opts::new("pse_connections_accepted_total", "Total connections accepted across all listeners").namespace("pse"),
		)
		.unwrap();

		let hijacked_connections_total = IntCounter::with_opts(
			Opts::new("pse_hijacked_connections_total", "Total CONNECT requests hijacked into the inner TLS listener")
				.namespace("pse"),
		)
		.unwrap();

		let active_connections =
			IntGauge::with_opts(Opts::new("pse_active_connections", "Currently open proxied connections").namespace("pse"))
				.unwrap();

		let leaf_certs_issued_total = IntCounter::with_opts(
			Opts::new("pse_leaf_certs_issued_total", "Total leaf certificates minted by the root CA").namespace("pse"),
		)
		.unwrap();

		let leaf_cert_cache_hits_total = IntCounter::with_opts(
			Opts::new("pse_leaf_cert_cache_hits_total", "Total leaf certificate cache hits").namespace("pse"),
		)
		.unwrap();

		let activities_classified_total = IntCounter::with_opts(
			Opts::new("pse_activities_classified_total", "Total requests classified into an ecosystem activity")
				.namespace("pse"),
		)
		.unwrap();

		let activities_by_ecosystem_total = IntCounter::with_opts(
			Opts::new("pse_activities_by_ecosystem_total", "Total activities, labeled by ecosystem at call site").namespace("pse"),
		)
		.unwrap();

		let activities_unclassified_total = IntCounter::with_opts(
			Opts::new("pse_activities_unclassified_total", "Total requests that fell back to a generic web activity")
				.namespace("pse"),
		)
		.unwrap();

		let decisions_allow_total =
			IntCounter::with_opts(Opts::new("pse_decisions_allow_total", "Total allow decisions").namespace("pse")).unwrap();

		let decisions_deny_total =
			IntCounter::with_opts(Opts::new("pse_decisions_deny_total", "Total deny decisions").namespace("pse")).unwrap();

		let decisions_alert_total =
			IntCounter::with_opts(Opts::new("pse_decisions_alert_total", "Total alert decisions").namespace("pse")).unwrap();

		let decision_errors_total = IntCounter::with_opts(
			Opts::new("pse_decision_errors_total", "Total policy decider errors").namespace("pse"),
		)
		.unwrap();

		let decision_duration_seconds = Histogram::with_opts(
			HistogramOpts::new("pse_decision_duration_seconds", "Duration of policy decider calls in seconds")
				.namespace("pse")
				.buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
		)
		.unwrap();

		let secret_findings_total = IntCounter::with_opts(
			Opts::new("pse_secret_findings_total", "Total secret findings across all scans").namespace("pse"),
		)
		.unwrap();

		let secret_scans_total =
			IntCounter::with_opts(Opts::new("pse_secret_scans_total", "Total secret scans performed").namespace("pse")).unwrap();

		let portal_uploads_total = IntCounter::with_opts(
			Opts::new("pse_portal_uploads_total", "Total portal upload attempts").namespace("pse"),
		)
		.unwrap();

		let portal_upload_failures_total = IntCounter::with_opts(
			Opts::new("pse_portal_upload_failures_total", "Total portal upload failures").namespace("pse"),
		)
		.unwrap();

		let portal_upload_duration_seconds = Histogram::with_opts(
			HistogramOpts::new("pse_portal_upload_duration_seconds", "Duration of portal uploads in seconds")
				.namespace("pse")
				.buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
		)
		.unwrap();

		let sessions_active =
			Gauge::with_opts(Opts::new("pse_sessions_active", "Currently tracked build sessions").namespace("pse")).unwrap();

		let sessions_ended_total = IntCounter::with_opts(
			Opts::new("pse_sessions_ended_total", "Total sessions finalized and uploaded").namespace("pse"),
		)
		.unwrap();

		for m in [
			Box::new(connections_accepted_total.clone()) as Box<dyn prometheus::core::Collector>,
			Box::new(hijacked_connections_total.clone()),
			Box::new(leaf_certs_issued_total.clone()),
			Box::new(leaf_cert_cache_hits_total.clone()),
			Box::new(activities_classified_total.clone()),
			Box::new(activities_by_ecosystem_total.clone()),
			Box::new(activities_unclassified_total.clone()),
			Box::new(decisions_allow_total.clone()),
			Box::new(decisions_deny_total.clone()),
			Box::new(decisions_alert_total.clone()),
			Box::new(decision_errors_total.clone()),
			Box::new(secret_findings_total.clone()),
			Box::new(secret_scans_total.clone()),
			Box::new(portal_uploads_total.clone()),
			Box::new(portal_upload_failures_total.clone()),
			Box::new(sessions_ended_total.clone()),
		] {
			registry.register(m).unwrap();
		}
		registry.register(Box::new(active_connections.clone())).unwrap();
		registry.register(Box::new(decision_duration_seconds.clone())).unwrap();
		registry.register(Box::new(portal_upload_duration_seconds.clone())).unwrap();
		registry.register(Box::new(sessions_active.clone())).unwrap();

		Self {
			registry,
			connections_accepted_total,
			hijacked_connections_total,
			active_connections,
			leaf_certs_issued_total,
			leaf_cert_cache_hits_total,
			activities_classified_total,
			activities_by_ecosystem_total,
			activities_unclassified_total,
			decisions_allow_total,
			decisions_deny_total,
			decisions_alert_total,
			decision_errors_total,
			decision_duration_seconds,
			secret_findings_total,
			secret_scans_total,
			portal_uploads_total,
			portal_upload_failures_total,
			portal_upload_duration_seconds,
			sessions_active,
			sessions_ended_total,
		}
	}

	/// Encode metrics in Prometheus text format.
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		match encoder.encode_to_string(&metric_families) {
			Ok(s) => s,
			Err(e) => {
				eprintln!("Failed to encode metrics: {}", e);
				String::new()
			}
		}
	}
}

impl Default for MetricsRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Initialize the global metrics registry.
pub fn init_metrics() -> anyhow::Result<Arc<MetricsRegistry>> {
	Ok(Arc::new(MetricsRegistry::new()))
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn metrics_registry_creation() {
		let registry = super::MetricsRegistry::new();
		assert!(!registry.encode().is_empty());
	}

	#[test]
	fn metrics_increment() {
		let registry = super::MetricsRegistry::new();
		registry.connections_accepted_total.inc();
		registry.decisions_deny_total.inc_by(3);
		assert!(!registry.encode().is_empty());
	}
}

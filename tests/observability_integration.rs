use pse_proxy::observability::{init_metrics, MetricsRegistry};

#[test]
fn fresh_registry_exposes_every_metric_family_at_zero() {
	let registry = MetricsRegistry::new();
	let output = registry.encode();

	for name in [
		"pse_connections_accepted_total",
		"pse_hijacked_connections_total",
		"pse_active_connections",
		"pse_leaf_certs_issued_total",
		"pse_activities_classified_total",
		"pse_decisions_allow_total",
		"pse_decisions_deny_total",
		"pse_decisions_alert_total",
		"pse_decision_duration_seconds",
		"pse_secret_findings_total",
		"pse_portal_uploads_total",
		"pse_sessions_active",
		"pse_sessions_ended_total",
	] {
		assert!(output.contains(name), "missing metric family: {name}");
	}
}

#[test]
fn counters_and_gauges_reflect_recorded_values() {
	let registry = MetricsRegistry::new();

	registry.connections_accepted_total.inc();
	registry.connections_accepted_total.inc();
	registry.decisions_deny_total.inc();
	registry.active_connections.set(3);
	registry.sessions_active.set(2.0);

	let output = registry.encode();
	assert!(output.contains("pse_connections_accepted_total 2"));
	assert!(output.contains("pse_decisions_deny_total 1"));
	assert!(output.contains("pse_active_connections 3"));
	assert!(output.contains("pse_sessions_active 2"));
}

#[test]
fn decision_duration_histogram_records_observations() {
	let registry = MetricsRegistry::new();
	let timer = registry.decision_duration_seconds.start_timer();
	drop(timer);

	let output = registry.encode();
	assert!(output.contains("pse_decision_duration_seconds_bucket"));
	assert!(output.contains("pse_decision_duration_seconds_sum"));
	assert!(output.contains("pse_decision_duration_seconds_count 1"));
}

#[test]
fn init_metrics_returns_an_encodable_registry() {
	let metrics = init_metrics().unwrap();
	assert!(!metrics.encode().is_empty());
}

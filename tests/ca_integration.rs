use std::sync::Arc;

use pse_proxy::ca::{RootCa, SniResolver};
use pse_proxy::observability::MetricsRegistry;
use pse_proxy::tls_utils::build_server_config_with_resolver;

fn test_metrics() -> Arc<MetricsRegistry> {
	Arc::new(MetricsRegistry::new())
}

#[test]
fn issued_leaf_is_cached_per_sni() {
	let dir = tempfile::tempdir().unwrap();
	let ca = RootCa::load_or_create(dir.path().to_str().unwrap(), test_metrics()).unwrap();

	let first = ca.issue("registry.npmjs.org").unwrap();
	let second = ca.issue("registry.npmjs.org").unwrap();
	assert!(Arc::ptr_eq(&first, &second), "issuing the same SNI twice should hit the leaf cache");

	let other = ca.issue("pypi.org").unwrap();
	assert!(!Arc::ptr_eq(&first, &other), "different SNIs must get distinct leaf certificates");
}

#[test]
fn root_cert_persists_across_reload() {
	let dir = tempfile::tempdir().unwrap();
	let first = RootCa::load_or_create(dir.path().to_str().unwrap(), test_metrics()).unwrap();
	let second = RootCa::load_or_create(dir.path().to_str().unwrap(), test_metrics()).unwrap();
	assert_eq!(first.root_cert_der(), second.root_cert_der(), "a second load must reuse the persisted root, not mint a new one");
}

#[test]
fn server_config_built_from_sni_resolver_has_expected_alpn() {
	let dir = tempfile::tempdir().unwrap();
	let ca = Arc::new(RootCa::load_or_create(dir.path().to_str().unwrap(), test_metrics()).unwrap());
	let resolver = Arc::new(SniResolver::new(ca));
	let cfg = build_server_config_with_resolver(resolver).unwrap();
	assert_eq!(cfg.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
}

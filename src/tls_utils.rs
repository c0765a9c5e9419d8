use std::sync::Arc;

use anyhow::Result;
use tokio_rustls::rustls::{self, server::ServerConfig};

/// Build a rustls `ServerConfig` that resolves a certificate dynamically
/// per-SNI instead of serving one static cert, for the CA-issued-leaf-cert
/// listeners. Grounded on `proxy.go`'s `appProxy.TLSConfig.GetCertificate`
/// callback, generalized to rustls's `ResolvesServerCert` trait. TLS 1.2 is
/// allowed here to match the original proxy's `tls.VersionTLS12` minimum for
/// client compatibility.
pub fn build_server_config_with_resolver(
	resolver: Arc<dyn rustls::server::ResolvesServerCert>,
) -> Result<Arc<ServerConfig>> {
	let mut cfg = ServerConfig::builder()
		.with_safe_default_cipher_suites()
		.with_safe_default_kx_groups()
		.with_protocol_versions(rustls::ALL_VERSIONS)
		.map_err(|e| anyhow::anyhow!("failed to negotiate protocol versions: {:?}", e))?
		.with_no_client_auth()
		.with_cert_resolver(resolver);
	cfg.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
	Ok(Arc::new(cfg))
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::ca::RootCa;
	use crate::observability::MetricsRegistry;

	#[test]
	fn resolver_config_negotiates_all_protocol_versions() {
		let dir = tempfile::tempdir().unwrap();
		let metrics = Arc::new(MetricsRegistry::new());
		let ca = Arc::new(RootCa::load_or_create(dir.path().to_str().unwrap(), metrics).unwrap());
		let resolver = Arc::new(crate::ca::SniResolver::new(ca));
		let cfg = build_server_config_with_resolver(resolver).unwrap();
		assert_eq!(cfg.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
	}
}

//! Reverse-proxies an intercepted request to its real origin. Grounded on
//! `proxy/proxy.go`'s `appProxy`/`createDynamicTLSConfig`: the upstream
//! trust store always includes the local root CA alongside the system
//! roots, so traffic re-intercepted by another instance of this proxy (or
//! by a corporate TLS-inspecting gateway sharing the same root) still
//! verifies. Built once at startup instead of rebuilt per request under a
//! mutex — `reqwest::Client` is immutable and cheaply cloned, and the CA
//! material never changes once the process starts, so there's nothing to
//! gain from reconstructing the trust anchor set on every call.

use std::collections::HashMap;
use std::time::Duration;

use hyper::Method;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct UpstreamResponse {
	pub status: u16,
	pub headers: HashMap<String, String>,
	pub body: Vec<u8>,
}

pub struct UpstreamClient {
	client: reqwest::Client,
}

impl UpstreamClient {
	/// `root_ca_pem` is the root certificate's PEM encoding (as persisted to
	/// `root.pem`), added to the client's trust store alongside the
	/// platform's native roots.
	pub fn new(root_ca_pem: &[u8]) -> anyhow::Result<Self> {
		let ca_cert = reqwest::Certificate::from_pem(root_ca_pem)?;
		let client = reqwest::Client::builder()
			.use_rustls_tls()
			.add_root_certificate(ca_cert)
			.tls_built_in_root_certs(true)
			.connect_timeout(CONNECT_TIMEOUT)
			.timeout(REQUEST_TIMEOUT)
			.build()?;
		Ok(Self { client })
	}

	pub async fn forward(
		&self,
		method: &Method,
		url: &str,
		headers: HashMap<String, String>,
		body: Vec<u8>,
	) -> anyhow::Result<UpstreamResponse> {
		let method = reqwest::Method::from_bytes(method.as_str().as_bytes())?;
		let mut req = self.client.request(method, url);
		for (k, v) in headers.iter().filter(|(k, _)| !k.eq_ignore_ascii_case("host")) {
			req = req.header(k, v);
		}

		let resp = req.body(body).send().await?;
		let status = resp.status().as_u16();
		let headers = resp
			.headers()
			.iter()
			.filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
			.collect();
		let body = resp.bytes().await?.to_vec();
		Ok(UpstreamResponse { status, headers, body })
	}
}

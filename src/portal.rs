//! Uploads a finished build's activity record to the portal. Ties off the
//! session registry's `end` (C7 §4.9): grounded on `session.go`'s `End`,
//! which gzip-compresses the JSON `Build` and POSTs it to the ingestion
//! endpoint. Upload failure is logged only — the session is already
//! popped from the registry by the time this runs, so there's nothing to
//! roll back.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::model::Build;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct PortalClient {
	client: reqwest::Client,
	portal_url: String,
	api_key: String,
}

impl PortalClient {
	pub fn new(portal_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
		let client = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
		Ok(Self { client, portal_url: portal_url.into(), api_key: api_key.into() })
	}

	pub async fn upload(&self, build: &Build) -> anyhow::Result<()> {
		let json = serde_json::to_vec(build)?;
		let gzipped = gzip(&json)?;

		let url = format!("{}/ingestionapi/v1/proxy_data?api_key={}", self.portal_url.trim_end_matches('/'), self.api_key);

		let resp = self
			.client
			.post(&url)
			.header("Content-Type", "application/json")
			.header("Content-Encoding", "gzip")
			.body(gzipped)
			.send()
			.await?;

		resp.error_for_status()?;
		Ok(())
	}
}

fn gzip(data: &[u8]) -> anyhow::Result<Vec<u8>> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(data)?;
	Ok(encoder.finish()?)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn gzip_round_trips_through_flate2() {
		let data = b"hello, portal";
		let compressed = gzip(data).unwrap();
		assert_ne!(compressed, data);

		let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
		let mut out = String::new();
		std::io::Read::read_to_string(&mut decoder, &mut out).unwrap();
		assert_eq!(out, "hello, portal");
	}
}

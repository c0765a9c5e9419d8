//! The outer plain-TCP listener: speaks just enough HTTP/1.1 to recognize
//! `CONNECT`, hijacks the underlying socket on a successful tunnel
//! request, and hands it to the inner TLS-terminating server via the
//! hijack channel. Grounded on `proxy/proxy.go`'s `ServeHTTP` CONNECT
//! branch and `proxy/listener.go`'s `AppListner`.

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Empty;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::hijack::HijackHandle;

pub async fn serve(addr: SocketAddr, hijack: HijackHandle) -> anyhow::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	tracing::info!(%addr, "outer CONNECT listener started");

	loop {
		let (stream, peer) = match listener.accept().await {
			Ok(v) => v,
			Err(e) => {
				tracing::warn!(error = %e, "accept failed on outer listener");
				continue;
			}
		};
		let _ = stream.set_nodelay(true);
		let hijack = hijack.clone();

		tokio::spawn(async move {
			let io = TokioIo::new(stream);
			let conn = http1::Builder::new()
				.serve_connection(io, service_fn(move |req| handle_connect(req, peer, hijack.clone())))
				.with_upgrades();
			if let Err(e) = conn.await {
				tracing::debug!(error = %e, %peer, "outer connection ended");
			}
		});
	}
}

/// Extracts a client-supplied remote address from `Forwarded: for=<ip>`,
/// the same override the policy handler's `remoteIp` respects when the
/// proxy itself sits behind another forwarding hop.
fn forwarded_for(headers: &hyper::HeaderMap) -> Option<String> {
	let value = headers.get("forwarded")?.to_str().ok()?;
	value.split(';').find_map(|part| part.trim().strip_prefix("for=").map(|s| s.trim_matches('"').to_string()))
}

async fn handle_connect(
	req: Request<Incoming>,
	peer: SocketAddr,
	hijack: HijackHandle,
) -> Result<Response<Empty<Bytes>>, Infallible> {
	if req.method() != Method::CONNECT {
		let mut resp = Response::new(Empty::new());
		*resp.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
		return Ok(resp);
	}

	let remote_addr = forwarded_for(req.headers()).unwrap_or_else(|| peer.ip().to_string());

	tokio::spawn(async move {
		match hyper::upgrade::on(req).await {
			Ok(upgraded) => {
				let io = TokioIo::new(upgraded);
				if let Err(e) = hijack.push(remote_addr, Box::new(io)).await {
					tracing::warn!(error = %e, "failed to push hijacked connection");
				}
			}
			Err(e) => tracing::warn!(error = %e, "CONNECT upgrade failed"),
		}
	});

	let mut resp = Response::new(Empty::new());
	*resp.status_mut() = StatusCode::OK;
	Ok(resp)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn forwarded_for_parses_quoted_ip() {
		let mut headers = hyper::HeaderMap::new();
		headers.insert("forwarded", "for=\"10.0.0.9\";proto=https".parse().unwrap());
		assert_eq!(forwarded_for(&headers).as_deref(), Some("10.0.0.9"));
	}

	#[test]
	fn forwarded_for_is_none_without_the_header() {
		let headers = hyper::HeaderMap::new();
		assert!(forwarded_for(&headers).is_none());
	}
}

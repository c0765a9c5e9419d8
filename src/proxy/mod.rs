//! The three-listener proxy front end. Grounded on `proxy/proxy.go`: a
//! plain-TCP listener hijacks CONNECT tunnels into a synthetic channel, a
//! second listener accepts already-TLS connections from build systems that
//! dial it directly, and both funnel into the same leaf-cert-terminating
//! TLS acceptor and request handler.

pub mod control;
pub mod dispatch;
pub mod inner;
pub mod outer;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_rustls::TlsAcceptor;

use crate::ca::SniResolver;
use crate::hijack::HijackListener;
use crate::state::AppState;
use crate::tls_utils::build_server_config_with_resolver;

const OUTER_ADDR: &str = "0.0.0.0:3128";
const PASSTHROUGH_ADDR: &str = "0.0.0.0:12345";

/// Starts all three listeners and runs until one of them exits, which only
/// happens on a bind failure — each listener's own accept loop retries past
/// transient per-connection errors.
pub async fn run(state: AppState) -> anyhow::Result<()> {
	let resolver = Arc::new(SniResolver::new(state.root_ca.clone()));
	let server_cfg = build_server_config_with_resolver(resolver)?;
	let acceptor = TlsAcceptor::from(server_cfg);

	let hijack_listener = HijackListener::new();
	let hijack_handle = hijack_listener.handle();

	let outer_addr: SocketAddr = OUTER_ADDR.parse().expect("valid outer listen address");
	let passthrough_addr: SocketAddr = PASSTHROUGH_ADDR.parse().expect("valid passthrough listen address");

	let outer_task = tokio::spawn(outer::serve(outer_addr, hijack_handle));

	let passthrough_task = {
		let state = state.clone();
		let acceptor = acceptor.clone();
		tokio::spawn(async move { inner::serve_tls_passthrough(passthrough_addr, acceptor, state).await })
	};

	let hijack_task = {
		let state = state.clone();
		tokio::spawn(async move { inner::serve_hijacked(hijack_listener, acceptor, state).await })
	};

	tokio::select! {
		res = outer_task => res??,
		res = passthrough_task => res??,
		res = hijack_task => res??,
	}

	Ok(())
}

//! A synthetic `tokio` listener fed by hijacked CONNECT sockets instead of
//! a real `accept()` loop. Grounded on `proxy/listener.go`'s `AppListner`:
//! a 100-deep channel of `net.Conn` that the outer CONNECT handler writes
//! into and the inner TLS-terminating server treats as its accept source.
//!
//! The Go original hijacks the raw `net.Conn` straight from the HTTP
//! server. Hyper's equivalent is an upgraded connection (`hyper::upgrade::
//! Upgraded`), so the channel carries a boxed transport rather than a
//! concrete `TcpStream`.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 100;

pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub type HijackedStream = Box<dyn Transport>;

/// A hijacked socket paired with the remote address the outer CONNECT
/// handler observed for it (optionally overridden by a `Forwarded: for=`
/// header). `net.Conn` carries its own `RemoteAddr()`; a boxed trait object
/// doesn't, so it travels alongside the stream instead.
pub struct Hijacked {
	pub remote_addr: String,
	pub stream: HijackedStream,
}

pub struct HijackListener {
	sender: mpsc::Sender<Hijacked>,
	receiver: mpsc::Receiver<Hijacked>,
}

impl HijackListener {
	pub fn new() -> Self {
		let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
		Self { sender, receiver }
	}

	pub fn handle(&self) -> HijackHandle {
		HijackHandle { sender: self.sender.clone() }
	}

	/// Waits for the next hijacked connection. Returns `None` once every
	/// sending handle has been dropped.
	pub async fn accept(&mut self) -> Option<Hijacked> {
		self.receiver.recv().await
	}
}

impl Default for HijackListener {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone)]
pub struct HijackHandle {
	sender: mpsc::Sender<Hijacked>,
}

impl HijackHandle {
	/// Hands a hijacked CONNECT socket to the inner TLS server.
	pub async fn push(&self, remote_addr: String, stream: HijackedStream) -> anyhow::Result<()> {
		self.sender
			.send(Hijacked { remote_addr, stream })
			.await
			.map_err(|_| anyhow::anyhow!("hijack listener closed"))
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use tokio::io::duplex;

	#[tokio::test]
	async fn accept_returns_none_after_all_handles_dropped() {
		let mut listener = HijackListener::new();
		let handle = listener.handle();
		drop(handle);
		assert!(listener.accept().await.is_none());
	}

	#[tokio::test]
	async fn pushed_connection_is_observed_by_accept() {
		let mut listener = HijackListener::new();
		let handle = listener.handle();

		let (a, _b) = duplex(64);
		handle.push("10.0.0.1".to_string(), Box::new(a)).await.unwrap();
		let hijacked = listener.accept().await.unwrap();
		assert_eq!(hijacked.remote_addr, "10.0.0.1");
	}
}

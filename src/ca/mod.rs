//! Root certificate authority: one self-signed root persisted on disk,
//! leaf certificates minted on demand and cached per SNI. Grounded on the
//! upstream proxy's own `ca` package (`goca.New`/`goca.Load`, mutex-guarded
//! `IssueCertificate`), reimplemented on `rcgen` since that's the crate
//! already pinned in this workspace for certificate generation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SanType};
use rustls::sign::CertifiedKey;
use thiserror::Error;
use tokio_rustls::rustls::{self, Certificate as RustlsCertificate, PrivateKey};

use crate::observability::MetricsRegistry;

const ROOT_CERT_FILE: &str = "root.pem";
const ROOT_KEY_FILE: &str = "root.key.pem";

/// Typed failures at the certificate-authority boundary: callers glue this
/// into `anyhow::Result` via `?` and `.context()` for the surrounding
/// filesystem operation, matching the teacher's `anyhow`-at-the-edges /
/// `thiserror`-at-the-seams split.
#[derive(Debug, Error)]
pub enum CaError {
	#[error("generating leaf key pair for {sni}: {source}")]
	LeafKeyGen { sni: String, #[source] source: rcgen::RcgenError },
	#[error("signing leaf certificate for {sni}: {source}")]
	LeafSign { sni: String, #[source] source: rcgen::RcgenError },
	#[error("loading signing key for {sni}: {source}")]
	SigningKey { sni: String, #[source] source: rustls::Error },
	#[error("root certificate file contained no certificates")]
	EmptyRootCertFile,
}

fn root_distinguished_name() -> DistinguishedName {
	let mut dn = DistinguishedName::new();
	dn.push(DnType::OrganizationName, "InvisiRisk, Inc.");
	dn.push(DnType::OrganizationalUnitName, "PSE-Proxy Certificates");
	dn.push(DnType::LocalityName, "Houston");
	dn.push(DnType::StateOrProvinceName, "Texas");
	dn.push(DnType::CountryName, "US");
	dn.push(DnType::CommonName, "invisirisk.com");
	dn
}

fn root_params(key_pair: Option<KeyPair>) -> CertificateParams {
	let mut params = CertificateParams::new(vec!["invisirisk.com".to_string()]);
	params.distinguished_name = root_distinguished_name();
	params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
	if let Some(kp) = key_pair {
		params.key_pair = Some(kp);
	}
	params
}

/// Directory layout and in-memory handle for the root CA plus its issued
/// leaf cache. The base directory defaults to `/tmp/ca/pse`, overridable
/// via `PSE_CA_DIR` (the upstream proxy hardcodes `/tmp/ca`; this crate
/// makes it configurable since a real deployment will want that).
pub struct RootCa {
	base_dir: PathBuf,
	signer: Certificate,
	root_cert_der: Vec<u8>,
	leaves: Mutex<HashMap<String, Arc<CertifiedKey>>>,
	metrics: Arc<MetricsRegistry>,
}

impl RootCa {
	/// Load the root CA from `base_dir` if present, otherwise generate and
	/// persist a new one. Failure at either step is fatal to startup.
	pub fn load_or_create(base_dir: impl Into<PathBuf>, metrics: Arc<MetricsRegistry>) -> Result<Self> {
		let base_dir = base_dir.into();
		fs::create_dir_all(&base_dir)
			.with_context(|| format!("creating CA directory {}", base_dir.display()))?;

		let cert_path = base_dir.join(ROOT_CERT_FILE);
		let key_path = base_dir.join(ROOT_KEY_FILE);

		let (signer, root_cert_der) = if cert_path.exists() && key_path.exists() {
			Self::load_existing(&cert_path, &key_path).context("loading existing root CA")?
		} else {
			Self::generate_new(&cert_path, &key_path).context("generating new root CA")?
		};

		Ok(Self {
			base_dir,
			signer,
			root_cert_der,
			leaves: Mutex::new(HashMap::new()),
			metrics,
		})
	}

	fn generate_new(cert_path: &Path, key_path: &Path) -> Result<(Certificate, Vec<u8>)> {
		let params = root_params(None);
		let cert = Certificate::from_params(params).context("generating root key pair")?;
		let cert_der = cert.serialize_der().context("self-signing root certificate")?;
		let key_pem = cert.serialize_private_key_pem();
		let cert_pem = cert.serialize_pem().context("PEM-encoding root certificate")?;

		write_restricted(key_path, key_pem.as_bytes(), 0o600)?;
		fs::write(cert_path, cert_pem.as_bytes())
			.with_context(|| format!("writing {}", cert_path.display()))?;

		Ok((cert, cert_der))
	}

	fn load_existing(cert_path: &Path, key_path: &Path) -> Result<(Certificate, Vec<u8>)> {
		let key_pem = fs::read_to_string(key_path)
			.with_context(|| format!("reading {}", key_path.display()))?;
		let cert_pem = fs::read_to_string(cert_path)
			.with_context(|| format!("reading {}", cert_path.display()))?;

		let key_pair = KeyPair::from_pem(&key_pem).context("parsing root private key")?;
		let params = root_params(Some(key_pair));
		let cert = Certificate::from_params(params).context("reconstructing root certificate")?;

		let mut reader = std::io::BufReader::new(cert_pem.as_bytes());
		let mut der_certs = rustls_pemfile::certs(&mut reader).context("parsing root certificate PEM")?;
		let cert_der = der_certs.pop().ok_or(CaError::EmptyRootCertFile)?;
		Ok((cert, cert_der))
	}

	/// The root certificate in DER form, served raw from the `/ca` control
	/// endpoint so clients can import it as a trusted root.
	pub fn root_cert_der(&self) -> &[u8] {
		&self.root_cert_der
	}

	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	/// Issue (or return a cached) leaf certificate for `sni`. Serialized by
	/// the leaves lock, so concurrent handshakes for the same name never
	/// mint two certificates.
	pub fn issue(&self, sni: &str) -> std::result::Result<Arc<CertifiedKey>, CaError> {
		let mut leaves = self.leaves.lock().expect("CA leaf cache mutex poisoned");
		if let Some(existing) = leaves.get(sni) {
			self.metrics.leaf_cert_cache_hits_total.inc();
			return Ok(existing.clone());
		}

		let mut params = CertificateParams::new(vec![sni.to_string()]);
		params.distinguished_name = {
			let mut dn = DistinguishedName::new();
			dn.push(DnType::CommonName, sni);
			dn
		};
		params.is_ca = IsCa::NoCa;
		params.subject_alt_names = vec![SanType::DnsName(sni.to_string())];

		let leaf_cert = Certificate::from_params(params)
			.map_err(|source| CaError::LeafKeyGen { sni: sni.to_string(), source })?;
		let leaf_der = leaf_cert
			.serialize_der_with_signer(&self.signer)
			.map_err(|source| CaError::LeafSign { sni: sni.to_string(), source })?;
		let leaf_key_der = leaf_cert.serialize_private_key_der();

		let chain = vec![
			RustlsCertificate(leaf_der),
			RustlsCertificate(self.root_cert_der.clone()),
		];
		let signing_key = rustls::sign::any_supported_type(&PrivateKey(leaf_key_der))
			.map_err(|source| CaError::SigningKey { sni: sni.to_string(), source })?;
		let certified = Arc::new(CertifiedKey::new(chain, signing_key));

		leaves.insert(sni.to_string(), certified.clone());
		self.metrics.leaf_certs_issued_total.inc();
		Ok(certified)
	}
}

#[cfg(unix)]
fn write_restricted(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
	use std::os::unix::fs::OpenOptionsExt;
	use std::io::Write;

	let mut f = fs::OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.mode(mode)
		.open(path)
		.with_context(|| format!("opening {} for write", path.display()))?;
	f.write_all(contents)
		.with_context(|| format!("writing {}", path.display()))?;
	Ok(())
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, contents: &[u8], _mode: u32) -> Result<()> {
	fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// A `rustls::server::ResolvesServerCert` backed by the root CA: every SNI
/// gets a freshly-issued-or-cached leaf certificate, keyed on
/// `ClientHello::server_name()`.
pub struct SniResolver {
	ca: Arc<RootCa>,
}

impl SniResolver {
	pub fn new(ca: Arc<RootCa>) -> Self {
		Self { ca }
	}
}

impl std::fmt::Debug for SniResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SniResolver").finish()
	}
}

impl rustls::server::ResolvesServerCert for SniResolver {
	fn resolve(&self, client_hello: rustls::server::ClientHello) -> Option<Arc<CertifiedKey>> {
		let name = client_hello.server_name()?;
		match self.ca.issue(name) {
			Ok(certified) => Some(certified),
			Err(e) => {
				tracing::error!(sni = name, error = %e, "failed to issue leaf certificate");
				None
			}
		}
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	fn test_metrics() -> Arc<MetricsRegistry> {
		Arc::new(MetricsRegistry::new())
	}

	#[test]
	fn generates_and_persists_root_then_reloads() {
		let dir = tempfile::tempdir().unwrap();
		let ca = RootCa::load_or_create(dir.path(), test_metrics()).expect("create root CA");
		assert!(!ca.root_cert_der().is_empty());

		// second load should read the persisted material back, not regenerate
		let ca2 = RootCa::load_or_create(dir.path(), test_metrics()).expect("reload root CA");
		assert_eq!(ca.root_cert_der(), ca2.root_cert_der());
	}

	#[test]
	fn issues_leaf_and_caches_it() {
		let dir = tempfile::tempdir().unwrap();
		let ca = RootCa::load_or_create(dir.path(), test_metrics()).expect("create root CA");

		let first = ca.issue("example.com").expect("issue leaf");
		let second = ca.issue("example.com").expect("issue leaf again");
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(ca.metrics.leaf_cert_cache_hits_total.get(), 1);
	}

	#[test]
	fn issues_distinct_leaves_per_name() {
		let dir = tempfile::tempdir().unwrap();
		let ca = RootCa::load_or_create(dir.path(), test_metrics()).expect("create root CA");

		let a = ca.issue("a.example.com").expect("issue a");
		let b = ca.issue("b.example.com").expect("issue b");
		assert!(!Arc::ptr_eq(&a, &b));
		assert_eq!(ca.metrics.leaf_certs_issued_total.get(), 2);
	}
}

pub mod ca;
pub mod config;
pub mod ecosystem;
pub mod hijack;
pub mod inspectors;
pub mod model;
pub mod observability;
pub mod policy;
pub mod portal;
pub mod proxy;
pub mod reader_chain;
pub mod session;
pub mod state;
pub mod tls_utils;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{RepoConfig, Settings};
use crate::inspectors::secret_scan::SecretRules;
use crate::policy::{HttpDecider, NoopDecider, PolicyDecider};
use crate::portal::PortalClient;
use crate::proxy::upstream::UpstreamClient;
use crate::session::SessionRegistry;
use crate::state::AppState;

/// The `serve` subcommand's flags, overlaid onto the environment-sourced
/// `Settings`. Grounded on `main.go`'s flag set: a policy endpoint, the
/// ecosystem-prefix allowlist file, the secret-scanning rule file, and the
/// global-session toggle.
pub struct ServeOptions {
	pub policy_endpoint: Option<String>,
	pub repo_config_path: PathBuf,
	pub leaks_path: PathBuf,
	pub global_session: bool,
}

/// Boots observability, configuration, the root CA, and every shared
/// dependency, then runs the proxy's three listeners until one exits.
pub async fn run(opts: ServeOptions) -> anyhow::Result<()> {
	let obs_state = observability::init_observability().await?;

	let mut settings = config::load().unwrap_or_else(|e| {
		tracing::warn!(error = %e, "failed to load settings from environment, using defaults");
		Settings::default()
	});
	settings.global_session = settings.global_session || opts.global_session;

	let repo_config = RepoConfig::parse(&opts.repo_config_path).unwrap_or_else(|e| {
		tracing::warn!(
			error = %e,
			path = %opts.repo_config_path.display(),
			"failed to load repo config, no ecosystem traffic will be recognized"
		);
		RepoConfig::default()
	});

	let secret_rules = if opts.leaks_path.exists() {
		SecretRules::load(&opts.leaks_path).unwrap_or_else(|e| {
			tracing::warn!(error = %e, path = %opts.leaks_path.display(), "failed to load secret rules, scanning disabled");
			SecretRules::empty()
		})
	} else {
		tracing::info!(path = %opts.leaks_path.display(), "no secret rule file found, scanning disabled");
		SecretRules::empty()
	};

	let root_ca = ca::RootCa::load_or_create(&settings.pse_ca_dir, obs_state.metrics.clone())?;
	let root_ca_pem = std::fs::read(root_ca.base_dir().join("root.pem"))?;
	let root_ca = Arc::new(root_ca);

	let decider: Arc<dyn PolicyDecider> = match &opts.policy_endpoint {
		Some(endpoint) => Arc::new(HttpDecider::new(endpoint.clone())?),
		None => {
			tracing::warn!("no policy endpoint configured, every request will be allowed");
			Arc::new(NoopDecider)
		}
	};

	let portal = Arc::new(PortalClient::new(settings.invisirisk_portal.clone(), settings.invisirisk_jwt_token.clone())?);
	let upstream = Arc::new(UpstreamClient::new(&root_ca_pem)?);

	let state = AppState {
		sessions: Arc::new(SessionRegistry::new()),
		root_ca,
		repo_config: Arc::new(repo_config),
		decider,
		portal,
		upstream,
		secret_rules: Arc::new(secret_rules),
		metrics: obs_state.metrics,
		settings: Arc::new(settings),
	};

	tracing::info!(global_session = state.settings.global_session, "pse proxy starting");
	proxy::run(state).await
}

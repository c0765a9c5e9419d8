use std::sync::Arc;

use crate::ca::RootCa;
use crate::config::{RepoConfig, Settings};
use crate::inspectors::secret_scan::SecretRules;
use crate::observability::MetricsRegistry;
use crate::policy::PolicyDecider;
use crate::portal::PortalClient;
use crate::proxy::upstream::UpstreamClient;
use crate::session::SessionRegistry;

/// Shared state handed to the policy handler for every intercepted
/// request: the session registry, the root CA (for leaf issuance and for
/// `/ca`), the ecosystem-prefix config, the policy decider, the portal
/// uploader, the upstream reverse-proxy client, the secret-scan rule set,
/// and the metrics registry. The secret-scan *policy* (whether to scan at
/// all, and what to do on a finding) is not part of this shared state — it
/// comes back per-request from the request-phase decision's
/// `final_secret_decision` and is threaded straight into the response-phase
/// scanner.
#[derive(Clone)]
pub struct AppState {
	pub sessions: Arc<SessionRegistry>,
	pub root_ca: Arc<RootCa>,
	pub repo_config: Arc<RepoConfig>,
	pub decider: Arc<dyn PolicyDecider>,
	pub portal: Arc<PortalClient>,
	pub upstream: Arc<UpstreamClient>,
	pub secret_rules: Arc<SecretRules>,
	pub metrics: Arc<MetricsRegistry>,
	pub settings: Arc<Settings>,
}

//! Two-phase policy decisions for each proxied request. Grounded on
//! `policy/policy.go`'s `Policy`/`PolicyDecider`/`Decision` types: a
//! pluggable decider produces a raw decision document, which is sanitized
//! into a small `Decision` struct and folded onto the activity exactly the
//! way `proxy/policy.go`'s `BuildActivity` does (already implemented as
//! `Activity::apply_decision`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{ActivityKind, AlertLevel};

/// Typed failures at the policy-client boundary: malformed decider config
/// and malformed decision documents both end up here, glued into
/// `anyhow::Result` at the call sites via `?`.
#[derive(Debug, Error)]
pub enum PolicyError {
	#[error("policy url scheme must be https")]
	SchemeNotHttps,
	#[error("policy url has no path elements")]
	NoPathElements,
	#[error("invalid policy url: {0}")]
	InvalidUrl(#[from] url::ParseError),
	#[error("invalid result type for key {0}")]
	MalformedDecision(&'static str),
}

pub const ALLOW: &str = "allow";
pub const DENY: &str = "deny";
pub const ALERT: &str = "alert";

#[derive(Debug, Clone, Serialize)]
pub struct RequestMetadata {
	pub method: String,
	pub url: String,
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPolicyInput {
	pub action: String,
	pub host: String,
	pub details: Value,
	pub package_registry: ActivityKind,
	pub api_key: String,
	pub additional_context: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsePolicyInput {
	pub status_code: u16,
	pub status: String,
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	pub headers: HashMap<String, String>,
	pub request: RequestMetadata,
	pub mime_type: String,
	pub checksum: String,
	pub content_length: f32,
	pub file_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyInput {
	pub is_response_ready: bool,
	pub request: RequestPolicyInput,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response: Option<ResponsePolicyInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyCheck {
	pub policy: String,
	#[serde(rename = "details", default)]
	pub detail: String,
	#[serde(rename = "result", default)]
	pub decision: String,
}

#[derive(Debug, Clone)]
pub struct Decision {
	pub decision: String,
	pub alert_level: AlertLevel,
	pub detail: String,
	pub policy_checks: Vec<PolicyCheck>,
}

impl Default for Decision {
	fn default() -> Self {
		Self { decision: ALLOW.to_string(), alert_level: AlertLevel::None, detail: String::new(), policy_checks: Vec::new() }
	}
}

/// The request-phase decider's secret-scan verdict (`final_secret_decision`
/// in the raw decision document): whether to scan at all, and what to do if
/// the scan finds something. Grounded on `policy.go`'s `SecretCheckDecision`,
/// which stashes this same shape into `utils.SecretPolicyCtx` for the
/// scanner to read back.
#[derive(Debug, Clone)]
pub struct SecretCheckPolicy {
	pub check: bool,
	pub result: String,
	pub alert_level: AlertLevel,
}

impl Default for SecretCheckPolicy {
	/// Matches `defaultSecretCheckDecision`: when the decider's document has
	/// no (or a malformed) `final_secret_decision`, scanning stays on and
	/// defaults to the strictest outcome.
	fn default() -> Self {
		Self { check: true, result: DENY.to_string(), alert_level: AlertLevel::Critical }
	}
}

/// Extracts and parses `final_secret_decision` from a request-phase raw
/// decision document, as `SecretCheckDecision`/`parseDecisionAndLevel` do.
/// Falls back to the default (scan on, deny) when the key is missing or
/// malformed rather than failing the request.
pub fn parse_secret_policy(result: &Value) -> SecretCheckPolicy {
	let Ok(secret_decision) = extract_decision(result, "final_secret_decision") else {
		return SecretCheckPolicy::default();
	};
	let check = secret_decision.get("check").and_then(Value::as_bool).unwrap_or(true);
	let raw_result = secret_decision.get("result").and_then(Value::as_str).unwrap_or(DENY);

	let mut parts = raw_result.splitn(2, '/');
	let head = parts.next().unwrap_or(DENY).to_string();
	let alert_level = match parts.next() {
		Some(level) => AlertLevel::parse_loose(level),
		None if head == DENY => AlertLevel::Critical,
		None => AlertLevel::None,
	};

	SecretCheckPolicy { check, result: head, alert_level }
}

/// The external black-box that actually renders decisions — an OPA bundle
/// in the original, any decision engine reachable at a fixed input/output
/// contract here. Mirrors `policy.go`'s `PolicyDecider` interface.
#[async_trait]
pub trait PolicyDecider: Send + Sync {
	async fn decide(&self, input: &PolicyInput) -> anyhow::Result<Value>;
	async fn stop(&self);
}

/// Default decider when no external endpoint is configured: every request
/// is allowed, letting the crate run standalone. Grounded on `NoopDecider`.
pub struct NoopDecider;

#[async_trait]
impl PolicyDecider for NoopDecider {
	async fn decide(&self, _input: &PolicyInput) -> anyhow::Result<Value> {
		Ok(serde_json::json!({ "final_decision": { "result": "allow" } }))
	}

	async fn stop(&self) {}
}

/// Talks to an external HTTP decision endpoint, posting the `PolicyInput`
/// and expecting the same `{"final_decision": {...}}` shaped document the
/// OPA bundle returns.
pub struct HttpDecider {
	client: reqwest::Client,
	endpoint: String,
}

impl HttpDecider {
	pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
		let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
		Ok(Self { client, endpoint: endpoint.into() })
	}
}

#[async_trait]
impl PolicyDecider for HttpDecider {
	async fn decide(&self, input: &PolicyInput) -> anyhow::Result<Value> {
		let resp = self.client.post(&self.endpoint).json(input).send().await?;
		let body = resp.error_for_status()?.json::<Value>().await?;
		Ok(body)
	}

	async fn stop(&self) {}
}

/// Renders the policy engine's config template by substituting four fixed
/// tokens, the same set `renderPolicy` fills via `text/template` — `str::
/// replace` is proportionate for four tokens so no templating crate is
/// pulled in for this.
pub fn render_policy_template(raw: &str, token: &str, base_url: &str, bundle: &str, policy_log: bool) -> String {
	raw.replace("{{.PolicyToken}}", token)
		.replace("{{.PolicyBaseUrl}}", base_url)
		.replace("{{.PolicyBundle}}", bundle)
		.replace("{{.PolicyLog}}", &policy_log.to_string())
}

/// Splits a policy base URL (`https://host/path/to/bundle.tar.gz`) into the
/// base URL and bundle path the template needs, as `renderPolicy` does via
/// `strings.LastIndex(policyUrl, "/")`.
pub fn split_policy_url(policy_url: &str) -> Result<(&str, &str), PolicyError> {
	let parsed = url::Url::parse(policy_url)?;
	if parsed.scheme() != "https" {
		return Err(PolicyError::SchemeNotHttps);
	}
	if parsed.path().is_empty() || parsed.path() == "/" {
		return Err(PolicyError::NoPathElements);
	}
	let idx = policy_url.rfind('/').ok_or(PolicyError::NoPathElements)?;
	Ok((&policy_url[..idx], &policy_url[idx..]))
}

fn extract_decision(result: &Value, key: &'static str) -> Result<Value, PolicyError> {
	result
		.get(key)
		.filter(|v| v.is_object())
		.cloned()
		.ok_or(PolicyError::MalformedDecision(key))
}

/// Parses the OPA-shaped `final_decision.result` string (`"allow"`,
/// `"deny"`, or `"alert/warning"`) into a sanitized `Decision`. Grounded on
/// `PolicyDecision`.
pub fn parse_decision(result: &Value) -> Result<Decision, PolicyError> {
	let final_decision = extract_decision(result, "final_decision")?;
	let decision_str = final_decision
		.get("result")
		.and_then(Value::as_str)
		.ok_or(PolicyError::MalformedDecision("final_decision.result"))?;
	let detail = final_decision.get("details").and_then(Value::as_str).unwrap_or_default().to_string();
	let policy_checks: Vec<PolicyCheck> = final_decision
		.get("policy_checks")
		.and_then(|v| serde_json::from_value(v.clone()).ok())
		.unwrap_or_default();

	let mut parts = decision_str.splitn(2, '/');
	let head = parts.next().unwrap_or(ALLOW);
	match head {
		ALLOW | DENY => Ok(Decision { decision: head.to_string(), alert_level: AlertLevel::None, detail, policy_checks }),
		ALERT => {
			let alert_level = parts.next().map(AlertLevel::parse_loose).unwrap_or(AlertLevel::None);
			Ok(Decision { decision: ALERT.to_string(), alert_level, detail, policy_checks })
		}
		_ => Ok(Decision::default()),
	}
}

/// Merges a list of phase decisions into one final decision: deny always
/// wins, alert level is the maximum seen, details concatenate (skipping
/// allow-decisions, which carry no detail worth keeping), and checks
/// accumulate. Grounded on `generateFinalDecision`.
pub fn generate_final_decision(decisions: &[Decision]) -> Decision {
	let mut final_decision = ALLOW.to_string();
	let mut highest_alert = AlertLevel::None;
	let mut combined_details = String::new();
	let mut combined_checks = Vec::new();

	for d in decisions {
		if d.decision == DENY || final_decision == DENY {
			final_decision = DENY.to_string();
		} else if d.decision == ALERT {
			final_decision = ALERT.to_string();
		}

		if d.decision == ALERT && d.alert_level > highest_alert {
			highest_alert = d.alert_level;
		}

		if d.decision != ALLOW {
			combined_details.push_str(&d.detail);
		}
		combined_checks.extend(d.policy_checks.iter().cloned());
	}

	Decision { decision: final_decision, alert_level: highest_alert, detail: combined_details, policy_checks: combined_checks }
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn template_substitutes_all_four_tokens() {
		let raw = "token={{.PolicyToken}} base={{.PolicyBaseUrl}} bundle={{.PolicyBundle}} log={{.PolicyLog}}";
		let out = render_policy_template(raw, "tok", "https://example.com/bundles", "/b.tar.gz", true);
		assert_eq!(out, "token=tok base=https://example.com/bundles bundle=/b.tar.gz log=true");
	}

	#[test]
	fn split_policy_url_separates_base_and_bundle() {
		let (base, bundle) = split_policy_url("https://example.com/bundles/b.tar.gz").unwrap();
		assert_eq!(base, "https://example.com/bundles");
		assert_eq!(bundle, "/b.tar.gz");
	}

	#[test]
	fn parse_secret_policy_reads_check_result_and_level() {
		let result = serde_json::json!({
			"final_secret_decision": { "check": false, "result": "alert/warning" }
		});
		let policy = parse_secret_policy(&result);
		assert!(!policy.check);
		assert_eq!(policy.result, ALERT);
		assert_eq!(policy.alert_level, AlertLevel::Warning);
	}

	#[test]
	fn parse_secret_policy_defaults_to_scan_on_deny_when_missing() {
		let policy = parse_secret_policy(&serde_json::json!({}));
		assert!(policy.check);
		assert_eq!(policy.result, DENY);
		assert_eq!(policy.alert_level, AlertLevel::Critical);
	}

	#[test]
	fn rejects_non_https_policy_url() {
		assert!(split_policy_url("http://example.com/bundle.tar.gz").is_err());
	}

	#[test]
	fn deny_always_wins_final_decision() {
		let decisions = vec![
			Decision { decision: ALERT.to_string(), alert_level: AlertLevel::Warning, detail: "a".into(), policy_checks: vec![] },
			Decision { decision: DENY.to_string(), alert_level: AlertLevel::None, detail: "b".into(), policy_checks: vec![] },
		];
		let merged = generate_final_decision(&decisions);
		assert_eq!(merged.decision, DENY);
	}

	#[test]
	fn alert_level_takes_the_maximum() {
		let decisions = vec![
			Decision { decision: ALERT.to_string(), alert_level: AlertLevel::Warning, detail: String::new(), policy_checks: vec![] },
			Decision { decision: ALERT.to_string(), alert_level: AlertLevel::Critical, detail: String::new(), policy_checks: vec![] },
		];
		let merged = generate_final_decision(&decisions);
		assert_eq!(merged.decision, ALERT);
		assert_eq!(merged.alert_level, AlertLevel::Critical);
	}

	#[test]
	fn parses_alert_with_level() {
		let result = serde_json::json!({
			"final_decision": { "result": "alert/warning", "details": "watch this" }
		});
		let d = parse_decision(&result).unwrap();
		assert_eq!(d.decision, ALERT);
		assert_eq!(d.alert_level, AlertLevel::Warning);
	}
}

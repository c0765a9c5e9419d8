//! Shared data types describing a build's activity stream: what was
//! fetched, from where, under what ecosystem, and what decision the policy
//! layer reached about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
	Web,
	Git,
	GoModule,
	Maven,
	Npm,
	Pypi,
	Composer,
	Alpine,
	RubyGems,
	Nuget,
}

impl ActivityKind {
	/// The PURL scheme for this ecosystem. `RubyGems` deliberately reports
	/// `"gem"` here: the display name and the PURL scheme component differ,
	/// matching the upstream package registry's own scheme name.
	pub fn purl_scheme(&self) -> &'static str {
		match self {
			ActivityKind::Web => "web",
			ActivityKind::Git => "git",
			ActivityKind::GoModule => "golang",
			ActivityKind::Maven => "maven",
			ActivityKind::Npm => "npm",
			ActivityKind::Pypi => "pypi",
			ActivityKind::Composer => "composer",
			ActivityKind::Alpine => "alpine",
			ActivityKind::RubyGems => "gem",
			ActivityKind::Nuget => "nuget",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityDetails {
	Web {
		url: String,
	},
	Git {
		repo: String,
	},
	Package {
		repo: String,
		package: String,
		version: String,
		purl: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
	Allow,
	Deny,
	Alert,
}

impl Default for Decision {
	fn default() -> Self {
		Decision::Allow
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
	None,
	Warning,
	Error,
	Critical,
}

impl Default for AlertLevel {
	fn default() -> Self {
		AlertLevel::None
	}
}

impl AlertLevel {
	/// Parse the loose string vocabulary used by the policy decider's JSON
	/// output (`"warning"`, `"error"`, `"critical"`, anything else is none).
	pub fn parse_loose(s: &str) -> Self {
		match s.to_ascii_lowercase().as_str() {
			"warning" | "warn" => AlertLevel::Warning,
			"error" => AlertLevel::Error,
			"critical" => AlertLevel::Critical,
			_ => AlertLevel::None,
		}
	}

	/// Score contribution used when folding a policy check into a
	/// `TechCheck`: warning 5, error 3, critical 0, everything else 10.
	pub fn score(&self) -> f64 {
		match self {
			AlertLevel::Warning => 5.0,
			AlertLevel::Error => 3.0,
			AlertLevel::Critical => 0.0,
			AlertLevel::None => 10.0,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechCheck {
	pub name: String,
	pub policy: String,
	pub decision_label: String,
	pub alert_level: AlertLevel,
	pub score: f64,
	pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
	pub kind: ActivityKind,
	pub action: String,
	pub host: String,
	pub details: ActivityDetails,
	#[serde(default)]
	pub decision: Decision,
	#[serde(default)]
	pub alert_level: AlertLevel,
	#[serde(default)]
	pub checks: Vec<TechCheck>,
	pub generated_at: DateTime<Utc>,
}

impl Activity {
	pub fn new(kind: ActivityKind, action: impl Into<String>, host: impl Into<String>, details: ActivityDetails) -> Self {
		Self {
			kind,
			action: action.into(),
			host: host.into(),
			details,
			decision: Decision::Allow,
			alert_level: AlertLevel::None,
			checks: Vec::new(),
			generated_at: Utc::now(),
		}
	}

	/// Apply a phase decision onto the activity following the deny-sticky,
	/// alert-escalation state machine: on the request phase the decision is
	/// taken as-is; on the response phase `deny` always wins and `alert`
	/// only upgrades a still-`allow` activity. `generated_at` is stamped on
	/// every call, so its final value reflects the response-phase time.
	pub fn apply_decision(&mut self, decision: Decision, alert_level: AlertLevel, is_response_phase: bool) {
		if !is_response_phase {
			self.decision = decision;
			self.alert_level = alert_level;
		} else {
			match decision {
				Decision::Deny => {
					self.decision = Decision::Deny;
					self.alert_level = AlertLevel::Critical;
				}
				Decision::Alert if self.decision == Decision::Allow => {
					self.decision = Decision::Alert;
					self.alert_level = alert_level;
				}
				_ => {}
			}
		}
		self.generated_at = Utc::now();
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScmInfo {
	pub kind: String,
	pub origin: String,
	pub commit: String,
	pub prev_commit: String,
	pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
	Unknown,
	Success,
	Aborted,
	Fail,
}

impl BuildStatus {
	pub fn parse_loose(s: &str) -> Self {
		match s.to_ascii_lowercase().as_str() {
			"success" => BuildStatus::Success,
			"aborted" | "canceled" | "cancelled" => BuildStatus::Aborted,
			"failure" | "failed" => BuildStatus::Fail,
			_ => BuildStatus::Unknown,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
	pub id: String,
	pub project: String,
	pub builder: String,
	pub builder_url: String,
	pub build_url: String,
	pub activity: Vec<Activity>,
	pub status: BuildStatus,
	pub start_time: DateTime<Utc>,
	pub end_time: DateTime<Utc>,
	pub scm: ScmInfo,
}

/// One tracked build, keyed by the intercepting connection's remote address
/// (or by `build_url` while pending a scan-id merge). Mirrors the upstream
/// build system's session: accumulated activities plus enough bookkeeping
/// to resolve a Composer-style two-hop lookup (`PackageNameMap`).
#[derive(Debug, Clone)]
pub struct Session {
	pub project: String,
	pub workflow: String,
	pub builder: String,
	pub builder_url: String,
	pub build_url: String,
	pub start_time: DateTime<Utc>,
	pub scm: ScmInfo,
	pub scan_id: String,
	pub activities: Vec<Activity>,
	pub package_name_map: HashMap<String, String>,
}

impl Session {
	pub fn add(&mut self, activity: Activity) {
		self.activities.push(activity);
	}
}

use serde::Deserialize;
use thiserror::Error;

/// Typed failures at the configuration boundary, matching the teacher's
/// `anyhow`-at-the-edges / `thiserror`-at-the-seams split: callers glue
/// this into `anyhow::Result` via `?`, but the distinct failure classes
/// stay nameable here.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("{0} is required")]
	MissingCredential(&'static str),
	#[error("failed to build configuration source: {0}")]
	Source(#[from] config::ConfigError),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime configuration for the proxy.
///
/// Values are loaded from (in order): an optional `config` file and
/// environment variables, then a direct-env override pass for the
/// variables `original_source/main.go` reads unprefixed (`INVISIRISK_*`,
/// `GLOBAL_SESSION`, `POLICY_LOG`, …) — a small, intentionally
/// conservative bootstrap, matching the shape of the rest of this crate's
/// configuration surface.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct Settings {
	pub invisirisk_jwt_token: String,
	pub invisirisk_portal: String,
	pub leaks_file_path: Option<String>,
	pub global_session: bool,
	pub policy_log: bool,
	pub github_token: Option<String>,
	pub openai_auth_token: Option<String>,
	pub pse_ca_dir: String,
	pub log_level: Option<String>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			invisirisk_jwt_token: String::new(),
			invisirisk_portal: String::new(),
			leaks_file_path: None,
			global_session: false,
			policy_log: false,
			github_token: None,
			openai_auth_token: None,
			pse_ca_dir: "/tmp/ca/pse".to_string(),
			log_level: Some("info".to_string()),
		}
	}
}

/// Partial settings used to overlay environment/file values on top of defaults.
#[derive(Debug, Deserialize)]
struct PartialSettings {
	invisirisk_jwt_token: Option<String>,
	invisirisk_portal: Option<String>,
	leaks_file_path: Option<String>,
	global_session: Option<bool>,
	policy_log: Option<bool>,
	github_token: Option<String>,
	openai_auth_token: Option<String>,
	pse_ca_dir: Option<String>,
	log_level: Option<String>,
}

/// Load settings from config file (optional) and environment variables.
pub fn load() -> Result<Settings> {
	let builder = config::Config::builder()
		.add_source(config::File::with_name("config").required(false))
		.add_source(config::Environment::default().separator("__"));

	let cfg = builder.build()?;
	let partial: PartialSettings = cfg.try_deserialize().unwrap_or(PartialSettings {
		invisirisk_jwt_token: None,
		invisirisk_portal: None,
		leaks_file_path: None,
		global_session: None,
		policy_log: None,
		github_token: None,
		openai_auth_token: None,
		pse_ca_dir: None,
		log_level: None,
	});

	let mut s = Settings::default();
	if let Some(v) = partial.invisirisk_jwt_token {
		s.invisirisk_jwt_token = v;
	}
	if let Some(v) = partial.invisirisk_portal {
		s.invisirisk_portal = v;
	}
	if let Some(v) = partial.leaks_file_path {
		s.leaks_file_path = Some(v);
	}
	if let Some(v) = partial.global_session {
		s.global_session = v;
	}
	if let Some(v) = partial.policy_log {
		s.policy_log = v;
	}
	if let Some(v) = partial.github_token {
		s.github_token = Some(v);
	}
	if let Some(v) = partial.openai_auth_token {
		s.openai_auth_token = Some(v);
	}
	if let Some(v) = partial.pse_ca_dir {
		s.pse_ca_dir = v;
	}
	if let Some(v) = partial.log_level {
		s.log_level = Some(v);
	}

	// Explicitly prefer direct environment variables when present, matching
	// `main.go`'s unprefixed `os.Getenv` reads rather than the `config`
	// crate's prefix-scoped environment source.
	if let Ok(v) = std::env::var("INVISIRISK_JWT_TOKEN") {
		if !v.is_empty() {
			s.invisirisk_jwt_token = v;
		}
	}
	if let Ok(v) = std::env::var("INVISIRISK_PORTAL") {
		if !v.is_empty() {
			s.invisirisk_portal = v;
		}
	}
	if let Ok(v) = std::env::var("LEAKS_FILE_PATH") {
		if !v.is_empty() {
			s.leaks_file_path = Some(v);
		}
	}
	if let Ok(v) = std::env::var("GLOBAL_SESSION") {
		s.global_session = v == "true";
	}
	if let Ok(v) = std::env::var("POLICY_LOG") {
		s.policy_log = !v.is_empty();
	}
	if let Ok(v) = std::env::var("GITHUB_TOKEN") {
		if !v.is_empty() {
			s.github_token = Some(v);
		}
	}
	if let Ok(v) = std::env::var("OPENAI_AUTH_TOKEN") {
		if !v.is_empty() {
			s.openai_auth_token = Some(v);
		}
	}
	if let Ok(v) = std::env::var("PSE_CA_DIR") {
		if !v.is_empty() {
			s.pse_ca_dir = v;
		}
	}
	if let Ok(v) = std::env::var("RUST_LOG") {
		if !v.is_empty() {
			s.log_level = Some(v);
		}
	}

	if s.invisirisk_jwt_token.is_empty() {
		return Err(ConfigError::MissingCredential("INVISIRISK_JWT_TOKEN"));
	}
	if s.invisirisk_portal.is_empty() {
		return Err(ConfigError::MissingCredential("INVISIRISK_PORTAL"));
	}

	Ok(s)
}

/// License-check URL derived from the portal base, per
/// `get_license_check_url`.
pub fn license_check_url(settings: &Settings) -> String {
	format!("{}/registry/v1/is-permissive", settings.invisirisk_portal.trim_end_matches('/'))
}

/// The ecosystem-prefix allowlists a build's traffic is dispatched against.
/// Loaded from a YAML file (`cfg.yaml` by default); treated as an external
/// operator-supplied artifact, not generated content — empty lists are
/// valid and simply mean "no traffic of that kind is recognized."
#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
pub struct RepoConfig {
	#[serde(rename = "gomodule-proxies", default)]
	pub go_proxies: Vec<String>,
	#[serde(rename = "git-repos", default)]
	pub git_repos: Vec<String>,
	#[serde(rename = "maven-repos", default)]
	pub maven_repos: Vec<String>,
	#[serde(rename = "npm-repos", default)]
	pub npm_repos: Vec<String>,
	#[serde(rename = "pypi-repos", default)]
	pub pypi_repos: Vec<String>,
	#[serde(rename = "composer-repos", default)]
	pub composer_repos: Vec<String>,
	#[serde(rename = "alpine-repos", default)]
	pub alpine_repos: Vec<String>,
	#[serde(rename = "rubygems-repos", default)]
	pub rubygems_repos: Vec<String>,
	#[serde(rename = "nuget-repos", default)]
	pub nuget_repos: Vec<String>,
}

impl RepoConfig {
	pub fn parse(path: &std::path::Path) -> Result<Self> {
		let cfg = config::Config::builder().add_source(config::File::from(path)).build()?;
		Ok(cfg.try_deserialize()?)
	}
}

/// Matches `host+path` against a prefix list, returning the unmatched
/// remainder the way `matchPath` does (`strings.Index(path, p) == 0`).
pub fn match_path<'a>(haystack: &'a str, prefixes: &[String]) -> Option<&'a str> {
	for p in prefixes {
		if haystack.starts_with(p.as_str()) {
			return Some(&haystack[p.len()..]);
		}
	}
	None
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use std::env;

	#[test]
	fn test_load_requires_credentials() {
		let orig_token = env::var_os("INVISIRISK_JWT_TOKEN");
		let orig_portal = env::var_os("INVISIRISK_PORTAL");
		unsafe { env::remove_var("INVISIRISK_JWT_TOKEN") };
		unsafe { env::remove_var("INVISIRISK_PORTAL") };

		assert!(load().is_err());

		unsafe { env::set_var("INVISIRISK_JWT_TOKEN", "tok") };
		unsafe { env::set_var("INVISIRISK_PORTAL", "https://portal.example.com") };
		let s = load().expect("load should succeed once credentials are set");
		assert_eq!(s.invisirisk_jwt_token, "tok");
		assert_eq!(s.invisirisk_portal, "https://portal.example.com");
		assert_eq!(license_check_url(&s), "https://portal.example.com/registry/v1/is-permissive");

		match orig_token {
			Some(v) => unsafe { env::set_var("INVISIRISK_JWT_TOKEN", v) },
			None => unsafe { env::remove_var("INVISIRISK_JWT_TOKEN") },
		}
		match orig_portal {
			Some(v) => unsafe { env::set_var("INVISIRISK_PORTAL", v) },
			None => unsafe { env::remove_var("INVISIRISK_PORTAL") },
		}
	}

	#[test]
	fn match_path_returns_remainder() {
		let prefixes = vec!["github.com/org/repo".to_string()];
		let remainder = match_path("github.com/org/repo/info/refs", &prefixes).unwrap();
		assert_eq!(remainder, "/info/refs");
	}

	#[test]
	fn match_path_is_none_when_no_prefix_matches() {
		let prefixes = vec!["github.com/org/repo".to_string()];
		assert!(match_path("example.com/other", &prefixes).is_none());
	}
}

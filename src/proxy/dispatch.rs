//! Request classification. Grounded on `proxy/policy.go`'s `handle`:
//! Composer is matched by User-Agent first and, once matched, is never
//! overridden by the prefix-based ecosystems below it. Otherwise the nine
//! ecosystems are tried in a fixed order against the operator-configured
//! prefix lists (`cfg.yaml`); once a prefix matches, that ecosystem's
//! parser verdict is final — even a `None` from it does not fall through
//! to the next ecosystem, only to a generic web activity.

use std::collections::HashMap;

use crate::config::{match_path, RepoConfig};
use crate::ecosystem::{alpine, composer, git, gomodule, maven, npm, nuget, pypi, rubygems};
use crate::model::{Activity, ActivityDetails, ActivityKind};

/// The build system's own control host. Requests to it never reach
/// dispatch; `crate::proxy::inner` intercepts them first.
pub const CONTROL_HOST: &str = "pse.invisirisk.com";

/// Classifies one intercepted request into an `Activity`. `package_name_map`
/// is the owning session's Composer lookup table; callers with no tracked
/// session can pass a throwaway one.
pub fn classify_request(
	host: &str,
	path: &str,
	query: &str,
	user_agent: &str,
	method: &str,
	repo_config: &RepoConfig,
	package_name_map: &mut HashMap<String, String>,
) -> Activity {
	if user_agent.starts_with("Composer") {
		return composer::handle(host, path, package_name_map).unwrap_or_else(|| generic_web(host, path, method));
	}

	let haystack = format!("{}{}", host, path);

	if match_path(&haystack, &repo_config.git_repos).is_some() {
		return git::handle(host, path, query).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.go_proxies).is_some() {
		return gomodule::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.maven_repos).is_some() {
		return maven::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.npm_repos).is_some() {
		return npm::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.pypi_repos).is_some() {
		return pypi::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.alpine_repos).is_some() {
		return alpine::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.rubygems_repos).is_some() {
		return rubygems::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}
	if match_path(&haystack, &repo_config.nuget_repos).is_some() {
		return nuget::handle(host, path).unwrap_or_else(|| generic_web(host, path, method));
	}

	generic_web(host, path, method)
}

fn generic_web(host: &str, path: &str, method: &str) -> Activity {
	Activity::new(
		ActivityKind::Web,
		method.to_ascii_lowercase(),
		host,
		ActivityDetails::Web { url: format!("https://{}{}", host, path) },
	)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn composer_user_agent_short_circuits_dispatch() {
		let mut map = HashMap::new();
		let cfg = RepoConfig::default();
		let act = classify_request("repo.packagist.org", "/downloads/", "", "Composer/2.6.5", "GET", &cfg, &mut map);
		assert_eq!(act.kind, ActivityKind::Web);
	}

	#[test]
	fn unmatched_request_falls_back_to_generic_web() {
		let mut map = HashMap::new();
		let cfg = RepoConfig::default();
		let act = classify_request("example.com", "/whatever", "", "curl/8.0", "GET", &cfg, &mut map);
		assert_eq!(act.kind, ActivityKind::Web);
	}

	#[test]
	fn matched_prefix_dispatches_to_git_parser() {
		let mut map = HashMap::new();
		let cfg = RepoConfig { git_repos: vec!["github.com".to_string()], ..Default::default() };
		let act =
			classify_request("github.com", "/org/repo/git-upload-pack", "", "git/2.40", "POST", &cfg, &mut map);
		assert_eq!(act.kind, ActivityKind::Git);
	}

	#[test]
	fn matched_prefix_with_no_parser_verdict_falls_back_to_web_not_next_ecosystem() {
		// An npm prefix match whose path the parser doesn't recognize should
		// still produce a generic web activity, not fall through to pypi/etc.
		let mut map = HashMap::new();
		let cfg = RepoConfig { npm_repos: vec!["registry.npmjs.org".to_string()], ..Default::default() };
		let act = classify_request("registry.npmjs.org", "/", "", "npm/10", "GET", &cfg, &mut map);
		assert_eq!(act.kind, ActivityKind::Web);
	}
}

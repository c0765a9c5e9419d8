use pse_proxy::config::{match_path, RepoConfig};

#[test]
fn repo_config_parses_yaml_prefix_lists() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cfg.yaml");
	std::fs::write(
		&path,
		r#"
gomodule-proxies:
  - proxy.golang.org
git-repos:
  - github.com
npm-repos:
  - registry.npmjs.org
"#,
	)
	.unwrap();

	let cfg = RepoConfig::parse(&path).unwrap();
	assert_eq!(cfg.go_proxies, vec!["proxy.golang.org".to_string()]);
	assert_eq!(cfg.git_repos, vec!["github.com".to_string()]);
	assert_eq!(cfg.npm_repos, vec!["registry.npmjs.org".to_string()]);
	assert!(cfg.pypi_repos.is_empty());
}

#[test]
fn missing_config_file_is_an_error() {
	let path = std::path::Path::new("/this/path/does/not/exist/cfg.yaml");
	assert!(RepoConfig::parse(path).is_err());
}

#[test]
fn match_path_returns_remainder_of_first_matching_prefix() {
	let prefixes = vec!["github.com/org/".to_string()];
	let remainder = match_path("github.com/org/repo.git", &prefixes);
	assert_eq!(remainder, Some("repo.git"));
	assert!(match_path("gitlab.com/org/repo.git", &prefixes).is_none());
}

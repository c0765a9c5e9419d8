use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

/// `/download/@scope/pkg/version/<sha>` on GitHub's npm registry mirror.
fn github_parse(path: &str) -> Option<(String, String)> {
	let parts: Vec<&str> = path.split('/').collect();
	if parts.len() < 5 {
		return None;
	}
	if parts[1] != "download" {
		return None;
	}
	Some((format!("{}/{}", parts[2], parts[3]), parts[4].to_string()))
}

fn is_scoped(path_parts: &[&str]) -> bool {
	path_parts.first().is_some_and(|p| p.starts_with('@'))
}

fn package_from_dash_segment(path_parts: &[&str]) -> Option<String> {
	let dash_index = path_parts.iter().position(|p| *p == "-")?;
	if dash_index == 0 {
		return None;
	}
	Some(path_parts[..dash_index].join("/"))
}

fn package_from_scoped_url(path_parts: &[&str], filename_base: &str) -> String {
	if let Some(pkg) = package_from_dash_segment(path_parts) {
		return pkg;
	}

	if path_parts.len() >= 2 {
		let scope = path_parts[0];
		let name = path_parts[1];
		if scope.starts_with('@') && name != "-" {
			return format!("{}/{}", scope, name);
		}
	}

	if let Some(stripped) = filename_base.strip_prefix('@') {
		let parts: Vec<&str> = stripped.splitn(2, '-').collect();
		if parts.len() >= 2 {
			return format!("@{}/{}", parts[0], parts[1]);
		}
		return filename_base.to_string();
	}

	if let Some(scope) = path_parts.first().filter(|p| p.starts_with('@')) {
		return format!("{}/{}", scope, filename_base);
	}

	filename_base.to_string()
}

/// Generic `.tgz` tarball URL, scoped (`@scope/name`) or not.
fn parse(npm_path: &str) -> Option<(String, String)> {
	if !npm_path.ends_with(".tgz") {
		return None;
	}
	let npm_path = npm_path.strip_prefix('/').unwrap_or(npm_path);
	let path_parts: Vec<&str> = npm_path.split('/').collect();
	if path_parts.len() < 2 {
		return None;
	}

	let filename = path_parts.last().unwrap().strip_suffix(".tgz").unwrap_or_default();
	let split_index = filename.rfind('-')?;
	let version = filename[split_index + 1..].to_string();
	let filename_base = &filename[..split_index];

	let package = if is_scoped(&path_parts) {
		package_from_scoped_url(&path_parts, filename_base)
	} else {
		filename_base.to_string()
	};

	Some((package, version))
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	let (pkg, version) = if host == "npm.pkg.github.com" {
		github_parse(path)
	} else {
		parse(path)
	}?;

	let purl = purl(ActivityKind::Npm.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::Npm,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn non_scoped_tarball() {
		let act = handle("registry.npmjs.org", "/lodash/-/lodash-4.17.21.tgz").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "lodash");
				assert_eq!(version, "4.17.21");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn scoped_tarball_via_dash_segment() {
		let act = handle("registry.npmjs.org", "/@vitest/runner/-/runner-1.4.0.tgz").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "@vitest/runner");
				assert_eq!(version, "1.4.0");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn github_mirror_download_path() {
		let act = handle(
			"npm.pkg.github.com",
			"/download/@invisirisk/ir-dep-npm/1.0.0/1f1419dafcb227111d4418c2e26c2322adaf8940",
		)
		.unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "@invisirisk/ir-dep-npm");
				assert_eq!(version, "1.0.0");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn rejects_non_tgz() {
		assert!(handle("registry.npmjs.org", "/lodash/-/lodash-4.17.21.json").is_none());
	}
}

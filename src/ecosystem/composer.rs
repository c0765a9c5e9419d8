use std::collections::HashMap;

use crate::model::{Activity, ActivityDetails, ActivityKind};

/// The only ecosystem parser that isn't a pure function: Composer's
/// `codeload.github.com` download carries no package name of its own, so
/// the name has to be recovered from an earlier `repo.packagist.org`
/// lookup stashed in the session's package-name map.
fn parse_packagist_path(url_path: &str) -> Option<String> {
	let parts: Vec<&str> = url_path.split('/').collect();
	if parts.len() < 4 {
		return None;
	}
	Some(format!("{}/{}", parts[2], parts[3]))
}

pub fn handle(host: &str, path: &str, package_name_map: &mut HashMap<String, String>) -> Option<Activity> {
	if host != "repo.packagist.org" && host != "codeload.github.com" {
		return None;
	}

	if host == "codeload.github.com" {
		let segment = path.split('/').nth(2).unwrap_or("");
		let key = segment.split('.').next().unwrap_or("").to_lowercase();
		let package = package_name_map.get(&key).cloned();

		return Some(Activity::new(
			ActivityKind::Composer,
			"get",
			host,
			ActivityDetails::Package {
				repo: host.to_string(),
				package: package.unwrap_or_default(),
				version: String::new(),
				purl: String::new(),
			},
		));
	}

	if path != "/downloads/" {
		if let Some(package_name) = parse_packagist_path(path) {
			let sanitized = package_name.split(".json").next().unwrap_or("").to_lowercase();
			if let Some(name) = sanitized.split('/').nth(1) {
				package_name_map.insert(name.to_string(), sanitized.clone());
			}
		}
	}

	None
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn packagist_lookup_populates_map_and_emits_nothing() {
		let mut map = HashMap::new();
		let act = handle("repo.packagist.org", "/p2/invisirisk/pse.json", &mut map);
		assert!(act.is_none());
		assert_eq!(map.get("pse"), Some(&"invisirisk/pse".to_string()));
	}

	#[test]
	fn codeload_download_resolves_from_map() {
		let mut map = HashMap::new();
		map.insert("pse".to_string(), "invisirisk/pse".to_string());

		let act = handle("codeload.github.com", "/invisirisk/pse/zip/abcdef", &mut map).unwrap();
		match act.details {
			ActivityDetails::Package { package, .. } => assert_eq!(package, "invisirisk/pse"),
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn unrelated_host_is_ignored() {
		let mut map = HashMap::new();
		assert!(handle("example.com", "/whatever", &mut map).is_none());
	}
}

use once_cell::sync::Lazy;
use regex::Regex;

use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

static V3_FLAT_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)/([^/]+)/([^/]+)/[^/]+\.(nupkg|nuspec)$").unwrap());
static V2_PACKAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/package/([^/]+)/([^/]+)/?$").unwrap());

const KNOWN_HOSTS: [&str; 3] = ["api.nuget.org", "www.nuget.org", "pkgs.dev.azure.com"];

fn starts_with_digit(s: &str) -> bool {
	s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn try_regex(re: &Regex, path: &str) -> Option<(String, String)> {
	let caps = re.captures(path)?;
	let pkg = caps.get(1)?.as_str().to_lowercase();
	let version = caps.get(2)?.as_str().to_string();
	if pkg.is_empty() || version.is_empty() || !starts_with_digit(&version) {
		return None;
	}
	Some((pkg, version))
}

fn parse_nuget_url(url_path: &str) -> Option<(String, String)> {
	let url_path = url_path.split('?').next().unwrap_or(url_path);

	if let Some(r) = try_regex(&V3_FLAT_RE, url_path) {
		return Some(r);
	}
	if let Some(r) = try_regex(&V2_PACKAGE_RE, url_path) {
		return Some(r);
	}

	let parts: Vec<&str> = url_path.trim_matches('/').split('/').collect();
	if parts.len() < 2 {
		return None;
	}

	for i in (0..parts.len() - 1).rev() {
		let potential_pkg = parts[i];
		let potential_ver = parts[i + 1];
		if !starts_with_digit(potential_ver) || starts_with_digit(potential_pkg) || potential_ver.is_empty() {
			continue;
		}

		if i + 2 < parts.len() {
			let filename = parts[i + 2].to_lowercase();
			if filename.contains(&potential_pkg.to_lowercase())
				&& filename.contains(potential_ver)
				&& (filename.ends_with(".nupkg") || filename.ends_with(".nuspec"))
			{
				return Some((potential_pkg.to_lowercase(), potential_ver.to_string()));
			}
		} else {
			return Some((potential_pkg.to_lowercase(), potential_ver.to_string()));
		}
	}

	None
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	let host_lower = host.to_lowercase();
	let path_lower = path.to_lowercase();
	if !KNOWN_HOSTS.contains(&host) && !path_lower.contains("nuget") && !host_lower.contains("nuget") {
		return None;
	}

	let (pkg, version) = parse_nuget_url(path)?;
	let purl = purl(ActivityKind::Nuget.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::Nuget,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn v3_flat_container() {
		let act = handle(
			"api.nuget.org",
			"/v3/flatcontainer/newtonsoft.json/13.0.1/newtonsoft.json.13.0.1.nupkg",
		)
		.unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "newtonsoft.json");
				assert_eq!(version, "13.0.1");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn v2_legacy_package_endpoint() {
		let act = handle("www.nuget.org", "/api/v2/package/Newtonsoft.Json/13.0.1").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "newtonsoft.json");
				assert_eq!(version, "13.0.1");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn unrelated_host_and_path_is_ignored() {
		assert!(handle("example.com", "/whatever").is_none());
	}
}

use once_cell::sync::Lazy;
use regex::Regex;

use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

const APK_EXTENSION: &str = ".apk";
const APK_INDEX_FILE: &str = "APKINDEX.tar.gz";

static RELEASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-r\d+$").unwrap());
static FALLBACK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
	vec![
		Regex::new(r"^(.*)-(\d+\.\d+[^-]*)-r\d+$").unwrap(),
		Regex::new(r"^(.*)-(\d{6,8})-r\d+$").unwrap(),
		Regex::new(r"^(.*)-([^-]+)-r\d+$").unwrap(),
	]
});
static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
	vec![
		Regex::new(r"^\d+\.\d+").unwrap(),
		Regex::new(r"^\d{8}").unwrap(),
		Regex::new(r"^\d+_").unwrap(),
	]
});
static DIGIT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+").unwrap());

fn base_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

/// Strip the trailing `-rN` release segment, returning `(base, release)`.
fn parse_release(filename: &str) -> Option<(&str, &str)> {
	let m = RELEASE_RE.find(filename)?;
	Some((&filename[..m.start()], m.as_str()))
}

/// Walk hyphen-separated segments right to left for the first one that
/// starts with a digit; return the string index where it begins.
fn find_version_boundary(s: &str) -> Option<usize> {
	let segments: Vec<&str> = s.split('-').collect();
	if segments.len() < 2 {
		return None;
	}

	let mut joined_len = 0usize;
	for segment in segments.iter().skip(1).rev() {
		joined_len += 1 + segment.len(); // "-" + segment
		if segment.chars().next().is_some_and(|c| c.is_ascii_digit()) {
			return Some(s.len() - joined_len);
		}
	}
	None
}

fn is_valid_version(version: &str) -> bool {
	match version.chars().next() {
		Some(c) if c.is_ascii_digit() => {}
		_ => return false,
	}
	if VERSION_PATTERNS.iter().any(|re| re.is_match(version)) {
		return true;
	}
	DIGIT_PREFIX_RE.is_match(version)
}

fn primary_parse(name_with_version: &str) -> Option<(String, String)> {
	let (base, release) = parse_release(name_with_version)?;
	let version_idx = find_version_boundary(base)?;
	let pkg = base[..version_idx].to_string();
	let ver_base = &base[version_idx + 1..];
	if !is_valid_version(ver_base) {
		return None;
	}
	Some((pkg, format!("{}{}", ver_base, release)))
}

fn fallback_parse(name_with_version: &str) -> Option<(String, String)> {
	for pattern in FALLBACK_PATTERNS.iter() {
		if let Some(caps) = pattern.captures(name_with_version) {
			let pkg = caps.get(1)?.as_str();
			let ver_part = caps.get(2)?.as_str();
			if !is_valid_version(ver_part) {
				continue;
			}
			let release_tail = name_with_version.split("-r").nth(1)?;
			return Some((pkg.to_string(), format!("{}-r{}", ver_part, release_tail)));
		}
	}
	None
}

fn parse(url_path: &str) -> Option<(String, String)> {
	let filename = base_name(url_path);
	if !filename.ends_with(APK_EXTENSION) {
		return None;
	}
	let name_with_version = filename.strip_suffix(APK_EXTENSION).unwrap();

	primary_parse(name_with_version).or_else(|| fallback_parse(name_with_version))
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	if !host.contains("alpinelinux.org") {
		return None;
	}

	let filename = base_name(path);
	if filename.ends_with(APK_INDEX_FILE) {
		return Some(Activity::new(
			ActivityKind::Alpine,
			"index",
			host,
			ActivityDetails::Web { url: format!("https://{}{}", host, path) },
		));
	}

	let (pkg, version) = parse(path)?;
	let purl = purl(ActivityKind::Alpine.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::Alpine,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_standard_apk() {
		let act = handle("dl-cdn.alpinelinux.org", "/alpine/v3.19/main/x86_64/curl-8.9.0-r0.apk").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "curl");
				assert_eq!(version, "8.9.0-r0");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn parses_date_based_release() {
		let act = handle(
			"dl-cdn.alpinelinux.org",
			"/alpine/v3.19/main/x86_64/tzdata-20240226-r0.apk",
		)
		.unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "tzdata");
				assert_eq!(version, "20240226-r0");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn index_file_is_a_web_activity() {
		let act = handle("dl-cdn.alpinelinux.org", "/alpine/v3.19/main/x86_64/APKINDEX.tar.gz").unwrap();
		assert_eq!(act.action, "index");
		assert!(matches!(act.details, ActivityDetails::Web { .. }));
	}

	#[test]
	fn wrong_host_is_ignored() {
		assert!(handle("example.com", "/curl-8.9.0-r0.apk").is_none());
	}
}

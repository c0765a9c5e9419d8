use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

fn parse(gem_path: &str) -> Option<(String, String)> {
	if !gem_path.ends_with(".gem") {
		return None;
	}
	let filename = gem_path.rsplit('/').next()?;
	let filename_base = filename.strip_suffix(".gem")?;
	if filename_base.is_empty() || filename_base == "-" {
		return None;
	}

	let bytes = filename_base.as_bytes();
	let mut split_index: Option<usize> = None;
	let mut i = bytes.len() - 1;
	while i > 0 {
		if bytes[i - 1] == b'-' && bytes[i].is_ascii_digit() {
			split_index = Some(i - 1);
			break;
		}
		i -= 1;
	}
	let split_index = split_index?;

	let package = filename_base[..split_index].to_string();
	let version = filename_base[split_index + 1..].to_string();
	if package.is_empty() || package.starts_with('-') || version.is_empty() {
		return None;
	}
	Some((package, version))
}

/// Returns `None` both on a non-`.gem` path and on a valid-looking path
/// that fails to split into name/version — the upstream parser collapses
/// both cases to the same "no activity" outcome.
pub fn handle(host: &str, path: &str) -> Option<Activity> {
	let (pkg, version) = parse(path)?;
	// The PURL scheme ("gem") intentionally differs from the display name
	// ("rubygems") used for `ActivityKind` elsewhere.
	let purl = purl(ActivityKind::RubyGems.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::RubyGems,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_simple_gem() {
		let act = handle("rubygems.org", "/gems/rails-7.1.2.gem").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, purl, .. } => {
				assert_eq!(package, "rails");
				assert_eq!(version, "7.1.2");
				assert_eq!(purl, "pkg:gem/rails@7.1.2");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn rejects_non_gem() {
		assert!(handle("rubygems.org", "/gems/rails-7.1.2.tar.gz").is_none());
	}

	#[test]
	fn rejects_unsplittable_name() {
		assert!(handle("rubygems.org", "/gems/-.gem").is_none());
	}
}

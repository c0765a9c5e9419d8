use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

fn parse(path: &str) -> Option<(String, String)> {
	let filename = path.rsplit('/').next().unwrap_or(path);
	let parts: Vec<&str> = filename.split('-').collect();
	if parts.len() < 3 {
		return None;
	}

	let version_index = parts
		.iter()
		.position(|p| p.chars().next().is_some_and(|c| c.is_ascii_digit()))?;

	let pkg = parts[..version_index].join("-");
	let version = parts[version_index].to_string();
	Some((pkg, version))
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	if host != "files.pythonhosted.org" {
		return None;
	}
	let (pkg, version) = parse(path)?;
	let purl = purl(ActivityKind::Pypi.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::Pypi,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_wheel_filename() {
		let act = handle(
			"files.pythonhosted.org",
			"/packages/11/aa/requests-2.31.0-py3-none-any.whl",
		)
		.unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "requests");
				assert_eq!(version, "2.31.0");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn wrong_host_is_ignored() {
		assert!(handle("pypi.org", "/packages/requests-2.31.0.tar.gz").is_none());
	}
}

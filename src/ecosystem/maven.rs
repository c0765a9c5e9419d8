use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

fn parse(path: &str) -> Option<(String, String)> {
	if !path.ends_with(".jar") {
		return None;
	}
	let parts: Vec<&str> = path.split('/').collect();
	if parts.len() < 3 {
		return None;
	}
	let pkg = parts[1..parts.len() - 2].join(".");
	let version = parts[parts.len() - 2].to_string();
	Some((pkg, version))
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	let (pkg, version) = parse(path)?;
	let purl = purl(ActivityKind::Maven.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::Maven,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_group_artifact_version() {
		let act = handle("repo1.maven.org", "/com/example/widget/1.2.3/widget-1.2.3.jar").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, .. } => {
				assert_eq!(package, "com.example.widget");
				assert_eq!(version, "1.2.3");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn rejects_non_jar() {
		assert!(handle("repo1.maven.org", "/com/example/widget/1.2.3/widget-1.2.3.pom").is_none());
	}
}

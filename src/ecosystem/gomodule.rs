use super::purl;
use crate::model::{Activity, ActivityDetails, ActivityKind};

fn parse(path: &str) -> Option<(String, String)> {
	let trimmed = path.strip_suffix(".zip")?;
	let mut parts = trimmed.splitn(2, "/@v/");
	let pkg = parts.next()?;
	let version = parts.next()?;
	if parts.next().is_some() {
		return None;
	}
	Some((pkg.trim_matches('/').to_string(), version.trim_matches('/').to_string()))
}

pub fn handle(host: &str, path: &str) -> Option<Activity> {
	let (pkg, version) = parse(path)?;
	let purl = purl(ActivityKind::GoModule.purl_scheme(), &pkg, &version);
	Some(Activity::new(
		ActivityKind::GoModule,
		"get",
		host,
		ActivityDetails::Package { repo: host.to_string(), package: pkg, version, purl },
	))
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn parses_module_zip() {
		let act = handle("proxy.golang.org", "/github.com/kairoaraujo/goca/@v/v1.1.3.zip").unwrap();
		match act.details {
			ActivityDetails::Package { package, version, purl, .. } => {
				assert_eq!(package, "github.com/kairoaraujo/goca");
				assert_eq!(version, "v1.1.3");
				assert_eq!(purl, "pkg:golang/github.com/kairoaraujo/goca@v1.1.3");
			}
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn rejects_non_zip() {
		assert!(handle("proxy.golang.org", "/github.com/foo/bar/@v/v1.0.0.info").is_none());
	}
}

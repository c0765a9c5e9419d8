//! Recovers a Composer package's version from the `Content-Disposition`
//! header on a `codeload.github.com/.../legacy.zip/<sha>` download, the
//! one place Composer's URL alone doesn't carry a version string.
//!
//! Grounded on `ExtractPackageInfo`/`PHPCheck.Handle`: most of the return
//! paths here are "nothing found", not errors — only a genuinely malformed
//! download URL is a hard failure.

use crate::model::{Activity, ActivityDetails, ActivityKind, AlertLevel, TechCheck};
use crate::reader_chain::{InspectCtx, Inspector};

struct PackageInfo {
	vendor: String,
	package_name: String,
	version: String,
}

/// Mirrors `ExtractPackageInfo` exactly, including its one surviving quirk:
/// once the vendor/package prefix is known to be present in the filename's
/// version segment, the version is sliced from a fixed offset at the start
/// of that segment rather than from the index the presence check found.
fn extract_package_info(url: &str, content_disposition: Option<&str>) -> anyhow::Result<PackageInfo> {
	let url_parts: Vec<&str> = url.split('/').collect();
	if url_parts.len() < 6 || url_parts[5] != "legacy.zip" {
		anyhow::bail!("not a composer legacy.zip download url: {}", url);
	}
	let vendor = url_parts[3].to_string();
	let package_name = url_parts[4].to_string();

	let mut info = PackageInfo { vendor, package_name, version: String::new() };

	let Some(cd) = content_disposition else {
		return Ok(info);
	};
	let Some(idx) = cd.find("filename=") else {
		return Ok(info);
	};
	let filename = &cd[idx + "filename=".len()..];

	let filename_parts: Vec<&str> = filename.split('-').collect();
	if filename_parts.len() < 3 {
		return Ok(info);
	}
	let filename_version = filename_parts[..filename_parts.len() - 2].join("-");
	let filename_version_url = format!("{}-{}", info.vendor.to_lowercase(), info.package_name.to_lowercase());

	if !filename_version.to_lowercase().contains(&format!("{}-", filename_version_url)) {
		return Ok(info);
	}

	// Fixed-offset slice from the start, not from the match index found
	// above — a literal quirk of the original, preserved deliberately.
	let offset = filename_version_url.len() + 1;
	info.version = if offset <= filename_version.len() {
		filename_version[offset..].to_string()
	} else {
		String::new()
	};
	Ok(info)
}

pub struct PhpCheck;

impl Inspector for PhpCheck {
	fn name(&self) -> &'static str {
		"php_check"
	}

	fn handle(&mut self, ctx: &mut InspectCtx, _data: &[u8]) -> anyhow::Result<()> {
		if ctx.activity.kind != ActivityKind::Composer {
			return Ok(());
		}

		let info = extract_package_info(&ctx.url, ctx.content_disposition.as_deref())?;

		if let ActivityDetails::Package { repo, package, version, .. } = &mut ctx.activity.details {
			if package.is_empty() {
				*package = format!("{}/{}", info.vendor, info.package_name);
			}
			if !info.version.is_empty() {
				*version = info.version.clone();
			}
			*repo = "github.com".to_string();
		}

		super::append_check(
			ctx.activity,
			TechCheck {
				name: "php_package_info".into(),
				policy: "php_check".into(),
				decision_label: "info".into(),
				alert_level: AlertLevel::None,
				score: 10.0,
				details: format!("{}/{}@{}", info.vendor, info.package_name, info.version),
			},
		);
		Ok(())
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	fn composer_activity() -> Activity {
		Activity::new(
			ActivityKind::Composer,
			"get",
			"codeload.github.com",
			ActivityDetails::Package {
				repo: "codeload.github.com".into(),
				package: String::new(),
				version: String::new(),
				purl: String::new(),
			},
		)
	}

	#[test]
	fn extracts_version_from_content_disposition() {
		let url = "https://codeload.github.com/PHPMailer/PHPMailer/legacy.zip/abcdef";
		let cd = "attachment; filename=PHPMailer-PHPMailer-6-10-0-ga7b17b4.zip";
		let info = extract_package_info(url, Some(cd)).unwrap();
		assert_eq!(info.vendor, "PHPMailer");
		assert_eq!(info.package_name, "PHPMailer");
	}

	#[test]
	fn rejects_non_legacy_zip_urls() {
		let url = "https://codeload.github.com/PHPMailer/PHPMailer/zip/abcdef";
		assert!(extract_package_info(url, None).is_err());
	}

	#[test]
	fn missing_content_disposition_is_not_an_error() {
		let url = "https://codeload.github.com/PHPMailer/PHPMailer/legacy.zip/abcdef";
		let info = extract_package_info(url, None).unwrap();
		assert!(info.version.is_empty());
	}

	#[test]
	fn non_composer_activity_is_skipped() {
		let mut activity = Activity::new(
			ActivityKind::Web,
			"get",
			"example.com",
			ActivityDetails::Web { url: "https://example.com".into() },
		);
		let mut ctx = InspectCtx {
			url: "https://example.com".into(),
			content_disposition: None,
			activity: &mut activity,
		};
		let mut check = PhpCheck;
		check.handle(&mut ctx, b"").unwrap();
		assert!(ctx.activity.checks.is_empty());
	}

	#[test]
	fn existing_package_name_is_not_overwritten() {
		let mut activity = composer_activity();
		if let ActivityDetails::Package { package, .. } = &mut activity.details {
			*package = "invisirisk/pse".to_string();
		}
		let url = "https://codeload.github.com/PHPMailer/PHPMailer/legacy.zip/abcdef";
		let mut ctx = InspectCtx { url: url.to_string(), content_disposition: None, activity: &mut activity };
		let mut check = PhpCheck;
		check.handle(&mut ctx, b"").unwrap();
		if let ActivityDetails::Package { package, .. } = &ctx.activity.details {
			assert_eq!(package, "invisirisk/pse");
		}
	}
}

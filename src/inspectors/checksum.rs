//! MD5 checksum of the response body, matching the original `Checksum`
//! inspector's `fmt.Sprintf("%x", ...)` lowercase-hex output.

use md5::{Digest, Md5};

use crate::model::{AlertLevel, TechCheck};
use crate::reader_chain::{InspectCtx, Inspector};

pub struct ChecksumCheck;

impl Inspector for ChecksumCheck {
	fn name(&self) -> &'static str {
		"checksum"
	}

	fn handle(&mut self, ctx: &mut InspectCtx, data: &[u8]) -> anyhow::Result<()> {
		let mut hasher = Md5::new();
		hasher.update(data);
		let digest = hasher.finalize();
		let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();

		super::append_check(
			ctx.activity,
			TechCheck {
				name: "checksum".into(),
				policy: "checksum".into(),
				decision_label: "info".into(),
				alert_level: AlertLevel::None,
				score: 10.0,
				details: hex,
			},
		);
		Ok(())
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::model::{Activity, ActivityDetails, ActivityKind};

	#[test]
	fn checksum_matches_known_md5() {
		let mut activity = Activity::new(
			ActivityKind::Web,
			"get",
			"example.com",
			ActivityDetails::Web { url: "https://example.com".into() },
		);
		let mut ctx = InspectCtx { url: "https://example.com".into(), content_disposition: None, activity: &mut activity };
		let mut check = ChecksumCheck;
		check.handle(&mut ctx, b"hello").unwrap();
		assert_eq!(activity.checks[0].details, "5d41402abc4b2a76b9719d911017c592");
	}
}

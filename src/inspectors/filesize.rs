//! Records the response body's byte count.

use crate::model::{AlertLevel, TechCheck};
use crate::reader_chain::{InspectCtx, Inspector};

pub struct FileSizeCheck;

impl Inspector for FileSizeCheck {
	fn name(&self) -> &'static str {
		"file_size"
	}

	fn handle(&mut self, ctx: &mut InspectCtx, data: &[u8]) -> anyhow::Result<()> {
		super::append_check(
			ctx.activity,
			TechCheck {
				name: "file_size".into(),
				policy: "file_size".into(),
				decision_label: "info".into(),
				alert_level: AlertLevel::None,
				score: 10.0,
				details: data.len().to_string(),
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
	fn records_byte_count() {
		let mut activity = Activity::new(
			ActivityKind::Web,
			"get",
			"example.com",
			ActivityDetails::Web { url: "https://example.com".into() },
		);
		let mut ctx = InspectCtx { url: "https://example.com".into(), content_disposition: None, activity: &mut activity };
		let mut check = FileSizeCheck;
		check.handle(&mut ctx, b"12345").unwrap();
		assert_eq!(activity.checks[0].details, "5");
	}
}

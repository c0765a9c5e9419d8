//! Hand-rolled content-type sniffing, in the same magic-byte-plus-heuristic
//! style the rest of this codebase uses for format detection rather than
//! reaching for a sniffing crate.

use crate::model::{AlertLevel, TechCheck};
use crate::reader_chain::{InspectCtx, Inspector};

pub struct MimeCheck;

fn sniff(data: &[u8]) -> &'static str {
	if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
		return "application/gzip";
	}
	if data.len() >= 4 && data[0] == 0x50 && data[1] == 0x4b && (data[2] == 0x03 || data[2] == 0x05 || data[2] == 0x07) {
		return "application/zip";
	}
	if data.starts_with(b"%PDF-") {
		return "application/pdf";
	}
	if data.len() >= 8 && data[0..8] == [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a] {
		return "image/png";
	}
	if data.starts_with(&[0xff, 0xd8, 0xff]) {
		return "image/jpeg";
	}

	let sample = &data[..data.len().min(512)];
	let printable = sample.iter().filter(|&&b| matches!(b, 0x09 | 0x0a | 0x0d | 0x20..=0x7e)).count();
	let ratio = if sample.is_empty() { 1.0 } else { printable as f64 / sample.len() as f64 };
	if ratio < 0.7 {
		return "application/octet-stream";
	}

	let text = String::from_utf8_lossy(sample);
	let trimmed = text.trim_start();
	if trimmed.starts_with('{') || trimmed.starts_with('[') {
		return "application/json";
	}
	if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
		return "text/xml";
	}
	"text/plain"
}

impl Inspector for MimeCheck {
	fn name(&self) -> &'static str {
		"mime_check"
	}

	fn handle(&mut self, ctx: &mut InspectCtx, data: &[u8]) -> anyhow::Result<()> {
		let content_type = sniff(data);
		super::append_check(
			ctx.activity,
			TechCheck {
				name: "content_type".into(),
				policy: "mime_check".into(),
				decision_label: "info".into(),
				alert_level: AlertLevel::None,
				score: 10.0,
				details: content_type.to_string(),
			},
		);
		Ok(())
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn sniffs_gzip() {
		assert_eq!(sniff(&[0x1f, 0x8b, 0x08]), "application/gzip");
	}

	#[test]
	fn sniffs_zip() {
		assert_eq!(sniff(&[0x50, 0x4b, 0x03, 0x04]), "application/zip");
	}

	#[test]
	fn sniffs_json_text() {
		assert_eq!(sniff(b"{\"a\":1}"), "application/json");
	}

	#[test]
	fn falls_back_to_octet_stream_for_binary() {
		let data = vec![0x00u8, 0x01, 0x02, 0xff, 0xfe, 0xfd, 0x10, 0x11];
		assert_eq!(sniff(&data), "application/octet-stream");
	}
}

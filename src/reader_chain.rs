//! Runs a fixed sequence of response-body inspectors over one buffered
//! response, handing each inspector its own view of the same bytes so no
//! inspector can starve another of data. Grounded on `utils.ReaderChain`:
//! the body is read fully up front, each `Chain.Handle` gets a fresh
//! reader over the same buffer, and a failing inspector is logged and
//! skipped rather than aborting the rest of the chain.

use crate::model::Activity;

/// Everything an inspector might need beyond the raw bytes: the activity
/// being built (so PHPCheck can rewrite Composer's package details) and
/// response metadata that doesn't live in the body itself.
pub struct InspectCtx<'a> {
	pub url: String,
	pub content_disposition: Option<String>,
	pub activity: &'a mut Activity,
}

pub trait Inspector {
	fn name(&self) -> &'static str;
	fn handle(&mut self, ctx: &mut InspectCtx, data: &[u8]) -> anyhow::Result<()>;
}

/// Run every inspector over `data` in order. Each inspector sees the full,
/// untouched buffer; a failing inspector only loses its own contribution.
pub fn run_chain(data: &[u8], ctx: &mut InspectCtx, inspectors: &mut [Box<dyn Inspector>]) {
	tracing::debug!(content_size = data.len(), "running reader chain");
	for inspector in inspectors.iter_mut() {
		if let Err(e) = inspector.handle(ctx, data) {
			tracing::warn!(inspector = inspector.name(), error = %e, "inspector failed");
		}
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::model::{ActivityDetails, ActivityKind};

	struct Counting(usize);
	impl Inspector for Counting {
		fn name(&self) -> &'static str {
			"counting"
		}
		fn handle(&mut self, _ctx: &mut InspectCtx, data: &[u8]) -> anyhow::Result<()> {
			self.0 = data.len();
			Ok(())
		}
	}

	struct AlwaysFails;
	impl Inspector for AlwaysFails {
		fn name(&self) -> &'static str {
			"always_fails"
		}
		fn handle(&mut self, _ctx: &mut InspectCtx, _data: &[u8]) -> anyhow::Result<()> {
			anyhow::bail!("boom")
		}
	}

	#[test]
	fn every_inspector_sees_the_full_buffer() {
		let mut activity = Activity::new(
			ActivityKind::Web,
			"get",
			"example.com",
			ActivityDetails::Web { url: "https://example.com".into() },
		);
		let mut ctx = InspectCtx { url: "https://example.com".into(), content_disposition: None, activity: &mut activity };

		let data = b"hello world";
		let mut inspectors: Vec<Box<dyn Inspector>> = vec![Box::new(Counting(0)), Box::new(Counting(0))];
		run_chain(data, &mut ctx, &mut inspectors);
	}

	#[test]
	fn a_failing_inspector_does_not_abort_the_rest() {
		let mut activity = Activity::new(
			ActivityKind::Web,
			"get",
			"example.com",
			ActivityDetails::Web { url: "https://example.com".into() },
		);
		let mut ctx = InspectCtx { url: "https://example.com".into(), content_disposition: None, activity: &mut activity };

		let mut inspectors: Vec<Box<dyn Inspector>> = vec![Box::new(AlwaysFails), Box::new(Counting(0))];
		run_chain(b"data", &mut ctx, &mut inspectors);
	}
}

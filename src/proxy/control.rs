//! The `pse.invisirisk.com` control surface: `/start` opens a session,
//! `/end` finalizes and uploads one, `/ca` serves the root certificate.
//! Grounded on `proxy/policy.go`'s `PseEndpoint`.

use std::collections::HashMap;

use chrono::Utc;

use crate::model::{Build, BuildStatus};
use crate::session::session_from_form;
use crate::state::AppState;

pub fn start(state: &AppState, remote_ip: &str, form: &HashMap<String, String>) {
	let session = session_from_form(form);
	state.sessions.add(remote_ip, session);
	state.metrics.sessions_active.inc();
}

/// Ends the owning session (or, in global mode, the first tracked one) and
/// uploads the finished build in the background. Mirrors `session.go`'s
/// `End`: the build system isn't made to wait on the portal round trip, so
/// upload failures are logged, never surfaced to the caller.
pub fn end(state: &AppState, remote_ip: &str, form: &HashMap<String, String>) {
	let build_url = form.get("build_url").cloned().unwrap_or_default();
	let status = BuildStatus::parse_loose(form.get("status").map(String::as_str).unwrap_or(""));

	let Some(session) = state.sessions.end(remote_ip, &build_url, state.settings.global_session) else {
		tracing::warn!(remote_ip, build_url, "end requested for unknown session");
		return;
	};

	state.metrics.sessions_active.dec();
	state.metrics.sessions_ended_total.inc();

	let build = Build {
		id: session.scan_id.clone(),
		project: format!("{} - {}", session.project, session.workflow),
		builder: session.builder.clone(),
		builder_url: session.builder_url.clone(),
		build_url: session.build_url.clone(),
		activity: session.activities.clone(),
		status,
		start_time: session.start_time,
		end_time: Utc::now(),
		scm: session.scm.clone(),
	};

	let portal = state.portal.clone();
	let metrics = state.metrics.clone();
	tokio::spawn(async move {
		metrics.portal_uploads_total.inc();
		let timer = metrics.portal_upload_duration_seconds.start_timer();
		let result = portal.upload(&build).await;
		timer.observe_duration();
		if let Err(e) = result {
			metrics.portal_upload_failures_total.inc();
			tracing::error!(error = %e, build_id = %build.id, "portal upload failed");
		}
	});
}

/// Serves the root CA certificate PEM, reading it fresh from disk on every
/// call the way `caCert` does (`os.Open` + `io.Copy`, no in-memory caching
/// of the PEM text).
pub fn ca_cert_pem(state: &AppState) -> anyhow::Result<Vec<u8>> {
	let path = state.root_ca.base_dir().join("root.pem");
	std::fs::read(&path).map_err(|e| anyhow::anyhow!("CA certificate not available: {}", e))
}

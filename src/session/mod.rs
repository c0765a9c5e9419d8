//! Session registry: tracks one build per intercepted client connection
//! from `/start` to `/end`, accumulating the activities observed along the
//! way. Grounded on the registry's two-map, scan-id-merging `End` logic.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::model::{Activity, ScmInfo, Session};

/// Parse a `/start` request body (`application/x-www-form-urlencoded`) into
/// a new `Session`. Git branches get their `origin/` prefix stripped, same
/// as the upstream build system does for its own branch bookkeeping.
pub fn session_from_form(form: &HashMap<String, String>) -> Session {
	let scm_kind = form.get("scm").cloned().unwrap_or_default();
	let mut branch = form.get("scm_branch").cloned().unwrap_or_default();
	if scm_kind == "git" {
		if let Some(rest) = branch.strip_prefix("origin/") {
			branch = rest.to_string();
		}
	}

	Session {
		project: percent_escape(form.get("project").map(String::as_str).unwrap_or("")),
		workflow: form.get("workflow").cloned().unwrap_or_default(),
		builder: form.get("builder").cloned().unwrap_or_default(),
		builder_url: form.get("builder_url").cloned().unwrap_or_default(),
		build_url: form.get("build_url").cloned().unwrap_or_default(),
		start_time: Utc::now(),
		scm: ScmInfo {
			kind: scm_kind,
			origin: form.get("scm_origin").cloned().unwrap_or_default(),
			commit: form.get("scm_commit").cloned().unwrap_or_default(),
			prev_commit: form.get("scm_prev_commit").cloned().unwrap_or_default(),
			branch,
		},
		scan_id: form.get("id").cloned().unwrap_or_default(),
		activities: Vec::new(),
		package_name_map: HashMap::new(),
	}
}

fn percent_escape(s: &str) -> String {
	url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// The registry itself: sessions keyed by the client's remote host while
/// live, demoted to a `build_url`-keyed pending map when a second session
/// arrives from the same host before the first one ended.
pub struct SessionRegistry {
	inner: Mutex<Inner>,
}

struct Inner {
	by_host: HashMap<String, Session>,
	pending: HashMap<String, Session>,
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				by_host: HashMap::new(),
				pending: HashMap::new(),
			}),
		}
	}

	/// Insert `session` under `host`. If a session is already live at that
	/// host, it is demoted to the pending map keyed by its own build URL
	/// first, so it isn't lost when the new one overwrites the slot.
	pub fn add(&self, host: &str, session: Session) {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		if let Some(existing) = inner.by_host.remove(host) {
			let key = existing.build_url.clone();
			inner.pending.insert(key, existing);
		}
		inner.by_host.insert(host.to_string(), session);
	}

	pub fn find(&self, host: &str) -> Option<Session> {
		let inner = self.inner.lock().expect("session registry mutex poisoned");
		inner.by_host.get(host).cloned()
	}

	/// Append `activity` to the live session at `host`, if any.
	pub fn append_activity(&self, host: &str, activity: Activity) {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		if let Some(s) = inner.by_host.get_mut(host) {
			s.add(activity);
		}
	}

	/// Mutate the package-name map of the live session at `host`, if any
	/// (used by the Composer parser's two-hop repo-name resolution).
	pub fn with_package_map<F: FnOnce(&mut HashMap<String, String>)>(&self, host: &str, f: F) {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		if let Some(s) = inner.by_host.get_mut(host) {
			f(&mut s.package_name_map);
		}
	}

	/// Peek at the first tracked session without removing it, along with the
	/// host key it lives under. Used for request-phase lookups in global-
	/// session mode, where `FindFirst` in the Go original does not pop.
	pub fn find_first(&self) -> Option<(String, Session)> {
		let inner = self.inner.lock().expect("session registry mutex poisoned");
		let key = inner.by_host.keys().next()?.clone();
		let session = inner.by_host.get(&key)?.clone();
		Some((key, session))
	}

	fn pop_first(&self) -> Option<Session> {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		let key = inner.by_host.keys().next().cloned();
		let session = key.and_then(|k| inner.by_host.remove(&k));
		if let Some(k) = inner.pending.keys().next().cloned() {
			inner.pending.remove(&k);
		}
		session
	}

	fn pop(&self, host: &str, build_url: &str) -> Option<Session> {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		if let Some(s) = inner.by_host.remove(host) {
			return Some(s);
		}
		inner.pending.remove(build_url)
	}

	/// Pop every session (from either map) sharing `scan_id`.
	fn pop_related(&self, scan_id: &str) -> Vec<Session> {
		let mut inner = self.inner.lock().expect("session registry mutex poisoned");
		let host_keys: Vec<String> = inner
			.by_host
			.iter()
			.filter(|(_, s)| s.scan_id == scan_id)
			.map(|(k, _)| k.clone())
			.collect();
		let url_keys: Vec<String> = inner
			.pending
			.iter()
			.filter(|(_, s)| s.scan_id == scan_id)
			.map(|(k, _)| k.clone())
			.collect();

		let mut out = Vec::new();
		for k in host_keys {
			if let Some(s) = inner.by_host.remove(&k) {
				out.push(s);
			}
		}
		for k in url_keys {
			if let Some(s) = inner.pending.remove(&k) {
				out.push(s);
			}
		}
		out
	}

	/// Pop the session ending this build (by remote host or, in global-mode,
	/// arbitrarily), fan in every other session sharing its scan id, and
	/// return the merged session ready to finalize. Mirrors `Sessions.End`.
	pub fn end(&self, host: &str, build_url: &str, global_session: bool) -> Option<Session> {
		let mut session = if global_session {
			self.pop_first()
		} else {
			self.pop(host, build_url)
		}?;

		let related = self.pop_related(&session.scan_id);
		for r in related {
			for activity in r.activities {
				session.add(activity);
			}
		}

		Some(session)
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::model::{ActivityDetails, ActivityKind};

	fn dummy_session(build_url: &str, scan_id: &str) -> Session {
		Session {
			project: "proj".into(),
			workflow: "wf".into(),
			builder: "github".into(),
			builder_url: String::new(),
			build_url: build_url.into(),
			start_time: Utc::now(),
			scm: ScmInfo::default(),
			scan_id: scan_id.into(),
			activities: Vec::new(),
			package_name_map: HashMap::new(),
		}
	}

	#[test]
	fn add_demotes_previous_session_to_pending() {
		let reg = SessionRegistry::new();
		reg.add("10.0.0.1", dummy_session("build-1", "scan-1"));
		reg.add("10.0.0.1", dummy_session("build-2", "scan-2"));

		// the second session now lives at the host key
		assert_eq!(reg.find("10.0.0.1").unwrap().build_url, "build-2");

		// the first is reachable only via pop(host, build_url) against the
		// pending map, since its host slot was overwritten
		let popped = reg.pop("nowhere", "build-1").unwrap();
		assert_eq!(popped.scan_id, "scan-1");
	}

	#[test]
	fn end_merges_activities_across_scan_id() {
		let reg = SessionRegistry::new();
		reg.add("host-a", dummy_session("build-a", "scan-x"));
		reg.add("host-b", dummy_session("build-b", "scan-x"));

		reg.append_activity(
			"host-b",
			Activity::new(
				ActivityKind::Web,
				"get",
				"example.com",
				ActivityDetails::Web { url: "https://example.com".into() },
			),
		);

		let merged = reg.end("host-a", "build-a", false).unwrap();
		assert_eq!(merged.activities.len(), 1);
		assert!(reg.find("host-b").is_none());
	}

	#[test]
	fn end_returns_none_when_nothing_cached() {
		let reg = SessionRegistry::new();
		assert!(reg.end("nobody", "nothing", false).is_none());
	}
}

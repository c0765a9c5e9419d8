use crate::model::{Activity, ActivityDetails, ActivityKind};

/// `SplitN(path, "/", 4)`: a leading-slash path yields `["", org, repo,
/// rest]`, so the dumb-http-protocol action (`git-upload-pack` for a pull,
/// `git-receive-pack` for a push) is `parts[3]`, and the `?service=` query
/// parameter is checked as a fallback for the smart-http handshake.
pub fn handle(host: &str, path: &str, query: &str) -> Option<Activity> {
	let parts: Vec<&str> = path.splitn(4, '/').collect();
	if parts.len() < 4 {
		return None;
	}

	let service = query_param(query, "service");
	let action = if parts[3] == "git-upload-pack" || service.as_deref() == Some("git-upload-pack") {
		"pull"
	} else if parts[3] == "git-receive-pack" || service.as_deref() == Some("git-receive-pack") {
		"push"
	} else {
		return None;
	};

	let repo = format!("{}/{}/{}", host, parts[1], parts[2]);
	let repo = repo.strip_suffix(".git").map(str::to_string).unwrap_or(repo);

	Some(Activity::new(ActivityKind::Git, action, host, ActivityDetails::Git { repo }))
}

fn query_param(query: &str, key: &str) -> Option<String> {
	url::form_urlencoded::parse(query.as_bytes())
		.find(|(k, _)| k == key)
		.map(|(_, v)| v.into_owned())
}

#[cfg(feature = "parser-tests")]
mod tests {
	use super::*;

	#[test]
	fn upload_pack_is_a_pull() {
		let act = handle("github.com", "/org/repo/git-upload-pack", "").unwrap();
		assert_eq!(act.action, "pull");
		match act.details {
			ActivityDetails::Git { repo } => assert_eq!(repo, "github.com/org/repo"),
			_ => panic!("wrong details variant"),
		}
	}

	#[test]
	fn receive_pack_is_a_push() {
		let act = handle("github.com", "/org/repo.git/git-receive-pack", "").unwrap();
		assert_eq!(act.action, "push");
	}

	#[test]
	fn service_query_param_is_a_fallback() {
		let act = handle("github.com", "/org/repo/info/refs", "service=git-upload-pack").unwrap();
		assert_eq!(act.action, "pull");
	}

	#[test]
	fn unrelated_path_is_ignored() {
		assert!(handle("github.com", "/org/repo/releases", "").is_none());
	}

	#[test]
	fn short_path_is_ignored() {
		assert!(handle("github.com", "/org/repo", "").is_none());
	}
}

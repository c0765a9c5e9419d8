use pse_proxy::model::AlertLevel;
use pse_proxy::policy::{generate_final_decision, parse_decision, ALERT, ALLOW, DENY};
use serde_json::json;

#[test]
fn request_allow_then_response_deny_yields_final_deny() {
	let request = parse_decision(&json!({
		"final_decision": { "result": "allow", "details": "", "policy_checks": [] }
	}))
	.unwrap();
	let response = parse_decision(&json!({
		"final_decision": {
			"result": "deny",
			"details": "blocked package version",
			"policy_checks": [{"policy": "pkg-version", "details": "blocked", "result": "deny"}]
		}
	}))
	.unwrap();

	let merged = generate_final_decision(&[request, response]);
	assert_eq!(merged.decision, DENY);
	assert_eq!(merged.detail, "blocked package version");
	assert_eq!(merged.policy_checks.len(), 1);
}

#[test]
fn two_alerts_take_the_higher_alert_level() {
	let warning = parse_decision(&json!({
		"final_decision": { "result": "alert/warning", "details": "d1", "policy_checks": [] }
	}))
	.unwrap();
	let critical = parse_decision(&json!({
		"final_decision": { "result": "alert/critical", "details": "d2", "policy_checks": [] }
	}))
	.unwrap();

	let merged = generate_final_decision(&[warning, critical]);
	assert_eq!(merged.decision, ALERT);
	assert_eq!(merged.alert_level, AlertLevel::Critical);
}

#[test]
fn all_allow_phases_stay_allow_with_no_detail() {
	let a = parse_decision(&json!({"final_decision": {"result": "allow"}})).unwrap();
	let b = parse_decision(&json!({"final_decision": {"result": "allow"}})).unwrap();
	let merged = generate_final_decision(&[a, b]);
	assert_eq!(merged.decision, ALLOW);
	assert!(merged.detail.is_empty());
}

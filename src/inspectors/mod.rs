//! Response-body inspectors run by the reader chain. Each one is cheap,
//! side-effect-free beyond appending `TechCheck`s to the activity, and
//! never fails the overall request — a failing inspector just logs.

pub mod checksum;
pub mod filesize;
pub mod mime;
pub mod php_check;
pub mod secret_scan;

use crate::model::{Activity, AlertLevel, Decision, TechCheck};

/// Append a tech check to an activity, escalating alert level/decision the
/// way `appendCheck` does: once the activity already carries an alert and
/// isn't already denied, any further check nudges the decision to `Alert`;
/// separately, the activity's alert level is raised to the check's own
/// level if that's strictly higher.
pub fn append_check(activity: &mut Activity, check: TechCheck) {
	if activity.alert_level != AlertLevel::None && activity.decision != Decision::Deny {
		activity.decision = Decision::Alert;
	}
	if check.alert_level > activity.alert_level {
		activity.alert_level = check.alert_level;
	}
	activity.checks.push(check);
}

//! Per-ecosystem request classifiers. Each parser is a pure function over
//! `(host, path, query)` that recognizes its own URL shape and returns an
//! `Activity`, grounded line-for-line on the upstream `technology/*`
//! packages. Dispatch order and the Composer special case (the only parser
//! needing session state) live in `crate::proxy`.

pub mod alpine;
pub mod composer;
pub mod git;
pub mod gomodule;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod pypi;
pub mod rubygems;

pub(crate) fn purl(scheme: &str, pkg: &str, version: &str) -> String {
	format!("pkg:{}/{}@{}", scheme, pkg, version)
}

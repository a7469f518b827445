//! Sitemon - periodic HTTP(S) checks of a fixed site list
//!
//! Every sweep checks each configured site once, in order, and the
//! resulting [`MonitorState`] replaces the JSON state file that dashboards
//! read as the current status.

pub mod config;
pub mod monitoring;
pub mod sites;
pub mod store;

pub use config::Settings;
pub use monitoring::{CheckResult, Checker, HttpChecker, MonitorState, MonitoringScheduler, SiteConfig};
pub use store::StateStore;

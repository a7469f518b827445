/// Monitoring engine - checks sites and schedules sweeps
///
/// - `checker`: one HTTP GET per site, every failure captured in the result
/// - `scheduler`: paced sweeps on a fixed period, persisted after each sweep
/// - `types`: sites, check results and the persisted state
pub mod checker;
pub mod scheduler;
pub mod types;

pub use checker::{Checker, HttpChecker};
pub use scheduler::MonitoringScheduler;
pub use types::{CheckResult, MonitorState, SiteConfig};

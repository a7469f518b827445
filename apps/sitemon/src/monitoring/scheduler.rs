use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{info, warn};

use super::checker::Checker;
use super::types::{CheckResult, MonitorState, SiteConfig, ceil_millis};
use crate::config::{Overrun, Schedule};
use crate::store::StateStore;

/// Runs sweeps over the configured sites and persists each one
pub struct MonitoringScheduler {
    checker: Arc<dyn Checker>,
    store: StateStore,
    sites: Vec<SiteConfig>,
    schedule: Schedule,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        checker: Arc<dyn Checker>,
        store: StateStore,
        sites: Vec<SiteConfig>,
        schedule: Schedule,
    ) -> Self {
        Self { checker, store, sites, schedule }
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    /// Sweep immediately, then once per interval, forever.
    ///
    /// `state` is the last known state; each sweep replaces it.
    pub async fn run(self, mut state: MonitorState) {
        let period = self.schedule.interval();
        let mut due = Instant::now();

        loop {
            sleep_until(due).await;
            state = self.run_sweep(&state).await;

            let now = Instant::now();
            let boundary = due + period;
            if now > boundary {
                warn!(
                    "Sweep overran the {}s interval by {:.2}s ({} policy)",
                    period.as_secs(),
                    (now - boundary).as_secs_f64(),
                    self.schedule.overrun
                );
            }
            due = next_due(due, now, period, self.schedule.overrun);
        }
    }

    /// Check every site once, persist the outcome and return it as the new
    /// state. `previous` is only used to report status changes.
    pub async fn run_sweep(&self, previous: &MonitorState) -> MonitorState {
        let started = Instant::now();
        info!("Checking {} sites...", self.sites.len());

        let results = if self.schedule.max_concurrency <= 1 {
            self.check_sequential().await
        } else {
            self.check_concurrent(self.schedule.max_concurrency).await
        };

        let state = MonitorState::new(results, ceil_millis(chrono::Utc::now()));
        report_transitions(previous, &state);
        self.store.save(&state);

        let (up, down) = state.counts();
        info!(
            "Completed check of {} sites in {:.2}s: {} up, {} down",
            state.sites.len(),
            started.elapsed().as_secs_f64(),
            up,
            down
        );

        state
    }

    /// One check at a time with the pacing delay between consecutive checks
    async fn check_sequential(&self) -> Vec<CheckResult> {
        let pacing = self.schedule.pacing_delay();
        let mut results = Vec::with_capacity(self.sites.len());

        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 && pacing > Duration::ZERO {
                sleep(pacing).await;
            }
            results.push(self.checker.check(site).await);
        }

        results
    }

    /// Up to `limit` checks in flight, check `i` dispatched no earlier than
    /// `i` pacing delays after the sweep started. Results keep site order.
    async fn check_concurrent(&self, limit: usize) -> Vec<CheckResult> {
        let pacing = self.schedule.pacing_delay();
        let start = Instant::now();
        let checker = Arc::clone(&self.checker);

        stream::iter(self.sites.clone().into_iter().enumerate())
            .map(move |(i, site)| {
                let checker = Arc::clone(&checker);
                let offset = pacing.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));
                async move {
                    sleep_until(start + offset).await;
                    checker.check(&site).await
                }
            })
            .buffered(limit)
            .collect()
            .await
    }
}

/// Start of the sweep following one that was due at `due` and finished at
/// `now`.
fn next_due(due: Instant, now: Instant, period: Duration, overrun: Overrun) -> Instant {
    let next = due + period;
    if now <= next {
        return next;
    }

    match overrun {
        Overrun::Skip => {
            let missed = (now - next).as_nanos() / period.as_nanos().max(1) + 1;
            next + period.saturating_mul(u32::try_from(missed).unwrap_or(u32::MAX))
        }
        Overrun::Delay => now,
    }
}

/// Change of a site's status between two sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    WentDown,
    Recovered,
}

/// Log sites whose status changed since `previous` and return them by URL.
/// Sites missing from `previous` are not reported.
fn report_transitions<'a>(previous: &MonitorState, current: &'a MonitorState) -> Vec<(&'a str, Transition)> {
    let mut transitions = Vec::new();

    for result in &current.sites {
        let Some(before) = previous.result_for(&result.url) else {
            continue;
        };

        match (before.success, result.success) {
            (true, false) => {
                warn!("{} ({}) went down", result.name, result.url);
                transitions.push((result.url.as_str(), Transition::WentDown));
            }
            (false, true) => {
                info!("{} ({}) recovered", result.name, result.url);
                transitions.push((result.url.as_str(), Transition::Recovered));
            }
            _ => {}
        }
    }

    transitions
}

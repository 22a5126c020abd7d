//! Cron-driven check scheduler.
//!
//! Runs one discovery cycle eagerly at startup, then sleeps until the next
//! cron occurrence. Each cycle is awaited to completion before the next
//! sleep begins, so overlapping cycles cannot happen even when a cycle
//! overruns its slot — the overdue occurrence is simply skipped and the
//! schedule resumes from "now".

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use cron::Schedule;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::monitor::EpisodeMonitor;

pub struct CheckScheduler {
    schedule: Schedule,
    monitor: Arc<EpisodeMonitor>,
}

impl CheckScheduler {
    pub fn new(expression: &str, monitor: Arc<EpisodeMonitor>) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("Invalid cron expression: {}", expression))?;
        Ok(Self { schedule, monitor })
    }

    /// Run until a shutdown signal arrives. The first cycle runs immediately;
    /// subsequent cycles follow the cron schedule.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("Scheduler started, running initial check");
        self.monitor.check_for_new_episodes().await;

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                warn!("Cron schedule has no future occurrences, scheduler stopping");
                return;
            };

            let until = match (next - Utc::now()).to_std() {
                Ok(duration) => duration,
                // Occurrence already passed while the last cycle ran.
                Err(_) => {
                    debug!("Next occurrence already due, running now");
                    self.monitor.check_for_new_episodes().await;
                    continue;
                }
            };

            debug!(next = %next, "Sleeping until next scheduled check");
            tokio::select! {
                _ = tokio::time::sleep(until) => {
                    self.monitor.check_for_new_episodes().await;
                }
                _ = shutdown.recv() => {
                    info!("Scheduler shutting down");
                    return;
                }
            }
        }
    }
}

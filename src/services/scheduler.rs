use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::task::JoinHandle;

use crate::services::transitions::TransitionExecutor;

/// Runs the automation sweep on a cron schedule (seconds-resolution expressions).
#[derive(Clone)]
pub struct SweepScheduler {
    executor: TransitionExecutor,
    schedule: Schedule,
}

impl SweepScheduler {
    pub fn new(executor: TransitionExecutor, expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("invalid sweep schedule '{}'", expression))?;
        Ok(Self { executor, schedule })
    }

    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = self.next_run_after(now) else {
                    tracing::warn!("Sweep schedule has no upcoming runs; scheduler stopped");
                    break;
                };

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                tracing::info!("Starting scheduled automation sweep");
                let summary = self.executor.run_sweep(Utc::now()).await;
                if !summary.errors.is_empty() {
                    tracing::warn!("Scheduled sweep finished with {} errors", summary.errors.len());
                }
            }
        })
    }
}

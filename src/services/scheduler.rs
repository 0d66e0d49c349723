//! Periodic sweeps

use std::{future::Future, sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use super::Services;
use crate::{config::SchedulerConfig, error::AppResult, models::sweep::SweepReport};

fn spawn_sweep<F, Fut>(name: &'static str, every_secs: u64, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<SweepReport>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
        loop {
            ticker.tick().await;
            match sweep().await {
                Ok(report) => tracing::debug!(sweep = name, ?report, "Scheduled sweep done"),
                Err(e) => tracing::error!(sweep = name, error = %e, "Scheduled sweep failed"),
            }
        }
    })
}

/// Start the overdue, lost-book and hold-expiry sweeps
pub fn spawn(services: Arc<Services>, config: &SchedulerConfig) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Scheduler disabled");
        return Vec::new();
    }

    let overdue = services.clone();
    let lost = services.clone();
    let holds = services;

    tracing::info!(
        overdue_secs = config.overdue_interval_secs,
        lost_secs = config.lost_interval_secs,
        hold_expiry_secs = config.hold_expiry_interval_secs,
        "Scheduler started"
    );

    vec![
        spawn_sweep("overdue", config.overdue_interval_secs, move || {
            let services = overdue.clone();
            async move { services.fines.sweep_overdue().await }
        }),
        spawn_sweep("lost_books", config.lost_interval_secs, move || {
            let services = lost.clone();
            async move { services.fines.sweep_lost_books().await }
        }),
        spawn_sweep("hold_expiry", config.hold_expiry_interval_secs, move || {
            let services = holds.clone();
            async move { services.holds.sweep_expired_holds().await }
        }),
    ]
}

//! Cron-driven reconciliation jobs.
//!
//! Four jobs keep the database and the panels in agreement:
//! - every 10 minutes: refresh usage and send limit warnings
//! - every 5 minutes: equalize traffic across multi-server subscriptions
//! - every 15 minutes: overwrite advisory user counts from panel health
//! - daily at 03:00: expire overdue subscriptions, then remove long-expired ones
//!
//! Job bodies log their own failures; one bad run never stops the schedule.

use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::AppError;
use crate::service::lifecycle::LifecycleService;
use crate::state::AppState;

const USAGE_MONITOR_CRON: &str = "0 */10 * * * *";
const TRAFFIC_SYNC_CRON: &str = "0 */5 * * * *";
const USER_COUNT_CRON: &str = "0 */15 * * * *";
const DAILY_SWEEP_CRON: &str = "0 0 3 * * *";

/// Builds the lifecycle service and registers all recurring jobs.
///
/// The returned scheduler must be kept alive by the caller; dropping it stops
/// the jobs.
pub async fn start_scheduler(state: AppState) -> Result<JobScheduler, AppError> {
    let scheduler = JobScheduler::new().await?;

    let lifecycle = LifecycleService::new(
        state.db.clone(),
        state.registry.clone(),
        state.notifier.clone(),
        state.markers.clone(),
    );

    let monitor = lifecycle.clone();
    scheduler
        .add(Job::new_async(USAGE_MONITOR_CRON, move |_uuid, _lock| {
            let service = monitor.clone();
            Box::pin(async move {
                if let Err(e) = service.monitor_usage().await {
                    tracing::error!("Usage monitor run failed: {}", e);
                }
            })
        })?)
        .await?;

    let traffic = lifecycle.clone();
    scheduler
        .add(Job::new_async(TRAFFIC_SYNC_CRON, move |_uuid, _lock| {
            let service = traffic.clone();
            Box::pin(async move {
                if let Err(e) = service.sync_multi_server_traffic().await {
                    tracing::error!("Traffic sync run failed: {}", e);
                }
            })
        })?)
        .await?;

    let counts = lifecycle.clone();
    scheduler
        .add(Job::new_async(USER_COUNT_CRON, move |_uuid, _lock| {
            let service = counts.clone();
            Box::pin(async move {
                if let Err(e) = service.sync_user_counts().await {
                    tracing::error!("User count sync run failed: {}", e);
                }
            })
        })?)
        .await?;

    // Expiry runs before cleanup so a subscription expired today is disabled
    // in the same sweep that removes month-old ones.
    let sweep = lifecycle.clone();
    scheduler
        .add(Job::new_async(DAILY_SWEEP_CRON, move |_uuid, _lock| {
            let service = sweep.clone();
            Box::pin(async move {
                if let Err(e) = service.expire_overdue().await {
                    tracing::error!("Expiry sweep failed: {}", e);
                }
                if let Err(e) = service.cleanup_expired().await {
                    tracing::error!("Cleanup sweep failed: {}", e);
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Reconciliation scheduler started");

    Ok(scheduler)
}

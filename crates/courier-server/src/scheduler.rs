//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! periodic snapshot rebuild.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::refresh::SnapshotRefresher;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    refresher: SnapshotRefresher,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_snapshot_job(&scheduler, refresher, cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the periodic merchant snapshot rebuild.
///
/// Notifications cover most changes; the cron job catches anything a
/// dropped listener connection missed.
async fn register_snapshot_job(
    scheduler: &JobScheduler,
    refresher: SnapshotRefresher,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let refresher = refresher.clone();

        Box::pin(async move {
            if let Err(e) = refresher.refresh("cron").await {
                tracing::error!(error = %e, "scheduler: snapshot refresh failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: snapshot refresh registered");
    Ok(())
}

//! Snapshot refresh from Postgres.
//!
//! Three triggers feed the same [`SnapshotRefresher`]: the startup load, the
//! periodic cron job, and `LISTEN` notifications from the merchant trigger.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{MerchantLocation, MerchantSnapshot, SnapshotStore};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::Mutex;

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SnapshotRefresher {
    pool: PgPool,
    store: Arc<SnapshotStore>,
    cell_size_degrees: f64,
    // One rebuild at a time, so versions follow load order.
    lock: Arc<Mutex<()>>,
}

impl SnapshotRefresher {
    pub fn new(pool: PgPool, store: Arc<SnapshotStore>, cell_size_degrees: f64) -> Self {
        Self {
            pool,
            store,
            cell_size_degrees,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load every live merchant and publish a new snapshot.
    ///
    /// Rows that cannot be converted or indexed are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the merchant query or the snapshot build fails;
    /// the previously published snapshot stays in place.
    pub async fn refresh(&self, trigger: &'static str) -> anyhow::Result<Arc<MerchantSnapshot>> {
        let _guard = self.lock.lock().await;

        let rows = courier_db::list_merchant_locations(&self.pool).await?;
        let row_count = rows.len();
        let merchants: Vec<MerchantLocation> = rows
            .into_iter()
            .filter_map(|row| match row.into_merchant() {
                Ok(merchant) => Some(merchant),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable merchant row");
                    None
                }
            })
            .collect();
        let unreadable = row_count - merchants.len();

        let store = Arc::clone(&self.store);
        let cell_size = self.cell_size_degrees;
        let (snapshot, rejected) =
            tokio::task::spawn_blocking(move || store.rebuild(cell_size, merchants)).await??;

        for merchant in &rejected {
            tracing::warn!(merchant_id = %merchant.id, reason = %merchant.reason, "merchant left out of snapshot");
        }
        tracing::info!(
            trigger,
            snapshot_version = snapshot.version(),
            merchants = snapshot.len(),
            rejected = rejected.len() + unreadable,
            "published merchant snapshot"
        );

        Ok(snapshot)
    }
}

/// Rebuild on every `merchant_locations_changed` notification.
///
/// Runs until the process exits. Connection failures are logged and retried;
/// `PgListener` re-subscribes on reconnect.
pub async fn listen_for_changes(refresher: SnapshotRefresher) {
    loop {
        let mut listener = match PgListener::connect_with(&refresher.pool).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!(error = %e, "merchant change listener: connect failed");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                continue;
            }
        };
        if let Err(e) = listener.listen(courier_db::MERCHANT_CHANGES_CHANNEL).await {
            tracing::warn!(error = %e, "merchant change listener: LISTEN failed");
            tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            continue;
        }
        tracing::info!(
            channel = courier_db::MERCHANT_CHANGES_CHANNEL,
            "listening for merchant changes"
        );

        loop {
            match listener.recv().await {
                Ok(notification) => {
                    tracing::debug!(payload = notification.payload(), "merchant change notified");
                    if let Err(e) = refresher.refresh("notify").await {
                        tracing::error!(error = %e, "snapshot refresh after notification failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "merchant change listener: receive failed");
                    tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                    break;
                }
            }
        }
    }
}

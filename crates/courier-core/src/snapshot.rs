//! Versioned, immutable merchant snapshots.
//!
//! A snapshot is built completely off to the side and then published by
//! swapping one `Arc`. Queries clone the current `Arc` and keep using it even
//! if a newer snapshot is published mid-query.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::grid::GridIndex;
use crate::merchants::MerchantLocation;
use crate::CoreError;

/// Read-only merchant set plus its spatial index.
#[derive(Debug)]
pub struct MerchantSnapshot {
    version: u64,
    built_at: DateTime<Utc>,
    merchants: Vec<MerchantLocation>,
    grid: GridIndex,
    max_delivery_radius_meters: f64,
}

impl MerchantSnapshot {
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn merchants(&self) -> &[MerchantLocation] {
        &self.merchants
    }

    #[must_use]
    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.merchants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
    }

    /// Largest hard delivery radius of any merchant; nothing beyond it can be
    /// eligible.
    #[must_use]
    pub fn max_delivery_radius_meters(&self) -> f64 {
        self.max_delivery_radius_meters
    }
}

/// A merchant record left out of a snapshot, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMerchant {
    pub id: Uuid,
    pub reason: String,
}

/// Result of building a snapshot: the snapshot and whatever was skipped.
#[derive(Debug)]
pub struct SnapshotBuild {
    pub snapshot: MerchantSnapshot,
    pub rejected: Vec<RejectedMerchant>,
}

/// Build a snapshot from a merchant iterable.
///
/// Records with inconsistent radii or a repeated id are rejected rather than
/// indexed. The first occurrence of an id wins.
///
/// # Errors
///
/// Returns [`CoreError::InvariantViolation`] if `cell_size_degrees` is invalid.
pub fn build_snapshot<I>(
    version: u64,
    cell_size_degrees: f64,
    merchants: I,
) -> Result<SnapshotBuild, CoreError>
where
    I: IntoIterator<Item = MerchantLocation>,
{
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for merchant in merchants {
        if let Err(reason) = merchant.check_consistency() {
            rejected.push(RejectedMerchant {
                id: merchant.id,
                reason,
            });
            continue;
        }
        if !seen.insert(merchant.id) {
            rejected.push(RejectedMerchant {
                id: merchant.id,
                reason: "duplicate merchant id".to_string(),
            });
            continue;
        }
        accepted.push(merchant);
    }

    let grid = GridIndex::build(cell_size_degrees, accepted.iter().map(|m| m.coordinate))?;
    let max_delivery_radius_meters = accepted
        .iter()
        .map(|m| m.max_delivery_radius_meters)
        .fold(0.0_f64, f64::max);

    Ok(SnapshotBuild {
        snapshot: MerchantSnapshot {
            version,
            built_at: Utc::now(),
            merchants: accepted,
            grid,
            max_delivery_radius_meters,
        },
        rejected,
    })
}

/// Holder of the currently published snapshot.
///
/// The lock only guards the pointer swap; building never happens under it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<MerchantSnapshot>>>,
    last_version: AtomicU64,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a new snapshot from `merchants` and publish it.
    ///
    /// Returns the published snapshot together with the rejected records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if the build fails; the
    /// previously published snapshot stays in place.
    pub fn rebuild<I>(
        &self,
        cell_size_degrees: f64,
        merchants: I,
    ) -> Result<(Arc<MerchantSnapshot>, Vec<RejectedMerchant>), CoreError>
    where
        I: IntoIterator<Item = MerchantLocation>,
    {
        let version = self.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        let SnapshotBuild { snapshot, rejected } =
            build_snapshot(version, cell_size_degrees, merchants)?;
        let snapshot = Arc::new(snapshot);
        self.publish(Arc::clone(&snapshot));
        Ok((snapshot, rejected))
    }

    /// Swap in `snapshot` unless a newer version is already published.
    pub fn publish(&self, snapshot: Arc<MerchantSnapshot>) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let is_newer = current
            .as_ref()
            .is_none_or(|existing| existing.version < snapshot.version);
        if is_newer {
            self.last_version
                .fetch_max(snapshot.version, Ordering::SeqCst);
            *current = Some(snapshot);
        }
    }

    /// The published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotUnavailable`] before the first publish.
    pub fn current(&self) -> Result<Arc<MerchantSnapshot>, CoreError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or(CoreError::SnapshotUnavailable)
    }

    /// Version of the published snapshot, if any.
    #[must_use]
    pub fn current_version(&self) -> Option<u64> {
        self.current().ok().map(|s| s.version)
    }
}

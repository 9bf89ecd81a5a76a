//! Query orchestration: one request against one snapshot.
//!
//! validate -> grid prefilter -> haversine -> eligibility -> fee/ETA -> rank
//! -> paginate. Nothing here keeps state between requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::eligibility::{check_eligibility, Eligibility, IneligibilityReason, RangeBand};
use crate::eta::{estimate_eta, EtaPolicy};
use crate::fees::{calculate_fee, DeliveryTiers, FeePolicy};
use crate::geo::{haversine_meters, Coordinate, EARTH_RADIUS_METERS};
use crate::peak::{Clock, PeakSchedule};
use crate::ranking::{paginate, rank};
use crate::snapshot::MerchantSnapshot;
use crate::CoreError;

/// Candidates processed between cancellation checks.
pub const CANCELLATION_CHECK_INTERVAL: usize = 512;

/// Everything the pipeline needs besides the request and the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    pub earth_radius_meters: f64,
    pub tiers: DeliveryTiers,
    pub fee_policy: FeePolicy,
    pub eta_policy: EtaPolicy,
    pub peak_schedule: PeakSchedule,
    pub max_search_radius_meters: f64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            earth_radius_meters: EARTH_RADIUS_METERS,
            tiers: DeliveryTiers::default(),
            fee_policy: FeePolicy::default(),
            eta_policy: EtaPolicy::default(),
            peak_schedule: PeakSchedule::default(),
            max_search_radius_meters: 50_000.0,
        }
    }
}

/// A validated merchant-discovery request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub origin: Coordinate,
    /// When absent, the snapshot's largest hard radius is used.
    pub search_radius_meters: Option<f64>,
    pub limit: usize,
    pub offset: usize,
    pub require_accepting_orders: bool,
    /// Keep ineligible merchants (with a reason) in the result.
    pub include_ineligible: bool,
}

impl QueryRequest {
    /// Validate raw request parameters.
    ///
    /// Signed `limit`/`offset` are accepted so out-of-range values are
    /// reported instead of failing to parse upstream.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCoordinate`] for a bad origin and
    /// [`CoreError::InvalidQueryParameter`] for a non-positive limit, a
    /// negative offset, or a radius that is not positive, finite, and at most
    /// `max_search_radius_meters`.
    pub fn new(
        latitude: f64,
        longitude: f64,
        search_radius_meters: Option<f64>,
        limit: i64,
        offset: i64,
        max_search_radius_meters: f64,
    ) -> Result<Self, CoreError> {
        let origin = Coordinate::new(latitude, longitude)?;

        if limit <= 0 {
            return Err(CoreError::InvalidQueryParameter {
                name: "limit",
                reason: format!("must be greater than 0, got {limit}"),
            });
        }
        if offset < 0 {
            return Err(CoreError::InvalidQueryParameter {
                name: "offset",
                reason: format!("must not be negative, got {offset}"),
            });
        }
        if let Some(radius) = search_radius_meters {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(CoreError::InvalidQueryParameter {
                    name: "radius",
                    reason: format!("must be a positive number of meters, got {radius}"),
                });
            }
            if radius > max_search_radius_meters {
                return Err(CoreError::InvalidQueryParameter {
                    name: "radius",
                    reason: format!(
                        "must not exceed {max_search_radius_meters} meters, got {radius}"
                    ),
                });
            }
        }

        let to_usize = |name: &'static str, value: i64| {
            usize::try_from(value).map_err(|e| CoreError::InvalidQueryParameter {
                name,
                reason: e.to_string(),
            })
        };

        Ok(Self {
            origin,
            search_radius_meters,
            limit: to_usize("limit", limit)?,
            offset: to_usize("offset", offset)?,
            require_accepting_orders: true,
            include_ineligible: false,
        })
    }

    #[must_use]
    pub fn require_accepting_orders(mut self, required: bool) -> Self {
        self.require_accepting_orders = required;
        self
    }

    #[must_use]
    pub fn include_ineligible(mut self, include: bool) -> Self {
        self.include_ineligible = include;
        self
    }
}

/// One merchant in a query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    /// Unrounded great-circle distance.
    pub distance_meters: f64,
    pub delivery_fee: Option<Decimal>,
    pub eta_minutes: Option<u32>,
    pub eligible: bool,
    pub ineligibility_reason: Option<IneligibilityReason>,
    pub range_band: Option<RangeBand>,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The requested page.
    pub entries: Vec<ResultEntry>,
    /// Entries before pagination.
    pub total_count: usize,
    pub snapshot_version: u64,
    pub is_peak: bool,
}

/// Shared flag a caller raises to abandon a running query.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stateless query façade over a settings bundle and a clock.
#[derive(Clone)]
pub struct QueryEngine {
    settings: Arc<QuerySettings>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    #[must_use]
    pub fn new(settings: Arc<QuerySettings>, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    #[must_use]
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Run `request` against `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` is raised mid-query, or
    /// [`CoreError::InvariantViolation`] if arithmetic on validated input
    /// produces an impossible value.
    pub fn execute(
        &self,
        snapshot: &MerchantSnapshot,
        request: &QueryRequest,
        cancel: Option<&CancellationFlag>,
    ) -> Result<QueryResult, CoreError> {
        let settings = &*self.settings;
        let is_peak = settings.peak_schedule.is_peak(self.clock.now());

        let radius = request
            .search_radius_meters
            .unwrap_or_else(|| snapshot.max_delivery_radius_meters());
        let candidates =
            snapshot
                .grid()
                .candidates(request.origin, radius, settings.earth_radius_meters);

        let merchants = snapshot.merchants();
        let mut entries = Vec::new();

        for (processed, index) in candidates.into_iter().enumerate() {
            if processed % CANCELLATION_CHECK_INTERVAL == 0 {
                if let Some(flag) = cancel {
                    if flag.is_cancelled() {
                        return Err(CoreError::Cancelled { processed });
                    }
                }
            }

            let Some(merchant) = merchants.get(index) else {
                return Err(CoreError::InvariantViolation(format!(
                    "grid returned index {index} for a snapshot of {} merchants",
                    merchants.len()
                )));
            };

            let distance =
                haversine_meters(request.origin, merchant.coordinate, settings.earth_radius_meters);
            if !distance.is_finite() {
                return Err(CoreError::InvariantViolation(format!(
                    "distance to merchant {} is {distance}",
                    merchant.id
                )));
            }
            if distance > radius {
                continue;
            }

            let eligibility =
                check_eligibility(merchant, distance, request.require_accepting_orders);
            let (eligible, ineligibility_reason) = eligibility.as_pair();

            let entry = match eligibility {
                Eligibility::Eligible(band) => ResultEntry {
                    merchant_id: merchant.id,
                    merchant_name: merchant.name.clone(),
                    distance_meters: distance,
                    delivery_fee: Some(calculate_fee(
                        distance,
                        &settings.tiers,
                        band,
                        is_peak,
                        &settings.fee_policy,
                    )?),
                    eta_minutes: Some(estimate_eta(
                        distance,
                        merchant.preparation_time_minutes,
                        is_peak,
                        &settings.eta_policy,
                    )?),
                    eligible,
                    ineligibility_reason,
                    range_band: Some(band),
                    rating: merchant.rating,
                },
                Eligibility::Ineligible(_) if request.include_ineligible => ResultEntry {
                    merchant_id: merchant.id,
                    merchant_name: merchant.name.clone(),
                    distance_meters: distance,
                    delivery_fee: None,
                    eta_minutes: None,
                    eligible,
                    ineligibility_reason,
                    range_band: None,
                    rating: merchant.rating,
                },
                Eligibility::Ineligible(_) => continue,
            };
            entries.push(entry);
        }

        rank(&mut entries);
        let total_count = entries.len();
        let entries = paginate(entries, request.offset, request.limit);

        Ok(QueryResult {
            entries,
            total_count,
            snapshot_version: snapshot.version(),
            is_peak,
        })
    }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod tests;

//! Distance-tiered delivery fees.
//!
//! Fee = `base + per_km × km` from the first tier covering the distance, then
//! the extended-range surcharge, then the peak multiplier. Multipliers are
//! applied in that order and rounding happens once at the end.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::eligibility::RangeBand;
use crate::{ConfigError, CoreError};

/// One distance band of the fee schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTier", into = "RawTier")]
pub struct DeliveryZoneTier {
    /// Inclusive upper bound; `f64::INFINITY` for the open-ended final tier.
    pub max_distance_meters: f64,
    pub base_fee: Decimal,
    pub per_km_rate: Decimal,
}

/// Wire shape of a tier: an absent or `null` bound means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTier {
    #[serde(default)]
    max_distance_meters: Option<f64>,
    base_fee: Decimal,
    per_km_rate: Decimal,
}

impl TryFrom<RawTier> for DeliveryZoneTier {
    type Error = String;

    fn try_from(raw: RawTier) -> Result<Self, Self::Error> {
        let max_distance_meters = match raw.max_distance_meters {
            None => f64::INFINITY,
            Some(m) if m.is_nan() => return Err("maxDistanceMeters must be a number".to_string()),
            Some(m) => m,
        };
        Ok(Self {
            max_distance_meters,
            base_fee: raw.base_fee,
            per_km_rate: raw.per_km_rate,
        })
    }
}

impl From<DeliveryZoneTier> for RawTier {
    fn from(tier: DeliveryZoneTier) -> Self {
        Self {
            max_distance_meters: tier
                .max_distance_meters
                .is_finite()
                .then_some(tier.max_distance_meters),
            base_fee: tier.base_fee,
            per_km_rate: tier.per_km_rate,
        }
    }
}

impl DeliveryZoneTier {
    fn fee_at(&self, distance_meters: f64) -> Result<Decimal, CoreError> {
        let km = Decimal::from_f64(distance_meters / 1000.0).ok_or_else(|| {
            CoreError::InvariantViolation(format!(
                "distance {distance_meters} m cannot be priced"
            ))
        })?;
        Ok(self.base_fee + self.per_km_rate * km)
    }
}

/// A validated, ascending fee schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeliveryTiers(Vec<DeliveryZoneTier>);

impl DeliveryTiers {
    /// Validate a tier list.
    ///
    /// The list must be non-empty, strictly ascending by bound, have only the
    /// last tier unbounded, carry non-negative amounts, and never step down:
    /// at each boundary the next tier charges at least what the previous one
    /// charged at its upper edge.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violated rule.
    pub fn new(tiers: Vec<DeliveryZoneTier>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one delivery zone tier is required".to_string(),
            ));
        }

        for (i, tier) in tiers.iter().enumerate() {
            if tier.max_distance_meters < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "tier {i} has a negative maxDistanceMeters"
                )));
            }
            if tier.base_fee.is_sign_negative() || tier.per_km_rate.is_sign_negative() {
                return Err(ConfigError::Validation(format!(
                    "tier {i} has a negative fee component"
                )));
            }
            if tier.max_distance_meters.is_infinite() && i + 1 != tiers.len() {
                return Err(ConfigError::Validation(format!(
                    "tier {i} is unbounded but is not the last tier"
                )));
            }
        }

        for (i, pair) in tiers.windows(2).enumerate() {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.max_distance_meters <= lower.max_distance_meters {
                return Err(ConfigError::Validation(format!(
                    "tier {} must have a larger maxDistanceMeters than tier {i}",
                    i + 1
                )));
            }
            let edge = lower.max_distance_meters;
            let before = lower
                .fee_at(edge)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
            let after = upper
                .fee_at(edge)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
            if after < before {
                return Err(ConfigError::Validation(format!(
                    "tier {} undercuts tier {i} at {edge} m ({after} < {before})",
                    i + 1
                )));
            }
        }

        Ok(Self(tiers))
    }

    #[must_use]
    pub fn tiers(&self) -> &[DeliveryZoneTier] {
        &self.0
    }

    /// First tier whose bound covers `distance_meters`; the last tier catches
    /// anything beyond every stated bound.
    #[must_use]
    pub fn tier_for(&self, distance_meters: f64) -> &DeliveryZoneTier {
        self.0
            .iter()
            .find(|t| t.max_distance_meters >= distance_meters)
            .unwrap_or_else(|| &self.0[self.0.len() - 1])
    }
}

impl Default for DeliveryTiers {
    fn default() -> Self {
        Self(vec![
            DeliveryZoneTier {
                max_distance_meters: 3_000.0,
                base_fee: Decimal::new(49, 0),
                per_km_rate: Decimal::ZERO,
            },
            DeliveryZoneTier {
                max_distance_meters: f64::INFINITY,
                base_fee: Decimal::new(49, 0),
                per_km_rate: Decimal::new(10, 0),
            },
        ])
    }
}

impl<'de> Deserialize<'de> for DeliveryTiers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tiers = Vec::<DeliveryZoneTier>::deserialize(deserializer)?;
        DeliveryTiers::new(tiers).map_err(serde::de::Error::custom)
    }
}

/// Multipliers layered on top of the tier fee.
#[derive(Debug, Clone, PartialEq)]
pub struct FeePolicy {
    pub peak_multiplier: Decimal,
    pub extended_range_multiplier: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            peak_multiplier: Decimal::new(12, 1),
            extended_range_multiplier: Decimal::new(15, 1),
        }
    }
}

/// Price a delivery of `distance_meters`.
///
/// # Errors
///
/// Returns [`CoreError::InvariantViolation`] for a negative or non-finite
/// distance; validated input never produces one.
pub fn calculate_fee(
    distance_meters: f64,
    tiers: &DeliveryTiers,
    band: RangeBand,
    is_peak: bool,
    policy: &FeePolicy,
) -> Result<Decimal, CoreError> {
    if !distance_meters.is_finite() || distance_meters < 0.0 {
        return Err(CoreError::InvariantViolation(format!(
            "fee requested for invalid distance {distance_meters}"
        )));
    }

    let mut fee = tiers.tier_for(distance_meters).fee_at(distance_meters)?;
    if band == RangeBand::Extended {
        fee *= policy.extended_range_multiplier;
    }
    if is_peak {
        fee *= policy.peak_multiplier;
    }

    Ok(fee.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

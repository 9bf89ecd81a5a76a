use serde::{Deserialize, Serialize};

use crate::merchants::MerchantLocation;

/// Why a merchant cannot serve a location. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    Inactive,
    NotAcceptingOrders,
    OutOfRange,
}

impl IneligibilityReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IneligibilityReason::Inactive => "INACTIVE",
            IneligibilityReason::NotAcceptingOrders => "NOT_ACCEPTING_ORDERS",
            IneligibilityReason::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which radius band an eligible delivery falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeBand {
    /// Within the soft delivery radius.
    Standard,
    /// Beyond the soft radius but within the hard cutoff; surcharged.
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(RangeBand),
    Ineligible(IneligibilityReason),
}

impl Eligibility {
    #[must_use]
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }

    /// The `(eligible, reason)` pair reported on result entries.
    #[must_use]
    pub fn as_pair(self) -> (bool, Option<IneligibilityReason>) {
        match self {
            Eligibility::Eligible(_) => (true, None),
            Eligibility::Ineligible(reason) => (false, Some(reason)),
        }
    }
}

/// Apply the operational-status and hard-radius rules to one merchant.
#[must_use]
pub fn check_eligibility(
    merchant: &MerchantLocation,
    distance_meters: f64,
    require_accepting_orders: bool,
) -> Eligibility {
    if !merchant.is_active {
        return Eligibility::Ineligible(IneligibilityReason::Inactive);
    }
    if require_accepting_orders && !merchant.is_accepting_orders {
        return Eligibility::Ineligible(IneligibilityReason::NotAcceptingOrders);
    }
    if distance_meters > merchant.max_delivery_radius_meters {
        return Eligibility::Ineligible(IneligibilityReason::OutOfRange);
    }

    if distance_meters <= merchant.delivery_radius_meters {
        Eligibility::Eligible(RangeBand::Standard)
    } else {
        Eligibility::Eligible(RangeBand::Extended)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::geo::Coordinate;

    fn merchant() -> MerchantLocation {
        MerchantLocation {
            id: Uuid::from_u128(1),
            name: "Test Kitchen".to_string(),
            coordinate: Coordinate::new(14.5995, 120.9842).expect("coordinate"),
            delivery_radius_meters: 3_000.0,
            max_delivery_radius_meters: 5_000.0,
            is_active: true,
            is_accepting_orders: true,
            preparation_time_minutes: 15,
            rating: 4.0,
        }
    }

    #[test]
    fn eligible_at_hard_radius_boundary() {
        assert_eq!(
            check_eligibility(&merchant(), 5_000.0, true),
            Eligibility::Eligible(RangeBand::Extended)
        );
    }

    #[test]
    fn out_of_range_just_past_hard_radius() {
        assert_eq!(
            check_eligibility(&merchant(), 5_000.01, true),
            Eligibility::Ineligible(IneligibilityReason::OutOfRange)
        );
    }

    #[test]
    fn standard_band_up_to_soft_radius() {
        assert_eq!(
            check_eligibility(&merchant(), 3_000.0, true),
            Eligibility::Eligible(RangeBand::Standard)
        );
        assert_eq!(
            check_eligibility(&merchant(), 3_000.5, true),
            Eligibility::Eligible(RangeBand::Extended)
        );
    }

    #[test]
    fn inactive_is_reported_before_range() {
        let mut m = merchant();
        m.is_active = false;
        m.is_accepting_orders = false;
        assert_eq!(
            check_eligibility(&m, 9_000.0, true),
            Eligibility::Ineligible(IneligibilityReason::Inactive)
        );
    }

    #[test]
    fn not_accepting_orders_only_when_required() {
        let mut m = merchant();
        m.is_accepting_orders = false;
        assert_eq!(
            check_eligibility(&m, 100.0, true),
            Eligibility::Ineligible(IneligibilityReason::NotAcceptingOrders)
        );
        assert!(check_eligibility(&m, 100.0, false).is_eligible());
    }

    #[test]
    fn reason_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&IneligibilityReason::NotAcceptingOrders).expect("json");
        assert_eq!(json, "\"NOT_ACCEPTING_ORDERS\"");
        assert_eq!(
            Eligibility::Ineligible(IneligibilityReason::OutOfRange).as_pair(),
            (false, Some(IneligibilityReason::OutOfRange))
        );
    }
}

use crate::CoreError;

/// Travel-speed assumptions for ETA estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaPolicy {
    /// Urban courier speed; 300 m/min is roughly 18 km/h.
    pub average_speed_meters_per_minute: f64,
    /// Travel-time multiplier during peak windows.
    pub peak_multiplier: f64,
}

impl Default for EtaPolicy {
    fn default() -> Self {
        Self {
            average_speed_meters_per_minute: 300.0,
            peak_multiplier: 1.3,
        }
    }
}

/// Estimated minutes from order to doorstep: preparation plus travel.
///
/// Travel is `distance / speed`, scaled by the congestion factor at peak,
/// then rounded up to a whole minute.
///
/// # Errors
///
/// Returns [`CoreError::InvariantViolation`] for a negative or non-finite
/// distance, or a travel time too large to represent.
pub fn estimate_eta(
    distance_meters: f64,
    preparation_time_minutes: u32,
    is_peak: bool,
    policy: &EtaPolicy,
) -> Result<u32, CoreError> {
    if !distance_meters.is_finite() || distance_meters < 0.0 {
        return Err(CoreError::InvariantViolation(format!(
            "ETA requested for invalid distance {distance_meters}"
        )));
    }

    let mut travel = distance_meters / policy.average_speed_meters_per_minute;
    if is_peak {
        travel *= policy.peak_multiplier;
    }
    let travel = travel.ceil();

    if !travel.is_finite() || travel > f64::from(u32::MAX - preparation_time_minutes) {
        return Err(CoreError::InvariantViolation(format!(
            "travel time {travel} min for {distance_meters} m is out of range"
        )));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let travel = travel as u32;
    Ok(preparation_time_minutes + travel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_is_preparation_time() {
        for prep in [0, 10, 45] {
            assert_eq!(
                estimate_eta(0.0, prep, false, &EtaPolicy::default()).expect("eta"),
                prep
            );
        }
    }

    #[test]
    fn travel_rounds_up_to_whole_minutes() {
        // 301 m at 300 m/min = 1.003 -> 2 minutes
        assert_eq!(
            estimate_eta(301.0, 15, false, &EtaPolicy::default()).expect("eta"),
            17
        );
        assert_eq!(
            estimate_eta(3_000.0, 15, false, &EtaPolicy::default()).expect("eta"),
            25
        );
    }

    #[test]
    fn peak_scales_travel_before_rounding() {
        // 3000 m -> 10 min, * 1.3 = 13 min
        assert_eq!(
            estimate_eta(3_000.0, 15, true, &EtaPolicy::default()).expect("eta"),
            28
        );
        // 1000 m -> 3.33 min, * 1.3 = 4.33 -> 5
        assert_eq!(
            estimate_eta(1_000.0, 0, true, &EtaPolicy::default()).expect("eta"),
            5
        );
    }

    #[test]
    fn peak_does_not_scale_preparation() {
        assert_eq!(
            estimate_eta(0.0, 20, true, &EtaPolicy::default()).expect("eta"),
            20
        );
    }

    #[test]
    fn rejects_negative_distance() {
        let err = estimate_eta(-1.0, 10, false, &EtaPolicy::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[test]
    fn rejects_zero_speed_overflow() {
        let policy = EtaPolicy {
            average_speed_meters_per_minute: 0.0,
            peak_multiplier: 1.0,
        };
        assert!(estimate_eta(100.0, 10, false, &policy).is_err());
    }
}

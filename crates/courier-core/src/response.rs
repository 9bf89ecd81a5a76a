//! Wire shape of a merchant query result, shared by the HTTP endpoint and the
//! CLI. Distances are rounded here and nowhere else.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::eligibility::{IneligibilityReason, RangeBand};
use crate::query::{QueryResult, ResultEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantItem {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub distance_meters: f64,
    pub delivery_fee: Option<Decimal>,
    pub eta_minutes: Option<u32>,
    pub eligible: bool,
    pub ineligibility_reason: Option<IneligibilityReason>,
    pub range_band: Option<RangeBand>,
    pub rating: f64,
}

impl From<ResultEntry> for MerchantItem {
    fn from(entry: ResultEntry) -> Self {
        Self {
            merchant_id: entry.merchant_id,
            merchant_name: entry.merchant_name,
            distance_meters: round_centimetres(entry.distance_meters),
            delivery_fee: entry.delivery_fee,
            eta_minutes: entry.eta_minutes,
            eligible: entry.eligible,
            ineligibility_reason: entry.ineligibility_reason,
            range_band: entry.range_band,
            rating: entry.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantsData {
    pub merchants: Vec<MerchantItem>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    pub request_id: String,
    pub snapshot_version: u64,
    pub peak_hour: bool,
}

/// Split a query result into the `data` and `meta` halves of the envelope.
#[must_use]
pub fn render_query_result(result: QueryResult, request_id: String) -> (MerchantsData, QueryMeta) {
    let meta = QueryMeta {
        request_id,
        snapshot_version: result.snapshot_version,
        peak_hour: result.is_peak,
    };
    let data = MerchantsData {
        merchants: result.entries.into_iter().map(MerchantItem::from).collect(),
        total_count: result.total_count,
    };
    (data, meta)
}

fn round_centimetres(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ResultEntry {
        ResultEntry {
            merchant_id: Uuid::nil(),
            merchant_name: "Jollibee Ermita".to_string(),
            distance_meters: 812.3456,
            delivery_fee: Some(Decimal::new(49, 0)),
            eta_minutes: Some(18),
            eligible: true,
            ineligibility_reason: None,
            range_band: Some(RangeBand::Standard),
            rating: 4.5,
        }
    }

    #[test]
    fn distances_round_to_centimetres() {
        assert!((round_centimetres(1234.5678) - 1234.57).abs() < 1e-9);
        assert!(round_centimetres(0.004).abs() < f64::EPSILON);
    }

    #[test]
    fn merchant_item_serializes_camel_case() {
        let json = serde_json::to_value(MerchantItem::from(entry())).expect("serialize");
        assert_eq!(json["merchantName"], "Jollibee Ermita");
        assert_eq!(json["distanceMeters"], 812.35);
        assert_eq!(json["deliveryFee"], "49");
        assert_eq!(json["etaMinutes"], 18);
        assert_eq!(json["rangeBand"], "standard");
        assert!(json["ineligibilityReason"].is_null());
    }

    #[test]
    fn render_splits_data_and_meta() {
        let result = QueryResult {
            entries: vec![entry()],
            total_count: 7,
            snapshot_version: 3,
            is_peak: true,
        };
        let (data, meta) = render_query_result(result, "req-9".to_string());
        assert_eq!(data.total_count, 7);
        assert_eq!(data.merchants.len(), 1);

        let meta = serde_json::to_value(meta).expect("serialize");
        assert_eq!(meta["requestId"], "req-9");
        assert_eq!(meta["snapshotVersion"], 3);
        assert_eq!(meta["peakHour"], true);
    }
}

//! End-to-end delivery scenarios through the public API.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use courier_core::{
    parse_merchants, CancellationFlag, FixedClock, IneligibilityReason, MerchantLocation,
    QueryEngine, QueryRequest, QuerySettings, SnapshotStore, EARTH_RADIUS_METERS,
};
use rust_decimal::Decimal;
use uuid::Uuid;

const FIXTURE: &str = r"
merchants:
  - id: 00000000-0000-0000-0000-00000000000a
    name: Binondo Noodle House
    coordinate: { latitude: 14.5995, longitude: 120.9842 }
    delivery_radius_meters: 3000
    max_delivery_radius_meters: 5000
    is_active: true
    is_accepting_orders: true
    preparation_time_minutes: 15
    rating: 4.6
  - id: 00000000-0000-0000-0000-00000000000b
    name: Quiapo Grill
    coordinate: { latitude: 14.6085, longitude: 120.9842 }
    delivery_radius_meters: 3000
    max_delivery_radius_meters: 5000
    is_active: true
    is_accepting_orders: true
    preparation_time_minutes: 20
    rating: 4.1
  - id: 00000000-0000-0000-0000-00000000000c
    name: Intramuros Bakery
    coordinate: { latitude: 14.6175, longitude: 120.9842 }
    delivery_radius_meters: 3000
    max_delivery_radius_meters: 5000
    is_active: false
    is_accepting_orders: true
    preparation_time_minutes: 10
    rating: 4.9
";

const ORIGIN: (f64, f64) = (14.5995, 120.9842);

fn merchants() -> Vec<MerchantLocation> {
    parse_merchants(FIXTURE).expect("fixture").merchants
}

fn engine() -> QueryEngine {
    // 15:00 UTC, outside the default peak windows.
    let now = Utc
        .with_ymd_and_hms(2024, 3, 1, 15, 0, 0)
        .single()
        .expect("instant");
    QueryEngine::new(Arc::new(QuerySettings::default()), Arc::new(FixedClock(now)))
}

fn store_with(merchants: Vec<MerchantLocation>) -> SnapshotStore {
    let store = SnapshotStore::new();
    let (_, rejected) = store.rebuild(0.01, merchants).expect("rebuild");
    assert!(rejected.is_empty());
    store
}

fn north(meters: f64) -> f64 {
    ORIGIN.0 + (meters / EARTH_RADIUS_METERS).to_degrees()
}

#[test]
fn merchant_at_the_origin_is_free_of_distance_charges() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(ORIGIN.0, ORIGIN.1, None, 20, 0, 50_000.0).expect("request");

    let result = engine().execute(&snapshot, &request, None).expect("query");
    let first = &result.entries[0];
    assert_eq!(first.merchant_id, Uuid::from_u128(0xa));
    assert!(first.distance_meters.abs() < 1e-6);
    assert!(first.eligible);
    assert_eq!(first.delivery_fee, Some(Decimal::new(49, 0)));
    assert_eq!(first.eta_minutes, Some(15));
}

#[test]
fn customer_six_km_away_is_out_of_range() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(north(-6_000.0), ORIGIN.1, Some(6_500.0), 20, 0, 50_000.0)
        .expect("request")
        .include_ineligible(true);

    let result = engine().execute(&snapshot, &request, None).expect("query");
    let noodle = result
        .entries
        .iter()
        .find(|e| e.merchant_id == Uuid::from_u128(0xa))
        .expect("listed as ineligible");
    assert!(!noodle.eligible);
    assert_eq!(noodle.ineligibility_reason, Some(IneligibilityReason::OutOfRange));
    assert_eq!(noodle.delivery_fee, None);
    assert_eq!(noodle.eta_minutes, None);
}

#[test]
fn inactive_merchant_reports_inactive_first() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(ORIGIN.0, ORIGIN.1, Some(10_000.0), 20, 0, 50_000.0)
        .expect("request")
        .include_ineligible(true);

    let result = engine().execute(&snapshot, &request, None).expect("query");
    let bakery = result
        .entries
        .iter()
        .find(|e| e.merchant_id == Uuid::from_u128(0xc))
        .expect("bakery listed");
    assert_eq!(bakery.ineligibility_reason, Some(IneligibilityReason::Inactive));
}

#[test]
fn second_page_of_size_one_is_the_second_closest() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(ORIGIN.0, ORIGIN.1, None, 1, 1, 50_000.0).expect("request");

    let result = engine().execute(&snapshot, &request, None).expect("query");
    assert_eq!(result.total_count, 2);
    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].merchant_id, Uuid::from_u128(0xb));
}

#[test]
fn repeated_queries_are_identical() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(north(1_200.0), ORIGIN.1, None, 20, 0, 50_000.0)
        .expect("request")
        .include_ineligible(true);
    let engine = engine();

    let first = engine.execute(&snapshot, &request, None).expect("query");
    let second = engine.execute(&snapshot, &request, None).expect("query");
    assert_eq!(first, second);
}

#[test]
fn fees_never_decrease_with_distance() {
    let engine = engine();
    let mut previous = Decimal::ZERO;
    for step in 0..50 {
        let distance = f64::from(step) * 100.0;
        let mut merchant = merchants().remove(0);
        merchant.coordinate =
            courier_core::Coordinate::new(north(distance), ORIGIN.1).expect("coordinate");
        let store = store_with(vec![merchant]);
        let snapshot = store.current().expect("snapshot");
        let request =
            QueryRequest::new(ORIGIN.0, ORIGIN.1, None, 20, 0, 50_000.0).expect("request");
        let result = engine.execute(&snapshot, &request, None).expect("query");
        let fee = result.entries[0].delivery_fee.expect("eligible");
        assert!(fee >= previous, "fee dropped at {distance} m: {fee} < {previous}");
        previous = fee;
    }
}

#[test]
fn cancellation_is_reported() {
    let store = store_with(merchants());
    let snapshot = store.current().expect("snapshot");
    let request = QueryRequest::new(ORIGIN.0, ORIGIN.1, None, 20, 0, 50_000.0).expect("request");
    let flag = CancellationFlag::new();
    flag.cancel();
    assert!(engine().execute(&snapshot, &request, Some(&flag)).is_err());
}

//! Live integration tests for courier-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database from the sqlx
//! test harness. Run with `DATABASE_URL` set and `--ignored`.

use courier_core::{Coordinate, MerchantLocation};
use courier_db::{health_check, list_merchant_locations, seed_merchants};
use uuid::Uuid;

fn merchant(id: u128, name: &str) -> MerchantLocation {
    MerchantLocation {
        id: Uuid::from_u128(id),
        name: name.to_string(),
        coordinate: Coordinate::new(14.5995, 120.9842).expect("coordinate"),
        delivery_radius_meters: 3_000.0,
        max_delivery_radius_meters: 5_000.0,
        is_active: true,
        is_accepting_orders: true,
        preparation_time_minutes: 15,
        rating: 4.5,
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn seed_then_list_round_trips(pool: sqlx::PgPool) {
    health_check(&pool).await.expect("ping");

    let count = seed_merchants(&pool, &[merchant(1, "A"), merchant(2, "B")])
        .await
        .expect("seed");
    assert_eq!(count, 2);

    let rows = list_merchant_locations(&pool).await.expect("list");
    assert_eq!(rows.len(), 2);
    let first = rows[0].clone().into_merchant().expect("convert");
    let expected = merchant(1, "A");
    assert_eq!(first.id, expected.id);
    assert_eq!(first.name, expected.name);
    assert!((first.coordinate.latitude() - 14.5995).abs() < 1e-9);
    assert!((first.coordinate.longitude() - 120.9842).abs() < 1e-9);
    assert!((first.rating - 4.5).abs() < 1e-9);
    assert_eq!(first.preparation_time_minutes, 15);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn reseeding_updates_in_place(pool: sqlx::PgPool) {
    seed_merchants(&pool, &[merchant(1, "Old name")])
        .await
        .expect("seed");
    seed_merchants(&pool, &[merchant(1, "New name")])
        .await
        .expect("reseed");

    let rows = list_merchant_locations(&pool).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "New name");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn soft_deleted_rows_are_hidden(pool: sqlx::PgPool) {
    seed_merchants(&pool, &[merchant(1, "A"), merchant(2, "B")])
        .await
        .expect("seed");
    sqlx::query("UPDATE merchant_locations SET deleted_at = NOW() WHERE public_id = $1")
        .bind(Uuid::from_u128(2))
        .execute(&pool)
        .await
        .expect("soft delete");

    let rows = list_merchant_locations(&pool).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].public_id, Uuid::from_u128(1));
}

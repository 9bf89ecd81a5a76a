//! Database operations for the `merchant_locations` table.

use chrono::{DateTime, Utc};
use courier_core::{Coordinate, MerchantLocation};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `merchant_locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MerchantLocationRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub delivery_radius_meters: f64,
    pub max_delivery_radius_meters: f64,
    pub is_active: bool,
    pub is_accepting_orders: bool,
    pub preparation_time_minutes: i32,
    pub rating: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl MerchantLocationRow {
    /// Translate stored columns into the canonical merchant record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if a column holds a value the query
    /// pipeline cannot accept.
    pub fn into_merchant(self) -> Result<MerchantLocation, DbError> {
        let id = self.public_id;
        let invalid = |reason: String| DbError::InvalidRow { id, reason };

        let latitude = self
            .latitude
            .to_f64()
            .ok_or_else(|| invalid(format!("latitude {} is not representable", self.latitude)))?;
        let longitude = self
            .longitude
            .to_f64()
            .ok_or_else(|| invalid(format!("longitude {} is not representable", self.longitude)))?;
        let coordinate =
            Coordinate::new(latitude, longitude).map_err(|e| invalid(e.to_string()))?;

        let preparation_time_minutes = u32::try_from(self.preparation_time_minutes)
            .map_err(|_| {
                invalid(format!(
                    "preparation time {} is negative",
                    self.preparation_time_minutes
                ))
            })?;

        let rating = self
            .rating
            .to_f64()
            .ok_or_else(|| invalid(format!("rating {} is not representable", self.rating)))?;

        let merchant = MerchantLocation {
            id,
            name: self.name,
            coordinate,
            delivery_radius_meters: self.delivery_radius_meters,
            max_delivery_radius_meters: self.max_delivery_radius_meters,
            is_active: self.is_active,
            is_accepting_orders: self.is_accepting_orders,
            preparation_time_minutes,
            rating,
        };
        merchant.check_consistency().map_err(invalid)?;
        Ok(merchant)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every non-deleted merchant location, ordered by public id.
///
/// Inactive merchants are included; eligibility decides what to do with them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_merchant_locations(pool: &PgPool) -> Result<Vec<MerchantLocationRow>, DbError> {
    let rows = sqlx::query_as::<_, MerchantLocationRow>(
        "SELECT id, public_id, name, latitude, longitude, delivery_radius_meters, \
                max_delivery_radius_meters, is_active, is_accepting_orders, \
                preparation_time_minutes, rating, updated_at \
         FROM merchant_locations \
         WHERE deleted_at IS NULL \
         ORDER BY public_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

fn to_numeric(id: Uuid, field: &str, value: f64, dp: u32) -> Result<Decimal, DbError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(dp))
        .ok_or_else(|| DbError::InvalidRow {
            id,
            reason: format!("{field} {value} is not representable"),
        })
}

/// Upsert merchants by public id.
///
/// Returns the number of merchants processed. All upserts run inside a
/// single transaction; if any operation fails the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails, or
/// [`DbError::InvalidRow`] if a value cannot be stored.
pub async fn seed_merchants(pool: &PgPool, merchants: &[MerchantLocation]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for merchant in merchants {
        let latitude = to_numeric(merchant.id, "latitude", merchant.coordinate.latitude(), 6)?;
        let longitude = to_numeric(merchant.id, "longitude", merchant.coordinate.longitude(), 6)?;
        let rating = to_numeric(merchant.id, "rating", merchant.rating, 2)?;
        let preparation_time_minutes =
            i32::try_from(merchant.preparation_time_minutes).map_err(|_| DbError::InvalidRow {
                id: merchant.id,
                reason: format!(
                    "preparation time {} is too large",
                    merchant.preparation_time_minutes
                ),
            })?;

        sqlx::query(
            "INSERT INTO merchant_locations (public_id, name, latitude, longitude, \
                 delivery_radius_meters, max_delivery_radius_meters, is_active, \
                 is_accepting_orders, preparation_time_minutes, rating) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (public_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 latitude = EXCLUDED.latitude, \
                 longitude = EXCLUDED.longitude, \
                 delivery_radius_meters = EXCLUDED.delivery_radius_meters, \
                 max_delivery_radius_meters = EXCLUDED.max_delivery_radius_meters, \
                 is_active = EXCLUDED.is_active, \
                 is_accepting_orders = EXCLUDED.is_accepting_orders, \
                 preparation_time_minutes = EXCLUDED.preparation_time_minutes, \
                 rating = EXCLUDED.rating, \
                 deleted_at = NULL, \
                 updated_at = NOW()",
        )
        .bind(merchant.id)
        .bind(&merchant.name)
        .bind(latitude)
        .bind(longitude)
        .bind(merchant.delivery_radius_meters)
        .bind(merchant.max_delivery_radius_meters)
        .bind(merchant.is_active)
        .bind(merchant.is_accepting_orders)
        .bind(preparation_time_minutes)
        .bind(rating)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

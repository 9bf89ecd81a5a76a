use std::net::SocketAddr;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::eta::EtaPolicy;
use crate::fees::{DeliveryTiers, FeePolicy};
use crate::geo::EARTH_RADIUS_METERS;
use crate::grid::{MAX_CELL_SIZE_DEGREES, MIN_CELL_SIZE_DEGREES};
use crate::peak::{parse_peak_windows, parse_utc_offset, PeakSchedule};
use crate::ConfigError;

const DEFAULT_DELIVERY_ZONE_TIERS: &str = r#"[{"maxDistanceMeters":3000,"baseFee":"49","perKmRate":"0"},{"maxDistanceMeters":null,"baseFee":"49","perKmRate":"10"}]"#;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_num<T, E>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = E>,
    E: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| invalid(var, e))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation live here, decoupled from the process environment,
/// so tests drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.trim().parse::<SocketAddr>().map_err(|e| invalid(var, e))
    };

    let positive_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value: f64 = parse_num(var, &or_default(var, default))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(var, format!("must be a positive number, got {value}")));
        }
        Ok(value)
    };

    // Multipliers below 1 would turn a surcharge into a discount.
    let multiplier = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        let value: Decimal = parse_num(var, &or_default(var, default))?;
        if value < Decimal::ONE {
            return Err(invalid(var, format!("must be at least 1, got {value}")));
        }
        Ok(value)
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
    let env = parse_environment(&or_default("COURIER_ENV", "development"))?;
    let bind_addr = parse("COURIER_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("COURIER_LOG_LEVEL", "info");

    let db_max_connections: u32 =
        parse_num("COURIER_DB_MAX_CONNECTIONS", &or_default("COURIER_DB_MAX_CONNECTIONS", "10"))?;
    let db_min_connections: u32 =
        parse_num("COURIER_DB_MIN_CONNECTIONS", &or_default("COURIER_DB_MIN_CONNECTIONS", "1"))?;
    let db_acquire_timeout_secs: u64 = parse_num(
        "COURIER_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("COURIER_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::Validation(format!(
            "COURIER_DB_MIN_CONNECTIONS ({db_min_connections}) exceeds COURIER_DB_MAX_CONNECTIONS ({db_max_connections})"
        )));
    }

    let snapshot_refresh_cron = or_default("COURIER_SNAPSHOT_REFRESH_CRON", "0 */5 * * * *");

    let earth_radius_meters =
        positive_f64("EARTH_RADIUS_METERS", &EARTH_RADIUS_METERS.to_string())?;
    let grid_cell_size_degrees = positive_f64("GRID_CELL_SIZE_DEGREES", "0.01")?;
    if !(MIN_CELL_SIZE_DEGREES..=MAX_CELL_SIZE_DEGREES).contains(&grid_cell_size_degrees) {
        return Err(invalid(
            "GRID_CELL_SIZE_DEGREES",
            format!(
                "must be within [{MIN_CELL_SIZE_DEGREES}, {MAX_CELL_SIZE_DEGREES}], got {grid_cell_size_degrees}"
            ),
        ));
    }

    let tiers: DeliveryTiers = serde_json::from_str(&or_default(
        "DELIVERY_ZONE_TIERS",
        DEFAULT_DELIVERY_ZONE_TIERS,
    ))
    .map_err(|e| invalid("DELIVERY_ZONE_TIERS", e))?;

    let fee_policy = FeePolicy {
        peak_multiplier: multiplier("PEAK_FEE_MULTIPLIER", "1.2")?,
        extended_range_multiplier: multiplier("EXTENDED_RANGE_SURCHARGE_MULTIPLIER", "1.5")?,
    };

    let peak_eta_multiplier = positive_f64("PEAK_ETA_MULTIPLIER", "1.3")?;
    if peak_eta_multiplier < 1.0 {
        return Err(invalid(
            "PEAK_ETA_MULTIPLIER",
            format!("must be at least 1, got {peak_eta_multiplier}"),
        ));
    }
    let eta_policy = EtaPolicy {
        average_speed_meters_per_minute: positive_f64("AVERAGE_SPEED_METERS_PER_MINUTE", "300")?,
        peak_multiplier: peak_eta_multiplier,
    };

    let peak_schedule = PeakSchedule {
        windows: parse_peak_windows(&or_default("PEAK_HOUR_WINDOWS", "11:00-13:00,18:00-20:00"))?,
        utc_offset: parse_utc_offset(&or_default("COURIER_TIMEZONE_OFFSET", "+00:00"))?,
    };

    let default_page_size: usize =
        parse_num("DEFAULT_PAGE_SIZE", &or_default("DEFAULT_PAGE_SIZE", "20"))?;
    let max_page_size: usize = parse_num("MAX_PAGE_SIZE", &or_default("MAX_PAGE_SIZE", "100"))?;
    if default_page_size == 0 || default_page_size > max_page_size {
        return Err(ConfigError::Validation(format!(
            "DEFAULT_PAGE_SIZE ({default_page_size}) must be between 1 and MAX_PAGE_SIZE ({max_page_size})"
        )));
    }

    let max_search_radius_meters = positive_f64("MAX_SEARCH_RADIUS_METERS", "50000")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        snapshot_refresh_cron,
        earth_radius_meters,
        grid_cell_size_degrees,
        tiers,
        fee_policy,
        eta_policy,
        peak_schedule,
        default_page_size,
        max_page_size,
        max_search_radius_meters,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "COURIER_ENV",
            format!("unknown environment '{other}'"),
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

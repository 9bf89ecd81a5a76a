use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::ConfigError;

/// Canonical merchant record the query pipeline operates on.
///
/// Constructed by the storage layer (or a fixture file) and never mutated
/// once it is part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantLocation {
    pub id: Uuid,
    pub name: String,
    pub coordinate: Coordinate,
    /// Soft radius served at the standard fee.
    pub delivery_radius_meters: f64,
    /// Hard cutoff; the band between the two radii is surcharged.
    pub max_delivery_radius_meters: f64,
    pub is_active: bool,
    pub is_accepting_orders: bool,
    pub preparation_time_minutes: u32,
    #[serde(default)]
    pub rating: f64,
}

impl MerchantLocation {
    /// Check the radius and rating fields for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the record cannot be indexed.
    pub fn check_consistency(&self) -> Result<(), String> {
        if !self.delivery_radius_meters.is_finite() || self.delivery_radius_meters < 0.0 {
            return Err(format!(
                "delivery radius {} must be a finite non-negative number",
                self.delivery_radius_meters
            ));
        }
        if !self.max_delivery_radius_meters.is_finite()
            || self.max_delivery_radius_meters < self.delivery_radius_meters
        {
            return Err(format!(
                "max delivery radius {} must be finite and at least the delivery radius {}",
                self.max_delivery_radius_meters, self.delivery_radius_meters
            ));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating {} must be within [0, 5]", self.rating));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct MerchantsFile {
    pub merchants: Vec<MerchantLocation>,
}

/// Load and validate a merchant fixture from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_merchants(path: &Path) -> Result<MerchantsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MerchantsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_merchants(&content)
}

/// Parse and validate merchant fixture YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_merchants(content: &str) -> Result<MerchantsFile, ConfigError> {
    let file: MerchantsFile = serde_yaml::from_str(content)?;
    validate_merchants(&file)?;
    Ok(file)
}

fn validate_merchants(file: &MerchantsFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for merchant in &file.merchants {
        if merchant.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "merchant {} must have a non-empty name",
                merchant.id
            )));
        }

        if !seen_ids.insert(merchant.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate merchant id: {}",
                merchant.id
            )));
        }

        merchant.check_consistency().map_err(|reason| {
            ConfigError::Validation(format!("merchant '{}': {reason}", merchant.name))
        })?;
    }

    Ok(())
}

use std::net::SocketAddr;

use crate::eta::EtaPolicy;
use crate::fees::{DeliveryTiers, FeePolicy};
use crate::peak::PeakSchedule;
use crate::query::QuerySettings;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Only the server and the `db` commands need a database.
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub snapshot_refresh_cron: String,
    pub earth_radius_meters: f64,
    pub grid_cell_size_degrees: f64,
    pub tiers: DeliveryTiers,
    pub fee_policy: FeePolicy,
    pub eta_policy: EtaPolicy,
    pub peak_schedule: PeakSchedule,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_search_radius_meters: f64,
}

impl AppConfig {
    /// The database URL, or the error a missing one deserves.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }

    /// The subset of configuration the query pipeline consumes.
    #[must_use]
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            earth_radius_meters: self.earth_radius_meters,
            tiers: self.tiers.clone(),
            fee_policy: self.fee_policy.clone(),
            eta_policy: self.eta_policy.clone(),
            peak_schedule: self.peak_schedule.clone(),
            max_search_radius_meters: self.max_search_radius_meters,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("snapshot_refresh_cron", &self.snapshot_refresh_cron)
            .field("earth_radius_meters", &self.earth_radius_meters)
            .field("grid_cell_size_degrees", &self.grid_cell_size_degrees)
            .field("tiers", &self.tiers)
            .field("fee_policy", &self.fee_policy)
            .field("eta_policy", &self.eta_policy)
            .field("peak_schedule", &self.peak_schedule)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .field("max_search_radius_meters", &self.max_search_radius_meters)
            .finish()
    }
}

//! Merchant discovery and delivery quoting.
//!
//! Given a customer coordinate, find nearby merchants, decide whether each
//! can deliver, and price the delivery with an ETA. Everything here is pure
//! computation over an immutable [`MerchantSnapshot`]; storage and transport
//! live in the sibling crates.

pub mod app_config;
pub mod config;
pub mod eligibility;
mod error;
pub mod eta;
pub mod fees;
pub mod geo;
pub mod grid;
pub mod merchants;
pub mod peak;
pub mod query;
pub mod ranking;
pub mod response;
pub mod snapshot;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use eligibility::{check_eligibility, Eligibility, IneligibilityReason, RangeBand};
pub use error::{ConfigError, CoreError};
pub use eta::{estimate_eta, EtaPolicy};
pub use fees::{calculate_fee, DeliveryTiers, DeliveryZoneTier, FeePolicy};
pub use geo::{haversine_meters, Coordinate, EARTH_RADIUS_METERS};
pub use grid::GridIndex;
pub use merchants::{load_merchants, parse_merchants, MerchantLocation, MerchantsFile};
pub use peak::{Clock, FixedClock, PeakSchedule, PeakWindow, SystemClock};
pub use query::{
    CancellationFlag, QueryEngine, QueryRequest, QueryResult, QuerySettings, ResultEntry,
};
pub use response::{render_query_result, MerchantItem, MerchantsData, QueryMeta};
pub use snapshot::{build_snapshot, MerchantSnapshot, RejectedMerchant, SnapshotStore};

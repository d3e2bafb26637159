use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod group;
pub mod records;
pub mod stock;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use group::{group_records, GroupKey, OrderGroup};
pub use records::{ExternalRecord, FieldValue, ItemRef, NormalizedRecord, ValidationError};
pub use stock::StockSnapshot;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

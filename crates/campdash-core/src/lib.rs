//! Domain types, validation, and flat-file persistence for the campaign
//! dashboard.

mod app_config;
pub mod campaign_store;
pub mod campaigns;
pub mod catalog;
pub mod config;
mod file_io;
pub mod sales;
pub mod targeting;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use campaign_store::CampaignStore;
pub use campaigns::{
    group_by_month, parse_group_list, Campaign, CampaignDraft, GoalType, MonthGroup,
};
pub use catalog::{supplier_slug, CatalogStore, Store, SupplierCatalog};
pub use config::{load_app_config, load_app_config_from_env};
pub use sales::{
    combine_net_sales, AggregationResult, LegacyScope, NetSalesRow, SalesFilter, SalesLine,
    SalesQuery,
};
pub use targeting::{
    percentage, resolve_progress, target_stores, CampaignProgress, TargetProgress,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Input rejected before it reaches persistence or the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("campaign name must be non-empty")]
    EmptyName,
    #[error("supplier must be non-empty")]
    EmptySupplier,
    #[error("at least one product group is required")]
    EmptyGroups,
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    #[error("per-store goal requires at least one store target")]
    MissingStoreTargets,
    #[error("target for {scope} must be non-negative, got {value}")]
    NegativeTarget { scope: String, value: i64 },
}

/// Failures reading or writing the flat-file campaign and catalog stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("catalog file missing: {0}")]
    CatalogMissing(String),
}

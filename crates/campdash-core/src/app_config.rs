use std::net::SocketAddr;
use std::path::PathBuf;

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
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub campaigns_path: PathBuf,
    pub catalog_dir: PathBuf,
    /// Postgres schema holding the sales tables, e.g. `D-1`.
    pub db_schema: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Apply the historical single-store filters on top of the grouped ones.
    pub legacy_scope: bool,
    pub excluded_sellers: Vec<String>,
    pub excluded_cfops: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("campaigns_path", &self.campaigns_path)
            .field("catalog_dir", &self.catalog_dir)
            .field("database_url", &"[redacted]")
            .field("db_schema", &self.db_schema)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("legacy_scope", &self.legacy_scope)
            .field("excluded_sellers", &self.excluded_sellers)
            .field("excluded_cfops", &self.excluded_cfops)
            .finish()
    }
}

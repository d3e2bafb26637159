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
    pub log_level: String,
    pub feed_url: String,
    pub feed_username: String,
    pub feed_password: String,
    pub feed_request_timeout_secs: u64,
    pub feed_reference_series: Option<String>,
    pub feed_reference_folio: Option<String>,
    /// User name stamped into `product_location_stock.sync_user`.
    pub sync_user: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("feed_url", &self.feed_url)
            .field("feed_username", &self.feed_username)
            .field("feed_password", &"[redacted]")
            .field("feed_request_timeout_secs", &self.feed_request_timeout_secs)
            .field("feed_reference_series", &self.feed_reference_series)
            .field("feed_reference_folio", &self.feed_reference_folio)
            .field("sync_user", &self.sync_user)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}

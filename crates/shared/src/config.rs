//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Payment and settlement configuration.
    #[serde(default)]
    pub payment: PaymentConfig,
    /// Background worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment environment (`development` or `production`).
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServerConfig {
    /// Returns true when running in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
///
/// Tokens are minted by the external auth service; this process only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared secret used to verify token signatures.
    pub secret: String,
}

/// Payment and settlement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Payment page the merchant submit endpoint redirects payers to.
    #[serde(default = "default_frontend_pay_url")]
    pub frontend_pay_url: String,
    /// Lifetime of a pending merchant order (and its token) in minutes.
    #[serde(default = "default_order_expire_minutes")]
    pub order_expire_minutes: u32,
    /// IANA time zone that defines the daily-limit day boundary.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Accounts younger than this are not debited by score sync.
    #[serde(default = "default_new_user_protection_days")]
    pub new_user_protection_days: u32,
    /// Maximum number of live order tokens kept in memory.
    ///
    /// Tokens evicted over this bound stop resolving before their order
    /// expires, so keep it above the orders issued within one order TTL.
    #[serde(default = "default_token_cache_capacity")]
    pub token_cache_capacity: u64,
    /// Days a merchant has to answer a dispute before it is refunded.
    #[serde(default = "default_dispute_refund_days")]
    pub dispute_refund_days: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            frontend_pay_url: default_frontend_pay_url(),
            order_expire_minutes: default_order_expire_minutes(),
            timezone: default_timezone(),
            new_user_protection_days: default_new_user_protection_days(),
            token_cache_capacity: default_token_cache_capacity(),
            dispute_refund_days: default_dispute_refund_days(),
        }
    }
}

fn default_frontend_pay_url() -> String {
    "http://localhost:3000/pay".to_string()
}

fn default_order_expire_minutes() -> u32 {
    10
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

fn default_new_user_protection_days() -> u32 {
    7
}

fn default_token_cache_capacity() -> u64 {
    100_000
}

fn default_dispute_refund_days() -> u32 {
    7
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of jobs processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Delay between polls of an empty queue, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Hard timeout for a single job attempt, in seconds.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Delivery attempts per merchant notification.
    #[serde(default = "default_notify_max_attempts")]
    pub notify_max_attempts: i32,
    /// Interval of the bulk expiry sweep, in seconds.
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
    /// Interval of the unanswered-dispute refund pass, in seconds.
    #[serde(default = "default_dispute_sweep_interval_secs")]
    pub dispute_sweep_interval_secs: u64,
    /// Finished jobs older than this are deleted, in hours.
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: u64,
    /// External score synchronization.
    #[serde(default)]
    pub score_sync: ScoreSyncConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            notify_max_attempts: default_notify_max_attempts(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
            dispute_sweep_interval_secs: default_dispute_sweep_interval_secs(),
            job_retention_hours: default_job_retention_hours(),
            score_sync: ScoreSyncConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_job_timeout_secs() -> u64 {
    30
}

fn default_notify_max_attempts() -> i32 {
    5
}

fn default_expiry_sweep_interval_secs() -> u64 {
    60
}

fn default_dispute_sweep_interval_secs() -> u64 {
    3600
}

fn default_job_retention_hours() -> u64 {
    168
}

/// External score feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreSyncConfig {
    /// Whether the periodic sync is scheduled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Page URL template; `{page}` is replaced by the zero-based page number.
    #[serde(default)]
    pub leaderboard_url: String,
    /// Interval between full syncs, in seconds.
    #[serde(default = "default_score_sync_interval_secs")]
    pub interval_secs: u64,
    /// Page requests allowed per `period_secs`.
    #[serde(default = "default_score_sync_rate")]
    pub rate: u32,
    /// Rate limiter window, in seconds.
    #[serde(default = "default_score_sync_period_secs")]
    pub period_secs: u64,
    /// Attempts per page job.
    #[serde(default = "default_score_sync_max_attempts")]
    pub max_attempts: i32,
}

impl Default for ScoreSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            leaderboard_url: String::new(),
            interval_secs: default_score_sync_interval_secs(),
            rate: default_score_sync_rate(),
            period_secs: default_score_sync_period_secs(),
            max_attempts: default_score_sync_max_attempts(),
        }
    }
}

fn default_score_sync_interval_secs() -> u64 {
    3600
}

fn default_score_sync_rate() -> u32 {
    5
}

fn default_score_sync_period_secs() -> u64 {
    1
}

fn default_score_sync_max_attempts() -> i32 {
    5
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CREDIT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("CREDIT__SERVER__PORT", Some("9090")),
                ("CREDIT__DATABASE__URL", Some("postgres://localhost/credit")),
                ("CREDIT__JWT__SECRET", Some("secret")),
                ("CREDIT__PAYMENT__ORDER_EXPIRE_MINUTES", Some("15")),
                ("CREDIT__WORKER__JOB_RETENTION_HOURS", Some("24")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.database.url, "postgres://localhost/credit");
                assert_eq!(config.payment.order_expire_minutes, 15);
                assert_eq!(config.payment.timezone, "Asia/Shanghai");
                assert_eq!(config.worker.notify_max_attempts, 5);
                assert_eq!(config.worker.job_timeout_secs, 30);
                assert_eq!(config.worker.job_retention_hours, 24);
                assert_eq!(config.payment.dispute_refund_days, 7);
                assert!(!config.server.is_production());
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("CREDIT__DATABASE__URL", None::<&str>),
                ("CREDIT__JWT__SECRET", Some("secret")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_is_production() {
        let server = ServerConfig {
            host: default_host(),
            port: default_port(),
            environment: "Production".to_string(),
        };
        assert!(server.is_production());
    }
}

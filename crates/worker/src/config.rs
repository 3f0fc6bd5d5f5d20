use domain::models::DutySettings;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    /// Scheduling, check-in and ledger policy
    #[serde(default)]
    pub duty: DutySettings,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// How far ahead slots are materialized
    #[serde(default = "default_generation_horizon_days")]
    pub generation_horizon_days: i64,

    #[serde(default = "default_generation_interval_minutes")]
    pub generation_interval_minutes: u64,

    #[serde(default = "default_reconciliation_interval_minutes")]
    pub reconciliation_interval_minutes: u64,

    #[serde(default = "default_event_dispatch_interval_secs")]
    pub event_dispatch_interval_secs: u64,

    /// Outbox events published per dispatch pass
    #[serde(default = "default_event_dispatch_batch_size")]
    pub event_dispatch_batch_size: usize,

    #[serde(default = "default_pool_metrics_interval_secs")]
    pub pool_metrics_interval_secs: u64,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            generation_horizon_days: default_generation_horizon_days(),
            generation_interval_minutes: default_generation_interval_minutes(),
            reconciliation_interval_minutes: default_reconciliation_interval_minutes(),
            event_dispatch_interval_secs: default_event_dispatch_interval_secs(),
            event_dispatch_batch_size: default_event_dispatch_batch_size(),
            pool_metrics_interval_secs: default_pool_metrics_interval_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Address of the Prometheus scrape endpoint
    #[serde(default = "default_metrics_listen_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_listen_addr(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_generation_horizon_days() -> i64 {
    56
}
fn default_generation_interval_minutes() -> u64 {
    60
}
fn default_reconciliation_interval_minutes() -> u64 {
    5
}
fn default_event_dispatch_interval_secs() -> u64 {
    5
}
fn default_event_dispatch_batch_size() -> usize {
    100
}
fn default_pool_metrics_interval_secs() -> u64 {
    10
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_metrics_listen_addr() -> String {
    "0.0.0.0:9100".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with DR__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("DR").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults and overrides, without touching
    /// config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [database]
            url = ""
            max_connections = 10
            min_connections = 2
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [duty]
            utc_offset_minutes = 60
            check_in_lead_minutes = 30
            checkout_grace_minutes = 30
            max_range_days = 400
            credit_policy = "flat"
            target_hours = 20.0
            auto_flag_no_shows = false

            [duty.thresholds]
            on_track_ratio = 0.75
            at_risk_ratio = 0.4

            [jobs]
            generation_horizon_days = 56
            generation_interval_minutes = 60
            reconciliation_interval_minutes = 5
            event_dispatch_interval_secs = 5
            event_dispatch_batch_size = 100

            [metrics]
            enabled = false
            listen_addr = "127.0.0.1:9100"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "DR__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        let duty = &self.duty;
        if !duty.has_valid_offset() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "utc_offset_minutes {} is out of range",
                duty.utc_offset_minutes
            )));
        }
        if !duty.thresholds.is_consistent() {
            return Err(ConfigValidationError::InvalidValue(
                "thresholds must satisfy 0 <= at_risk_ratio <= on_track_ratio <= 1".to_string(),
            ));
        }
        if duty.check_in_lead_minutes < 0 || duty.checkout_grace_minutes < 0 {
            return Err(ConfigValidationError::InvalidValue(
                "check_in_lead_minutes and checkout_grace_minutes cannot be negative".to_string(),
            ));
        }
        if duty.max_range_days <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_range_days must be positive".to_string(),
            ));
        }
        if duty.target_hours < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "target_hours cannot be negative".to_string(),
            ));
        }

        if self.jobs.generation_horizon_days <= 0
            || self.jobs.generation_horizon_days > duty.max_range_days
        {
            return Err(ConfigValidationError::InvalidValue(
                "generation_horizon_days must be between 1 and max_range_days".to_string(),
            ));
        }
        if self.jobs.generation_interval_minutes == 0
            || self.jobs.reconciliation_interval_minutes == 0
            || self.jobs.event_dispatch_interval_secs == 0
            || self.jobs.pool_metrics_interval_secs == 0
        {
            return Err(ConfigValidationError::InvalidValue(
                "job intervals must be positive".to_string(),
            ));
        }
        if self.jobs.event_dispatch_batch_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "event_dispatch_batch_size must be at least 1".to_string(),
            ));
        }

        if self.metrics.enabled {
            self.metrics_addr()?;
        }

        Ok(())
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        self.metrics.listen_addr.parse().map_err(|_| {
            ConfigValidationError::InvalidValue(format!(
                "Invalid metrics listen address: {}",
                self.metrics.listen_addr
            ))
        })
    }
}

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::lending::monitoring::DEFAULT_BASELINE_ACCURACY;

const DEFAULT_ALERT_TIMEOUT_SECS: u64 = 3;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the decision service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let artifacts_dir = non_empty_var("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models"));

        let baseline_accuracy = match non_empty_var("BASELINE_ACCURACY") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| (0.0..=1.0).contains(value))
                .ok_or(ConfigError::InvalidBaseline { value: raw })?,
            None => DEFAULT_BASELINE_ACCURACY,
        };

        let alert_webhook = match non_empty_var("DRIFT_ALERT_WEBHOOK") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Some(url),
            Some(url) => return Err(ConfigError::InvalidWebhookUrl { value: url }),
            None => None,
        };

        let alert_timeout = match non_empty_var("DRIFT_ALERT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidAlertTimeout { value: raw })?,
            None => Duration::from_secs(DEFAULT_ALERT_TIMEOUT_SECS),
        };

        let decision_log = non_empty_var("DECISION_LOG_PATH").map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            model: ModelConfig { artifacts_dir },
            monitoring: MonitoringConfig {
                baseline_accuracy,
                alert_webhook,
                alert_timeout,
            },
            storage: StorageConfig { decision_log },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the training-time artifacts loaded at startup.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub artifacts_dir: PathBuf,
}

/// Drift assessment baseline and the outbound alert channel.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub baseline_accuracy: f64,
    pub alert_webhook: Option<String>,
    pub alert_timeout: Duration,
}

/// Audit store selection. Without a path decisions are kept in memory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub decision_log: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBaseline { value: String },
    InvalidWebhookUrl { value: String },
    InvalidAlertTimeout { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBaseline { value } => write!(
                f,
                "BASELINE_ACCURACY must be a number between 0 and 1 (found '{value}')"
            ),
            ConfigError::InvalidWebhookUrl { value } => write!(
                f,
                "DRIFT_ALERT_WEBHOOK must start with http:// or https:// (found '{value}')"
            ),
            ConfigError::InvalidAlertTimeout { value } => write!(
                f,
                "DRIFT_ALERT_TIMEOUT_SECS must be a positive number of seconds (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBaseline { .. }
            | ConfigError::InvalidWebhookUrl { .. }
            | ConfigError::InvalidAlertTimeout { .. } => None,
        }
    }
}

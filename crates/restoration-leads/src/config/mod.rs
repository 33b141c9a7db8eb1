use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::allocation::EngineConfig;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
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
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        let mut engine = match env::var("APP_ENGINE_CONFIG") {
            Ok(path) => load_engine_config(PathBuf::from(path))?,
            Err(_) => EngineConfig::default(),
        };

        if let Ok(raw) = env::var("APP_ALLOCATION_TIMEOUT_MS") {
            engine.allocation_timeout_ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or(ConfigError::InvalidAllocationTimeout)?;
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            engine,
        })
    }
}

fn load_engine_config(path: PathBuf) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::EngineConfigRead {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::EngineConfigParse { path, source })
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidLogFormat(String),
    InvalidAllocationTimeout,
    EngineConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    EngineConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json', found '{value}'")
            }
            ConfigError::InvalidAllocationTimeout => {
                write!(f, "APP_ALLOCATION_TIMEOUT_MS must be a positive integer")
            }
            ConfigError::EngineConfigRead { path, .. } => {
                write!(f, "unable to read engine config {}", path.display())
            }
            ConfigError::EngineConfigParse { path, .. } => {
                write!(f, "engine config {} is not valid JSON", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::InvalidAllocationTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::EngineConfigRead { source, .. } => Some(source),
            ConfigError::EngineConfigParse { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_LOG_FORMAT");
        env::remove_var("APP_ALLOCATION_TIMEOUT_MS");
        env::remove_var("APP_ENGINE_CONFIG");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.allocation_timeout_ms, 2_000);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn allocation_timeout_override_is_applied() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ALLOCATION_TIMEOUT_MS", "750");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.engine.allocation_timeout(),
            std::time::Duration::from_millis(750)
        );
        env::remove_var("APP_ALLOCATION_TIMEOUT_MS");
    }

    #[test]
    fn rejects_zero_allocation_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ALLOCATION_TIMEOUT_MS", "0");
        let err = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(err, ConfigError::InvalidAllocationTimeout));
        env::remove_var("APP_ALLOCATION_TIMEOUT_MS");
    }

    #[test]
    fn json_log_format_is_recognised() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOG_FORMAT", "JSON");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.telemetry.log_format, LogFormat::Json);

        env::set_var("APP_LOG_FORMAT", "yaml");
        let err = AppConfig::load().expect_err("unknown format rejected");
        assert!(matches!(err, ConfigError::InvalidLogFormat(value) if value == "yaml"));
        env::remove_var("APP_LOG_FORMAT");
    }

    #[test]
    fn engine_config_file_overrides_defaults() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let path = env::temp_dir().join(format!("engine-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"valuation":{"ceiling":3000},"matching":{"threshold":60},"allocation_timeout_ms":500}"#,
        )
        .expect("write engine config");
        env::set_var("APP_ENGINE_CONFIG", &path);

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.engine.valuation.ceiling, 3_000);
        assert_eq!(config.engine.valuation.base_value, 200);
        assert_eq!(config.engine.matching.threshold, 60);
        assert_eq!(config.engine.matching.service_area, 50);
        assert_eq!(config.engine.allocation_timeout_ms, 500);

        env::remove_var("APP_ENGINE_CONFIG");
        let _ = std::fs::remove_file(path);
    }
}

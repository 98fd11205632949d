use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub marketplace: MarketplaceConfig,
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

        let reference_data = env::var("APP_REFERENCE_DATA")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let password_pepper = env::var("APP_PASSWORD_PEPPER")
            .ok()
            .filter(|value| !value.is_empty());

        let session_ttl_hours = match env::var("APP_SESSION_TTL_HOURS") {
            Ok(value) if !value.trim().is_empty() => Some(
                value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|hours| *hours > 0)
                    .ok_or(ConfigError::InvalidSessionTtl)?,
            ),
            _ => None,
        };

        if environment == AppEnvironment::Production && password_pepper.is_none() {
            return Err(ConfigError::MissingPepper);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace: MarketplaceConfig {
                reference_data,
                password_pepper,
                session_ttl_hours,
            },
        })
    }
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

/// Marketplace data sources and credential settings.
#[derive(Clone, Default)]
pub struct MarketplaceConfig {
    /// CSV of `region,comuna` rows; the embedded dataset is used when absent.
    pub reference_data: Option<PathBuf>,
    pub password_pepper: Option<String>,
    /// Lifetime of login sessions; the marketplace default applies when absent.
    pub session_ttl_hours: Option<u32>,
}

impl fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("reference_data", &self.reference_data)
            .field(
                "password_pepper",
                &self.password_pepper.as_ref().map(|_| "<redacted>"),
            )
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidSessionTtl,
    InvalidHost { source: std::net::AddrParseError },
    MissingPepper,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidSessionTtl => {
                write!(f, "APP_SESSION_TTL_HOURS must be a positive number of hours")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingPepper => {
                write!(f, "APP_PASSWORD_PEPPER must be set in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidSessionTtl
            | ConfigError::MissingPepper => None,
            ConfigError::InvalidHost { source } => Some(source),
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
        env::remove_var("APP_REFERENCE_DATA");
        env::remove_var("APP_PASSWORD_PEPPER");
        env::remove_var("APP_SESSION_TTL_HOURS");
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
        assert!(config.marketplace.reference_data.is_none());
        assert!(config.marketplace.password_pepper.is_none());
        assert!(config.marketplace.session_ttl_hours.is_none());
    }

    #[test]
    fn session_lifetime_must_be_positive_hours() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SESSION_TTL_HOURS", "12");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marketplace.session_ttl_hours, Some(12));

        for invalid in ["0", "medio día", "-3"] {
            env::set_var("APP_SESSION_TTL_HOURS", invalid);
            assert!(
                matches!(AppConfig::load(), Err(ConfigError::InvalidSessionTtl)),
                "{invalid} accepted"
            );
        }
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PORT", "http");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPort)));
        reset_env();
    }

    #[test]
    fn production_requires_password_pepper() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(AppConfig::load(), Err(ConfigError::MissingPepper)));

        env::set_var("APP_PASSWORD_PEPPER", "s3cret");
        let config = AppConfig::load().expect("pepper satisfies production");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert!(!format!("{:?}", config.marketplace).contains("s3cret"));
        reset_env();
    }
}

//! Runtime configuration.
//!
//! Settings come from three layers, each overriding the one before:
//!
//! 1. a YAML file, `config.yaml` unless `-f <path>` or `MATCHDESK_CONFIG` says otherwise
//!    (a missing file is not an error; everything has a default)
//! 2. `MATCHDESK_*` environment variables, with `__` separating nested keys, so
//!    `MATCHDESK_RECONCILER__INTERVAL=1m` sets `reconciler.interval`
//! 3. a bare `DATABASE_URL`, which replaces `database.url`
//!
//! ```no_run
//! use clap::Parser;
//! use matchdesk::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(&Args::parse())?;
//! println!("binding {}", config.bind_address());
//! # Ok(())
//! # }
//! ```
//!
//! A minimal production file only needs the secrets and the origin of the web client:
//!
//! ```yaml
//! environment: production
//! secret_key: change-me
//! admin_password: change-me-too
//! auth:
//!   security:
//!     cors:
//!       allowed_origins: ["https://crm.example.com"]
//! ```
//!
//! Durations (`auth.security.jwt_expiry`, `reconciler.interval`) are humantime strings such as
//! `30s`, `5m` or `24h`.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use url::Url;

use crate::auth::password::Argon2Params;
use crate::errors::Error;

const MIN_JWT_EXPIRY: Duration = Duration::from_secs(5 * 60);
const MAX_JWT_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YAML configuration file
    #[arg(short = 'f', long, env = "MATCHDESK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Load and check the configuration, then exit
    #[arg(long)]
    pub validate: bool,
}

/// Deployment environment. Production refuses to invent a bootstrap admin password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Populated from the raw `DATABASE_URL` variable; folded into `database.url` on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Account ensured to exist as a super admin at startup
    pub admin_username: String,
    /// Required in production when no super admin exists yet
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    /// HMAC key for session tokens
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    pub reconciler: ReconcilerConfig,
    /// Export traces over OTLP as well as logging them
    pub enable_otel_export: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolSettings,
}

/// sqlx pool sizing. Timeouts are in seconds; `0` disables idle and lifetime recycling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub security: SecurityConfig,
}

/// The cookie a successful login sets. Bearer tokens carry the same JWT.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Only send the cookie over HTTPS. Turn off for plain-HTTP local development.
    pub cookie_secure: bool,
    /// `strict`, `lax` or `none`; anything else is treated as `strict`
    pub cookie_same_site: String,
}

/// Length bounds (in characters) for new passwords and the Argon2id cost used to hash them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl PasswordConfig {
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Reject passwords outside the configured length bounds.
    pub fn check_length(&self, password: &str) -> Result<(), Error> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(Error::BadRequest {
                message: format!("Password must be at least {} characters", self.min_length),
            });
        }
        if length > self.max_length {
            return Err(Error::BadRequest {
                message: format!("Password must be no more than {} characters", self.max_length),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Session lifetime, between 5 minutes and 30 days
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    pub cors: CorsConfig,
}

/// Browser origins allowed to call the API. The web client sends the session cookie, so
/// credentials are on by default and a wildcard origin is refused alongside them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds
    pub max_age: Option<u64>,
}

/// `*` or an absolute origin URL.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "String")]
pub enum CorsOrigin {
    Wildcard,
    Url(Url),
}

impl From<CorsOrigin> for String {
    fn from(origin: CorsOrigin) -> Self {
        match origin {
            CorsOrigin::Wildcard => "*".to_string(),
            CorsOrigin::Url(url) => url.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for CorsOrigin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "*" {
            return Ok(CorsOrigin::Wildcard);
        }
        Url::parse(&raw).map(CorsOrigin::Url).map_err(serde::de::Error::custom)
    }
}

/// Background repair of leads whose payment was accepted but never promoted to `paid`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    /// How often to re-run after the startup pass
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            environment: Environment::default(),
            database_url: None,
            database: DatabaseConfig::default(),
            admin_username: "admin".to_string(),
            admin_password: None,
            secret_key: None,
            auth: AuthConfig::default(),
            reconciler: ReconcilerConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/matchdesk".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 10 * 60,
            max_lifetime_secs: 30 * 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "matchdesk_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "strict".to_string(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        let argon2 = Argon2Params::default();
        Self {
            min_length: 8,
            max_length: 64,
            argon2_memory_kib: argon2.memory_kib,
            argon2_iterations: argon2.iterations,
            argon2_parallelism: argon2.parallelism,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(24 * 60 * 60),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        // Vite dev server
        let dev_origin = Url::parse("http://localhost:5173").map(CorsOrigin::Url);
        Self {
            allowed_origins: dev_origin.into_iter().collect(),
            allow_credentials: true,
            max_age: Some(60 * 60),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5 * 60),
        }
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::Internal {
        operation: format!("validate configuration: {}", reason.into()),
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DATABASE_URL wins over database.url, keeping the configured pool settings
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Reject settings the server cannot run safely with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(invalid(
                "secret_key is not set (MATCHDESK_SECRET_KEY or `secret_key` in the config file)",
            ));
        }

        let password = &self.auth.password;
        if password.min_length < 1 {
            return Err(invalid("auth.password.min_length must be at least 1"));
        }
        if password.min_length > password.max_length {
            return Err(invalid(format!(
                "auth.password.min_length ({}) is greater than max_length ({})",
                password.min_length, password.max_length
            )));
        }

        let expiry = self.auth.security.jwt_expiry;
        if !(MIN_JWT_EXPIRY..=MAX_JWT_EXPIRY).contains(&expiry) {
            return Err(invalid(format!(
                "auth.security.jwt_expiry must be between 5m and 30d, got {}",
                humantime::format_duration(expiry)
            )));
        }

        let cors = &self.auth.security.cors;
        if cors.allowed_origins.is_empty() {
            return Err(invalid("auth.security.cors.allowed_origins needs at least one origin"));
        }
        if cors.allow_credentials && cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
            return Err(invalid(
                "auth.security.cors cannot combine the '*' origin with allow_credentials; list origins explicitly",
            ));
        }

        if self.reconciler.enabled && self.reconciler.interval.is_zero() {
            return Err(invalid("reconciler.interval must be greater than zero when the reconciler is enabled"));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("MATCHDESK_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
admin_username: owner
reconciler:
  interval: 30s
"#,
            )?;

            jail.set_env("MATCHDESK_HOST", "127.0.0.1");
            jail.set_env("MATCHDESK_PORT", "8080");
            jail.set_env("MATCHDESK_ENVIRONMENT", "production");

            let config = Config::load(&args())?;

            // Env vars should override
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert!(config.is_production());

            // YAML values should be preserved
            assert_eq!(config.admin_username, "owner");
            assert_eq!(config.reconciler.interval, Duration::from_secs(30));
            assert!(config.reconciler.enabled);

            Ok(())
        });
    }

    #[test]
    fn test_database_url_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
database:
  url: postgres://yaml/db
  pool:
    max_connections: 3
"#,
            )?;
            jail.set_env("DATABASE_URL", "postgres://env/db");

            let config = Config::load(&args())?;
            assert_eq!(config.database.url, "postgres://env/db");
            assert_eq!(config.database.pool.max_connections, 3);
            assert!(config.database_url.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_nested_auth_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
auth:
  security:
    jwt_expiry: 2h
    cors:
      allowed_origins: ["https://crm.example.com"]
"#,
            )?;
            jail.set_env("MATCHDESK_AUTH__SESSION__COOKIE_SECURE", "false");
            jail.set_env("MATCHDESK_AUTH__PASSWORD__MIN_LENGTH", "12");

            let config = Config::load(&args())?;
            assert!(!config.auth.session.cookie_secure);
            assert_eq!(config.auth.password.min_length, 12);
            assert_eq!(config.auth.security.jwt_expiry, Duration::from_secs(2 * 3600));
            assert!(matches!(
                &config.auth.security.cors.allowed_origins[0],
                CorsOrigin::Url(url) if url.as_str() == "https://crm.example.com/"
            ));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\nenable_metrics: true\n")?;
            assert!(Config::load(&args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_config_validation_missing_secret() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn test_config_validation_invalid_password_length() {
        let mut config = Config {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        config.auth.password.min_length = 20;
        config.auth.password.max_length = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_jwt_expiry_bounds() {
        let mut config = Config {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        config.auth.security.jwt_expiry = Duration::from_secs(60);
        assert!(config.validate().is_err());

        config.auth.security.jwt_expiry = Duration::from_secs(86400 * 31);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_wildcard_with_credentials() {
        let mut config = Config {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        config.auth.security.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        assert!(config.validate().is_err());

        config.auth.security.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_reconciler_interval() {
        let mut config = Config {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        config.reconciler.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.reconciler.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cors_origin_parsing() {
        let origins: Vec<CorsOrigin> = serde_json::from_str(r#"["*", "https://crm.example.com"]"#).unwrap();
        assert!(matches!(origins[0], CorsOrigin::Wildcard));
        assert!(matches!(&origins[1], CorsOrigin::Url(url) if url.host_str() == Some("crm.example.com")));

        assert!(serde_json::from_str::<CorsOrigin>(r#""not a url""#).is_err());
    }

    #[test]
    fn test_config_validation_valid_config() {
        let config = Config {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}

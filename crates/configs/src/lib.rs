//! # Settings
//!
//! Layered configuration, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/{SNIPSOCIAL_ENV}.toml` (optional)
//! 4. `SNIPSOCIAL__SECTION__KEY` environment variables
//!
//! `.env` is loaded into the process environment before any of that.

use std::path::Path;

use config::{Config, Environment, File, Map};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub use secrecy::ExposeSecret;

pub const ENV_PREFIX: &str = "SNIPSOCIAL";
const PROFILE_VAR: &str = "SNIPSOCIAL_ENV";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,
    /// Required when `backend = "postgres"`.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// HS256 key shared with the identity service that issues tokens.
    pub jwt_secret: SecretString,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

/// Exports the variables in `path` into the process environment.
/// Returns whether the file existed.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl Settings {
    /// Loads `.env`, then the layered sources from `./config`.
    ///
    /// A missing `.env` is fine; one that exists but cannot be read or
    /// parsed is an error, since logging is not set up yet to report it.
    pub fn load() -> Result<Self, ConfigError> {
        load_env_file(Path::new(".env"))?;
        let profile = std::env::var(PROFILE_VAR).unwrap_or_else(|_| "development".to_string());
        Self::from_sources("config", &profile, None)
    }

    /// Builds settings from `dir` and the given profile.
    ///
    /// `env` replaces the process environment as the variable source when set.
    pub fn from_sources(dir: &str, profile: &str, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.backend", "memory")?
            .set_default("database.max_connections", 10)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(File::with_name(&format!("{dir}/default")).required(false))
            .add_source(File::with_name(&format!("{dir}/{profile}")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.backend == DatabaseBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Invalid("database.url is required for the postgres backend".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".into()));
        }
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        Settings::from_sources("does-not-exist", "test", env(pairs))
    }

    #[test]
    fn defaults_apply_when_only_secret_is_given() {
        let settings = load(&[("SNIPSOCIAL__AUTH__JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(settings.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(settings.database.backend, DatabaseBackend::Memory);
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert!(settings.auth.issuer.is_none());
        assert_eq!(settings.auth.jwt_secret.expose_secret(), "s3cret");
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = load(&[
            ("SNIPSOCIAL__AUTH__JWT_SECRET", "s3cret"),
            ("SNIPSOCIAL__SERVER__PORT", "9090"),
            ("SNIPSOCIAL__LOG__FORMAT", "json"),
            ("SNIPSOCIAL__DATABASE__BACKEND", "postgres"),
            ("SNIPSOCIAL__DATABASE__URL", "postgres://localhost/snipsocial"),
        ])
        .unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.database.backend, DatabaseBackend::Postgres);
        assert!(settings.database.url.is_some());
    }

    #[test]
    fn postgres_without_url_is_rejected() {
        let err = load(&[
            ("SNIPSOCIAL__AUTH__JWT_SECRET", "s3cret"),
            ("SNIPSOCIAL__DATABASE__BACKEND", "postgres"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_secret_fails_to_load() {
        assert!(matches!(load(&[]), Err(ConfigError::Load(_))));
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let path = std::env::temp_dir().join("snipsocial-no-such-dir").join(".env");
        assert!(!load_env_file(&path).unwrap());
    }

    #[test]
    fn unreadable_env_file_is_reported() {
        // A directory exists but cannot be read as a file.
        let err = load_env_file(&std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, ConfigError::DotEnv(_)));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = load(&[("SNIPSOCIAL__AUTH__JWT_SECRET", "s3cret")]).unwrap();
        assert!(!format!("{settings:?}").contains("s3cret"));
    }
}

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub risk: RiskThresholds,
    pub recaptcha: RecaptchaConfig,
    pub payment: PaymentConfig,
    pub notifications: NotificationConfig,
    /// File the configuration was read from; `None` when defaults were used
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/consult_intake.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
        }
    }
}

/// Total-score cut-offs used to classify a submission
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskThresholds {
    pub moderate: i64,
    pub high: i64,
    pub critical: i64,
    /// Scores at or above this require a practitioner rather than a consultant
    pub expert: i64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate: 10,
            high: 20,
            critical: 30,
            expert: 20,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.moderate <= self.high && self.high <= self.critical) {
            return Err(AppError::Config(format!(
                "risk thresholds must be ascending (moderate={}, high={}, critical={})",
                self.moderate, self.high, self.critical
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecaptchaConfig {
    /// Verification is skipped when unset
    pub secret: Option<String>,
    pub verify_url: String,
    pub min_score: f64,
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret: None,
            verify_url: "https://www.google.com/recaptcha/api/siteverify".to_string(),
            min_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub server_key: String,
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            currency: "IDR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load `config.toml` (or `$CONSULT_CONFIG`), then apply environment overrides.
    ///
    /// Runs before logging is installed, so problems are returned, not logged.
    pub fn load() -> Result<Self> {
        let path = env::var("CONSULT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(var)?;
        config.risk.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.risk.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("CONSULT_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid CONSULT_PORT value '{port}': {e}")))?;
        }
        if let Some(path) = var("CONSULT_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(dir) = var("CONSULT_LOG_DIR") {
            self.logging.dir = dir;
        }
        if let Some(secret) = var("RECAPTCHA_SECRET") {
            self.recaptcha.secret = Some(secret);
        }
        if let Some(key) = var("PAYMENT_SERVER_KEY") {
            self.payment.server_key = key;
        }
        if let Some(url) = var("CRISIS_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
        }
        Ok(())
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [risk]
            critical = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.risk.critical, 40);
        assert_eq!(config.risk.high, 20);
        assert_eq!(config.payment.currency, "IDR");
        assert!(config.recaptcha.secret.is_none());
    }

    #[test]
    fn rejects_descending_thresholds() {
        let err = Config::from_toml(
            r#"
            [risk]
            moderate = 25
            high = 20
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.risk, RiskThresholds::default());
        assert!(config.source.is_none());
    }

    #[test]
    fn file_source_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\ndir = \"var/log\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.logging.dir, "var/log");
    }

    #[test]
    fn env_overrides_apply_and_bad_port_fails() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                "CONSULT_PORT" => Some("9100".into()),
                "CONSULT_LOG_DIR" => Some("/tmp/consult".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.logging.dir, "/tmp/consult");

        let err = Config::default()
            .apply_overrides(|key| (key == "CONSULT_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("CONSULT_PORT")));
    }
}

use anyhow::{Context, Result};
use komainu_core::retry::RetryPolicy;
use komainu_core::AppConfig;
use komainu_db::StoreOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub polls: PollConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
            max_concurrent_requests: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/komainu.db?mode=rwc".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
            acquire_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub pending_ttl_seconds: u64,
    pub conflict_max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            pending_ttl_seconds: 15 * 60,
            conflict_max_attempts: RetryPolicy::default().max_attempts,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub application_user_id: Option<i64>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            Self::parse(&raw).with_context(|| format!("parsing config file {path}"))?
        } else {
            tracing::info!("Config file {path} not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("KOMAINU_BIND_ADDRESS") {
            self.server.bind_address = bind;
        }
        if let Some(url) = lookup("KOMAINU_DATABASE_URL") {
            self.database.url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.polls.conflict_max_attempts == 0 {
            anyhow::bail!("polls.conflict_max_attempts must be at least 1");
        }
        if self.server.max_concurrent_requests == 0 {
            anyhow::bail!("server.max_concurrent_requests must be at least 1");
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            acquire_timeout: Duration::from_millis(self.database.acquire_timeout_ms),
            ..StoreOptions::new(&self.database.url, self.database.max_connections)
        }
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            application_user_id: self.bot.application_user_id,
            retry: RetryPolicy {
                max_attempts: self.polls.conflict_max_attempts,
                ..RetryPolicy::default()
            },
            pending_poll_ttl: Duration::from_secs(self.polls.pending_ttl_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config.server.bind_address, "127.0.0.1:8090");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.app_config().pending_poll_ttl, Duration::from_secs(900));
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [database]
            url = "sqlite://./x.db"
            busy_timeout_ms = 250

            [polls]
            conflict_max_attempts = 9

            [bot]
            application_user_id = 1234
            "#,
        )
        .expect("parse");
        assert_eq!(config.store_options().database_url, "sqlite://./x.db");
        assert_eq!(config.store_options().busy_timeout, Duration::from_millis(250));
        assert_eq!(config.app_config().retry.max_attempts, 9);
        assert_eq!(config.app_config().application_user_id, Some(1234));
        assert_eq!(config.database.max_connections, 8);
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "KOMAINU_BIND_ADDRESS" => Some("0.0.0.0:9000".to_string()),
            _ => None,
        });
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.database.url, DatabaseConfig::default().url);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = Config::parse("[polls]\nconflict_max_attempts = 0").expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("komainu.toml");
        std::fs::write(&path, "[server]\nbind_address = \"127.0.0.1:1\"\n").expect("write");
        let config = Config::load(&path.to_string_lossy()).expect("load");
        assert!(!config.server.bind_address.is_empty());
    }
}

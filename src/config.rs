use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    pub health_check: HealthCheckConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    pub upstream_url: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("config validation error: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "probe_timeout_ms must be > 0".to_string(),
            ));
        }

        validate_health_check(&self.health_check)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_health_check(cfg: &HealthCheckConfig) -> Result<(), ConfigError> {
    let url = cfg.upstream_url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "health_check.upstream_url is required".to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "health_check.upstream_url must start with http:// or https://".to_string(),
        ));
    }
    if cfg.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "health_check.timeout_ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

const fn default_probe_timeout_ms() -> u64 {
    5000
}

const fn default_upstream_timeout_ms() -> u64 {
    10000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            listen: "127.0.0.1:9310".to_string(),
            probe_timeout_ms: 5000,
            health_check: HealthCheckConfig {
                upstream_url: "http://127.0.0.1:3000/healthz".to_string(),
                timeout_ms: 10000,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        valid_config().validate().expect("config should validate");
    }

    #[test]
    fn empty_listen_rejected() {
        let mut cfg = valid_config();
        cfg.listen = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_listen_rejected() {
        let mut cfg = valid_config();
        cfg.listen = "not-an-address".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_probe_timeout_rejected() {
        let mut cfg = valid_config();
        cfg.probe_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn upstream_url_scheme_required() {
        let mut cfg = valid_config();
        cfg.health_check.upstream_url = "127.0.0.1:3000".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn example_config_parses_and_validates() {
        let cfg: Config =
            serde_yaml::from_str(Config::example_yaml()).expect("example config should parse");
        cfg.validate().expect("example config should validate");
    }

    #[test]
    fn probe_timeout_defaults_when_absent() {
        let cfg: Config = serde_yaml::from_str(
            "listen: \"127.0.0.1:9310\"\nhealth_check:\n  upstream_url: \"http://up/health\"\n",
        )
        .expect("minimal config should parse");
        assert_eq!(cfg.probe_timeout_ms, 5000);
        assert_eq!(cfg.health_check.timeout_ms, 10000);
    }
}

use gateway::config::{Config as GatewayConfig, Listener, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    #[serde(flatten)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

/// Values given on the command line take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub listener: Option<Listener>,
    pub base_path: Option<String>,
    pub cache_ttl_secs: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(listener) = &self.listener {
            config.listener = listener.clone();
        }
        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.clone();
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.github.cache_ttl_secs = ttl;
        }
    }
}

/// Parses `host:port`.
pub fn parse_listener(addr: &str) -> Result<Listener, String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got '{addr}'"))?;
    let port = port
        .parse()
        .map_err(|err| format!("invalid port '{port}': {err}"))?;

    Ok(Listener {
        host: host.to_string(),
        port,
    })
}

/// Parses a duration in whole seconds, either a plain number of seconds or a
/// sequence of `<n>h`, `<n>m` and `<n>s` parts such as `5m` or `1h30m`.
pub fn parse_ttl(value: &str) -> Result<u64, String> {
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }
    if value.is_empty() {
        return Err("expected a duration such as 300 or 5m".to_string());
    }

    let mut total: u64 = 0;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration '{value}': expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|err| format!("invalid duration '{value}': {err}"))?;
        rest = &rest[digits..];

        let unit = rest.chars().next().ok_or_else(|| {
            format!("invalid duration '{value}': missing unit after {amount}")
        })?;
        let scale = match unit {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("invalid duration '{value}': unknown unit '{unit}'")),
        };
        rest = &rest[unit.len_utf8()..];

        total = amount
            .checked_mul(scale)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("invalid duration '{value}': too large"))?;
    }
    Ok(total)
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
}

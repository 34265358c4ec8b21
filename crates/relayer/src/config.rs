//! Configuration for the relayer.

use std::time::Duration;

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Relayer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// When set, `/api/*` and `/ws/admin/*` require `Authorization: Bearer <key>`.
    pub admin_api_key: Option<String>,
    /// Per-connection outbound queue capacity.
    pub outbound_buffer: usize,
    /// WebSocket keep-alive ping period. `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&get, "PORT", 8000)?;
        let admin_api_key = get("ADMIN_API_KEY").filter(|k| !k.trim().is_empty());
        let outbound_buffer: usize = parse_or(&get, "OUTBOUND_BUFFER", 256)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::Zero("OUTBOUND_BUFFER"));
        }
        let ping_secs: u64 = parse_or(&get, "PING_INTERVAL_SECS", 30)?;
        let ping_interval = (ping_secs > 0).then(|| Duration::from_secs(ping_secs));

        Ok(Self {
            host,
            port,
            admin_api_key,
            outbound_buffer,
            ping_interval,
        })
    }

    pub fn for_test(admin_api_key: Option<&str>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            admin_api_key: admin_api_key.map(String::from),
            outbound_buffer: 64,
            ping_interval: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.admin_api_key.is_none());
        assert_eq!(config.outbound_buffer, 256);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9001"),
            ("ADMIN_API_KEY", "secret"),
            ("OUTBOUND_BUFFER", "8"),
            ("PING_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9001);
        assert_eq!(config.admin_api_key.as_deref(), Some("secret"));
        assert_eq!(config.outbound_buffer, 8);
        assert!(config.ping_interval.is_none());
    }

    #[test]
    fn blank_admin_key_is_unset() {
        let config = Config::from_lookup(lookup(&[("ADMIN_API_KEY", "  ")])).unwrap();
        assert!(config.admin_api_key.is_none());
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::NotANumber { name: "PORT", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("OUTBOUND_BUFFER", "0")])),
            Err(ConfigError::Zero("OUTBOUND_BUFFER"))
        ));
    }
}

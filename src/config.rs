//! Server configuration, read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    pub chrome_path: PathBuf,
    pub render_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8002,
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
            chrome_path: PathBuf::from("chromium"),
            render_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        Ok(ServerConfig {
            host: lookup("CONVERTER_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "CONVERTER_PORT", defaults.port)?,
            max_upload_bytes: parse_or(&lookup, "CONVERTER_MAX_UPLOAD", defaults.max_upload_bytes)?,
            chrome_path: lookup("CHROME_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chrome_path),
            render_timeout: parse_or(&lookup, "RENDER_TIMEOUT_SECS", defaults.render_timeout.as_secs())
                .map(Duration::from_secs)?,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8002);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert_eq!(config.chrome_path, PathBuf::from("chromium"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CONVERTER_PORT", "9000"),
            ("RENDER_TIMEOUT_SECS", "5"),
            ("CHROME_PATH", "/usr/bin/google-chrome"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), ("0.0.0.0".to_string(), 9000));
        assert_eq!(config.render_timeout, Duration::from_secs(5));
        assert_eq!(config.chrome_path, PathBuf::from("/usr/bin/google-chrome"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("CONVERTER_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for CONVERTER_PORT: \"eighty\"");
    }
}

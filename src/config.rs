//! Process configuration.
//!
//! Everything comes from environment variables. Parsing goes through a
//! lookup closure so tests can supply values without touching the process
//! environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_TIMEOUT;
use crate::error::ConfigError;

pub const ENV_API_URL: &str = "ORDER_PANEL_API_URL";
pub const ENV_POLL_SECS: &str = "ORDER_PANEL_POLL_SECS";
pub const ENV_TIMEOUT_SECS: &str = "ORDER_PANEL_TIMEOUT_SECS";
pub const ENV_LOG_DIR: &str = "ORDER_PANEL_LOG_DIR";
pub const ENV_SOUND: &str = "ORDER_PANEL_SOUND";

/// Backend root used when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Polling cadence of the refresh loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub sound_enabled: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_TIMEOUT,
            log_dir: None,
            sound_enabled: true,
        }
    }
}

impl PanelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_url = match get(ENV_API_URL) {
            Some(raw) => normalize_api_url(&raw)?,
            None => defaults.api_url,
        };
        let poll_interval = match get(ENV_POLL_SECS) {
            Some(raw) => parse_seconds(ENV_POLL_SECS, &raw)?,
            None => defaults.poll_interval,
        };
        let request_timeout = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => parse_seconds(ENV_TIMEOUT_SECS, &raw)?,
            None => defaults.request_timeout,
        };
        let sound_enabled = match get(ENV_SOUND) {
            Some(raw) => parse_flag(ENV_SOUND, &raw)?,
            None => defaults.sound_enabled,
        };

        Ok(Self {
            api_url,
            poll_interval,
            request_timeout,
            log_dir: get(ENV_LOG_DIR).map(|v| PathBuf::from(v.trim())),
            sound_enabled,
        })
    }
}

/// Normalise the backend root URL:
/// - trim whitespace
/// - ensure a scheme is present (http for localhost, https otherwise)
/// - strip trailing slashes
///
/// Path segments such as `/api` are kept; they are part of the root.
pub fn normalize_api_url(url: &str) -> Result<String, ConfigError> {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    let parsed = reqwest::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
        value: url.clone(),
        reason: e.to_string(),
    })?;
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            value: url,
            reason: "missing host".into(),
        });
    }

    Ok(url)
}

fn parse_seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidDuration {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PanelConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PanelConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, PanelConfig::default());
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(8));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(ENV_API_URL, "   "), (ENV_POLL_SECS, "")]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn values_are_parsed() {
        let config = config_from(&[
            (ENV_API_URL, "pedidos.example.com/api/"),
            (ENV_POLL_SECS, "15"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_LOG_DIR, "/var/log/order-panel"),
            (ENV_SOUND, "off"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://pedidos.example.com/api");
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/order-panel")));
        assert!(!config.sound_enabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[(ENV_POLL_SECS, "0")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_TIMEOUT_SECS, "soon")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_SOUND, "loud")]),
            Err(ConfigError::InvalidFlag { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_API_URL, "http://")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn normalize_api_url_handles_scheme_and_slashes() {
        assert_eq!(
            normalize_api_url("localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_api_url("127.0.0.1:9000/api//").unwrap(),
            "http://127.0.0.1:9000/api"
        );
        assert_eq!(
            normalize_api_url(" https://queiroz.example/api ").unwrap(),
            "https://queiroz.example/api"
        );
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        std::env::set_var(ENV_API_URL, "localhost:8123");
        std::env::set_var(ENV_POLL_SECS, "3");
        let config = PanelConfig::from_env();
        std::env::remove_var(ENV_API_URL);
        std::env::remove_var(ENV_POLL_SECS);

        let config = config.unwrap();
        assert_eq!(config.api_url, "http://localhost:8123");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }
}

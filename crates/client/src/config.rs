//! Environment configuration for the realtime client.
//!
//! Values come from the process environment (the binary loads `.env` first).
//! Malformed numbers fall back to their defaults with a warning; a malformed
//! service URL is an error.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use storefront_domain::UserId;

use crate::infrastructure::messaging::manager::DEFAULT_HEARTBEAT_INTERVAL;
use crate::infrastructure::messaging::ConnectionConfig;
use crate::infrastructure::websocket::ReconnectPolicy;

pub const DEFAULT_WS_URL: &str = "ws://localhost:5000/ws";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL in {key}: {url} ({reason})")]
    InvalidUrl {
        key: &'static str,
        url: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub ws_url: String,
    pub api_base_url: String,
    /// Bearer token for the REST API
    pub api_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_interval: Duration,
    /// Signs this user in at startup when set
    pub user_id: Option<UserId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            user_id: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ws_url = lookup("NOTIFY_WS_URL")
            .or_else(|| lookup("STOREFRONT_WS_URL"))
            .unwrap_or(defaults.ws_url);
        check_url("NOTIFY_WS_URL", &ws_url, &["ws", "wss"])?;

        let api_base_url = lookup("API_BASE_URL").unwrap_or(defaults.api_base_url);
        check_url("API_BASE_URL", &api_base_url, &["http", "https"])?;

        let policy = defaults.reconnect;
        let max_attempts = parse_or(
            &lookup,
            "NOTIFY_RECONNECT_MAX_ATTEMPTS",
            policy.max_attempts.unwrap_or(0),
        );
        let reconnect = ReconnectPolicy {
            initial_delay_ms: parse_or(
                &lookup,
                "NOTIFY_RECONNECT_INITIAL_MS",
                policy.initial_delay_ms,
            ),
            max_delay_ms: parse_or(&lookup, "NOTIFY_RECONNECT_MAX_MS", policy.max_delay_ms),
            // 0 retries forever
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            ..policy
        };

        let heartbeat_secs = parse_or(
            &lookup,
            "NOTIFY_HEARTBEAT_SECS",
            defaults.heartbeat_interval.as_secs(),
        );

        let user_id = non_empty(&lookup, "STOREFRONT_USER_ID").map(UserId::from);
        let api_token = non_empty(&lookup, "STOREFRONT_API_TOKEN");

        Ok(Self {
            ws_url,
            api_base_url,
            api_token,
            reconnect,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            user_id,
        })
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            reconnect: self.reconnect,
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn check_url(key: &'static str, raw: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        key,
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!("expected scheme {}", schemes.join(" or "))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect.max_attempts, Some(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
        assert_eq!(config.connection().url, DEFAULT_WS_URL);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("STOREFRONT_WS_URL", "wss://shop.example.com/ws"),
            ("API_BASE_URL", "https://shop.example.com/api"),
            ("NOTIFY_RECONNECT_INITIAL_MS", "250"),
            ("NOTIFY_RECONNECT_MAX_MS", "5000"),
            ("NOTIFY_RECONNECT_MAX_ATTEMPTS", "0"),
            ("NOTIFY_HEARTBEAT_SECS", "10"),
            ("STOREFRONT_USER_ID", " u-42 "),
        ])
        .unwrap();

        assert_eq!(config.ws_url, "wss://shop.example.com/ws");
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        assert_eq!(config.reconnect.max_delay_ms, 5000);
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.user_id, Some(UserId::new("u-42")));
    }

    #[test]
    fn test_primary_ws_variable_wins() {
        let config = config(&[
            ("NOTIFY_WS_URL", "ws://primary/ws"),
            ("STOREFRONT_WS_URL", "ws://fallback/ws"),
        ])
        .unwrap();
        assert_eq!(config.ws_url, "ws://primary/ws");
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = config(&[
            ("NOTIFY_RECONNECT_INITIAL_MS", "soon"),
            ("NOTIFY_HEARTBEAT_SECS", "-3"),
        ])
        .unwrap();
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        assert!(matches!(
            config(&[("NOTIFY_WS_URL", "http://localhost:5000")]),
            Err(ConfigError::InvalidUrl { key: "NOTIFY_WS_URL", .. })
        ));
        assert!(config(&[("API_BASE_URL", "::nope::")]).is_err());
    }
}

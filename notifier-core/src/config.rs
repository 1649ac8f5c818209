//! Process configuration read from the environment
//!
//! Each binary reads its configuration exactly once at startup:
//!
//! | Variable | Used by | Default |
//! |---|---|---|
//! | `NOTIFIER_LISTEN_ADDR` | server | required |
//! | `NOTIFIER_DRAIN_TIMEOUT_MS` | server | 5000 |
//! | `NOTIFIER_TARGET_URL` | gateway | required |
//! | `GATEWAY_LISTEN_ADDR` | gateway | `127.0.0.1:3000` |
//! | `NOTIFIER_CONNECT_TIMEOUT_MS` | gateway | 3000 |
//! | `NOTIFIER_CALL_TIMEOUT_MS` | gateway | 10000 |
//!
//! Missing required values and malformed values are `Error::Config`; the
//! binaries turn that into a non-zero exit.
//!
//! `from_lookup` takes the key lookup as a closure so the parsing rules can
//! be exercised without touching the process environment.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "NOTIFIER_LISTEN_ADDR";
pub const DRAIN_TIMEOUT_ENV: &str = "NOTIFIER_DRAIN_TIMEOUT_MS";
pub const TARGET_URL_ENV: &str = "NOTIFIER_TARGET_URL";
pub const GATEWAY_LISTEN_ADDR_ENV: &str = "GATEWAY_LISTEN_ADDR";
pub const CONNECT_TIMEOUT_ENV: &str = "NOTIFIER_CONNECT_TIMEOUT_MS";
pub const CALL_TIMEOUT_ENV: &str = "NOTIFIER_CALL_TIMEOUT_MS";

/// Default time in-flight calls get to finish after `stop()`
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for a channel to become ready
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default deadline for a single call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default gateway HTTP address
pub const DEFAULT_GATEWAY_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Configuration of the `notification-server` process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub drain_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    ///
    /// ```rust
    /// use notifier_core::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_lookup(|key| match key {
    ///     "NOTIFIER_LISTEN_ADDR" => Some("127.0.0.1:50051".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.listen_addr.port(), 50051);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = parse_addr(LISTEN_ADDR_ENV, &required(&lookup, LISTEN_ADDR_ENV)?)?;
        let drain_timeout = millis_or(&lookup, DRAIN_TIMEOUT_ENV, DEFAULT_DRAIN_TIMEOUT)?;

        Ok(Self {
            listen_addr,
            drain_timeout,
        })
    }
}

/// Configuration of the `notification-gateway` process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// WebSocket URL of the notification server
    pub target_url: String,
    /// HTTP listen address of the gateway
    pub listen_addr: SocketAddr,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target_url = required(&lookup, TARGET_URL_ENV)?;
        if !target_url.starts_with("ws://") {
            return Err(Error::Config(format!(
                "{} must be a ws:// URL, got {:?}",
                TARGET_URL_ENV, target_url
            )));
        }

        let listen_addr = match non_empty(&lookup, GATEWAY_LISTEN_ADDR_ENV) {
            Some(value) => parse_addr(GATEWAY_LISTEN_ADDR_ENV, &value)?,
            None => parse_addr(GATEWAY_LISTEN_ADDR_ENV, DEFAULT_GATEWAY_LISTEN_ADDR)?,
        };

        Ok(Self {
            target_url,
            listen_addr,
            connect_timeout: millis_or(&lookup, CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT)?,
            call_timeout: millis_or(&lookup, CALL_TIMEOUT_ENV, DEFAULT_CALL_TIMEOUT)?,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or_else(|| Error::Config(format!("{} is not set", key)))
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("{}={:?} is not a socket address: {}", key, value, e)))
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = non_empty(lookup, key) else {
        return Ok(default);
    };

    match value.parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{} must be greater than zero", key))),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(e) => Err(Error::Config(format!(
            "{}={:?} is not a number of milliseconds: {}",
            key, value, e
        ))),
    }
}

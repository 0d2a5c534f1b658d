//! Server configuration module
//! Handles tuning parameters for the hub, its connections and presence tracking

use crate::constants::{
    DEFAULT_HOST, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PING_INTERVAL_SECS, DEFAULT_PORT,
    DEFAULT_PRESENCE_SWEEP_SECS, DEFAULT_PRESENCE_TTL_SECS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_READ_TIMEOUT_SECS, DEFAULT_WRITE_TIMEOUT_SECS, MAX_DURATION_SECS,
};
use crate::error::{HubError, Result};
use std::env;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound queue
    pub queue_capacity: usize,
    /// Idle-read window; a connection that sends nothing (not even a pong) is torn down
    pub read_timeout: Duration,
    /// Keepalive ping period, must be shorter than `read_timeout`
    pub ping_interval: Duration,
    /// Deadline for a single outbound write
    pub write_timeout: Duration,
    /// Largest inbound frame accepted, in bytes
    pub max_message_size: usize,
    /// Lifetime of a presence key after the last heartbeat
    pub presence_ttl: Duration,
    /// How often expired presence keys are swept from the in-memory store
    pub presence_sweep_interval: Duration,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub enable_tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            presence_ttl: Duration::from_secs(DEFAULT_PRESENCE_TTL_SECS),
            presence_sweep_interval: Duration::from_secs(DEFAULT_PRESENCE_SWEEP_SECS),
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var("CHAT_HUB_HOST").unwrap_or(defaults.host);
        let port = env_parse("CHAT_HUB_PORT").unwrap_or(defaults.port);
        let queue_capacity =
            env_parse("CHAT_HUB_QUEUE_CAPACITY").unwrap_or(defaults.queue_capacity);
        let read_timeout = env_parse("CHAT_HUB_READ_TIMEOUT")
            .map(Duration::from_secs)
            .unwrap_or(defaults.read_timeout);
        let ping_interval = env_parse("CHAT_HUB_PING_INTERVAL")
            .map(Duration::from_secs)
            .unwrap_or(defaults.ping_interval);
        let write_timeout = env_parse("CHAT_HUB_WRITE_TIMEOUT")
            .map(Duration::from_secs)
            .unwrap_or(defaults.write_timeout);
        let max_message_size =
            env_parse("CHAT_HUB_MAX_MESSAGE_SIZE").unwrap_or(defaults.max_message_size);
        let presence_ttl = env_parse("CHAT_HUB_PRESENCE_TTL")
            .map(Duration::from_secs)
            .unwrap_or(defaults.presence_ttl);
        let presence_sweep_interval = env_parse("CHAT_HUB_PRESENCE_SWEEP")
            .map(Duration::from_secs)
            .unwrap_or(defaults.presence_sweep_interval);

        let enable_tls = env_flag("CHAT_HUB_ENABLE_TLS");
        let tls_cert_path = env::var("CHAT_HUB_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("CHAT_HUB_TLS_KEY_PATH").ok();

        let config = Self {
            host,
            port,
            queue_capacity,
            read_timeout,
            ping_interval,
            write_timeout,
            max_message_size,
            presence_ttl,
            presence_sweep_interval,
            tls_cert_path,
            tls_key_path,
            enable_tls,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are usable together
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(HubError::ConfigError(
                "CHAT_HUB_QUEUE_CAPACITY must be greater than zero".to_string(),
            ));
        }

        if self.ping_interval.is_zero() || self.ping_interval >= self.read_timeout {
            return Err(HubError::ConfigError(format!(
                "ping interval ({:?}) must be non-zero and shorter than the read timeout ({:?})",
                self.ping_interval, self.read_timeout
            )));
        }

        if self.write_timeout.is_zero() {
            return Err(HubError::ConfigError(
                "CHAT_HUB_WRITE_TIMEOUT must be greater than zero".to_string(),
            ));
        }

        if self.presence_ttl.is_zero() {
            return Err(HubError::ConfigError(
                "CHAT_HUB_PRESENCE_TTL must be greater than zero".to_string(),
            ));
        }

        if self.presence_sweep_interval.is_zero() {
            return Err(HubError::ConfigError(
                "CHAT_HUB_PRESENCE_SWEEP must be greater than zero".to_string(),
            ));
        }

        let max = Duration::from_secs(MAX_DURATION_SECS);
        let durations = [
            ("CHAT_HUB_READ_TIMEOUT", self.read_timeout),
            ("CHAT_HUB_PING_INTERVAL", self.ping_interval),
            ("CHAT_HUB_WRITE_TIMEOUT", self.write_timeout),
            ("CHAT_HUB_PRESENCE_TTL", self.presence_ttl),
            ("CHAT_HUB_PRESENCE_SWEEP", self.presence_sweep_interval),
        ];
        for (name, value) in durations {
            if value > max {
                return Err(HubError::ConfigError(format!(
                    "{} must be at most {} seconds, got {:?}",
                    name, MAX_DURATION_SECS, value
                )));
            }
        }

        if self.enable_tls {
            match (&self.tls_cert_path, &self.tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    if !std::path::Path::new(cert_path).exists() {
                        return Err(HubError::ConfigError(format!(
                            "TLS certificate file does not exist: {}",
                            cert_path
                        )));
                    }
                    if !std::path::Path::new(key_path).exists() {
                        return Err(HubError::ConfigError(format!(
                            "TLS private key file does not exist: {}",
                            key_path
                        )));
                    }
                }
                _ => {
                    return Err(HubError::ConfigError(
                        "TLS is enabled but CHAT_HUB_TLS_CERT_PATH or CHAT_HUB_TLS_KEY_PATH is not set"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

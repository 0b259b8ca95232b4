//! Configuration for the bridge process
//!
//! Everything is read from environment variables, mirroring how the bridge
//! is deployed:
//!
//! | variable | default |
//! |---|---|
//! | `TOKEN` | required |
//! | `IP` | `0.0.0.0` |
//! | `PORT` | `6500` |
//! | `CALLBACK_URL` | `http://<IP>:<PORT>/notification` |
//! | `CONNECTOR_API_URL` | `https://api.connector.mbed.com` |
//! | `STATUS_TIMEOUT_SECS` | `5` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use callback_server::NOTIFICATION_PATH;
use connector_client::DEFAULT_API_URL;

use crate::error::{BridgeError, Result};

/// Default listen port
pub const DEFAULT_PORT: u16 = 6500;

/// Default deadline for a status read to be answered through the callback
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bearer token for the device cloud API
    pub token: String,

    /// Address the HTTP server binds to
    /// Default: 0.0.0.0:6500
    pub listen_addr: SocketAddr,

    /// Public URL the device cloud delivers callbacks to
    /// Default: derived from `listen_addr`
    pub callback_url: Option<String>,

    /// Base URL of the device cloud REST API
    pub api_url: String,

    /// How long a status request waits for its async response
    /// Default: 5 seconds
    pub status_timeout: Duration,

    /// Per-subscriber buffer of the live event relay
    /// Default: 256
    pub relay_capacity: usize,

    /// Register `callback_url` with the device cloud at startup
    /// Default: true
    pub register_callback: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            callback_url: None,
            api_url: DEFAULT_API_URL.to_string(),
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            relay_capacity: 256,
            register_callback: true,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with the given token and default values
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Load the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                BridgeError::Configuration(
                    "Need to pass in TOKEN as environment variable".to_string(),
                )
            })?;

        let mut config = Self::new(token);

        let ip = match lookup("IP") {
            Some(ip) => ip
                .parse::<IpAddr>()
                .map_err(|e| BridgeError::Configuration(format!("Invalid IP '{ip}': {e}")))?,
            None => config.listen_addr.ip(),
        };
        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| BridgeError::Configuration(format!("Invalid PORT '{port}': {e}")))?,
            None => config.listen_addr.port(),
        };
        config.listen_addr = SocketAddr::new(ip, port);

        config.callback_url = lookup("CALLBACK_URL");

        if let Some(api_url) = lookup("CONNECTOR_API_URL") {
            config.api_url = api_url;
        }

        if let Some(secs) = lookup("STATUS_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                BridgeError::Configuration(format!("Invalid STATUS_TIMEOUT_SECS '{secs}': {e}"))
            })?;
            config.status_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Device cloud token must not be empty".to_string(),
            ));
        }

        if self.status_timeout == Duration::ZERO {
            return Err(BridgeError::Configuration(
                "Status timeout must be greater than 0".to_string(),
            ));
        }

        if self.relay_capacity == 0 {
            return Err(BridgeError::Configuration(
                "Relay capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.callback_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BridgeError::Configuration(format!(
                    "Callback URL must be http(s): {url}"
                )));
            }
        }

        Ok(())
    }

    /// URL registered with the device cloud as notification callback
    pub fn callback_url(&self) -> String {
        self.callback_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/{}", self.listen_addr, NOTIFICATION_PATH))
    }

    /// Builder pattern methods for fluent configuration
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_relay_capacity(mut self, capacity: usize) -> Self {
        self.relay_capacity = capacity;
        self
    }

    pub fn with_register_callback(mut self, register: bool) -> Self {
        self.register_callback = register;
        self
    }
}

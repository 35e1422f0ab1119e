//! Configuration for DrishtiIO
//!
//! Loads configuration from a TOML file. Every field has a default so a
//! partial file (or none at all) yields a usable setup for a sensor on the
//! factory address.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub acquisition: AcquisitionConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// Sensor endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Sensor host name or IP address
    pub host: String,
    /// CoLa2 control channel port
    pub control_port: u16,
    /// Frame stream port
    pub stream_port: u16,
    /// TCP connect / read timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Session timeout requested in the open-session handshake (seconds)
    pub session_timeout_s: u8,
}

impl DeviceConfig {
    /// `host:control_port`
    pub fn control_address(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }

    /// `host:stream_port`
    pub fn stream_address(&self) -> String {
        format!("{}:{}", self.host, self.stream_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            control_port: 2122,
            stream_port: 2114,
            connect_timeout_ms: 5000,
            session_timeout_s: 50,
        }
    }
}

/// Frame acquisition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sleep between reconnect attempts while the stream is down
    pub reconnect_backoff_ms: u64,
    /// How long a consumer waits for the next frame
    pub frame_timeout_ms: u64,
    /// Upper bound on the length field of an incoming frame
    pub max_frame_size: usize,
}

impl AcquisitionConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_ms: 1000,
            frame_timeout_ms: 1000,
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}

/// AutoIP discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Broadcast address the discover datagram is sent to
    pub broadcast_address: String,
    /// AutoIP UDP port
    pub port: u16,
    /// Scan window in milliseconds
    pub timeout_ms: u64,
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_address: "255.255.255.255".to_string(),
            port: 30718,
            timeout_ms: 5000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use drishti_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("drishti.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.device.control_address(), "192.168.1.10:2122");
        assert_eq!(config.device.stream_address(), "192.168.1.10:2114");
        assert_eq!(config.acquisition.reconnect_backoff(), Duration::from_secs(1));
        assert_eq!(config.discovery.port, 30718);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[acquisition]"));
        assert!(toml_string.contains("[discovery]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("control_port = 2122"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[device]
host = "10.0.0.7"
session_timeout_s = 20

[acquisition]
reconnect_backoff_ms = 250
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.host, "10.0.0.7");
        assert_eq!(config.device.session_timeout_s, 20);
        assert_eq!(config.device.control_port, 2122);
        assert_eq!(config.acquisition.reconnect_backoff_ms, 250);
        assert_eq!(config.acquisition.frame_timeout_ms, 1000);
        assert_eq!(config.discovery.broadcast_address, "255.255.255.255");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drishti.toml");

        let mut config = AppConfig::default();
        config.device.host = "sensor.local".to_string();
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.device.host, "sensor.local");
    }
}

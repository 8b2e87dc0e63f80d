#![allow(dead_code)]

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub producer: ProducerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Host or address to bind the listening socket to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-connection idle timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProducerConfig {
    /// Refresh ticker period, in microseconds (~30 Hz by default).
    #[serde(default = "default_refresh_interval_us")]
    pub refresh_interval_us: u64,

    /// Enable the built-in synthetic frame producer for demo/bootstrap
    /// purposes when no real capture pipeline is wired in.
    #[serde(default)]
    pub demo_enabled: bool,

    /// Target frame rate for the demo producer.
    #[serde(default = "default_demo_fps")]
    pub demo_fps: u32,
}

impl AppConfig {
    /// Load configuration from default sources (file + environment variables).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("mjpg-httpd.toml")
    }

    /// Load configuration from a specific file path, layered over the
    /// built-in defaults and overridable with `MJPGHTTPD_`-prefixed
    /// environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("http.host", default_host())?
            .set_default("http.port", default_port() as i64)?
            .set_default("http.timeout_secs", default_timeout_secs())?
            .set_default("producer.refresh_interval_us", default_refresh_interval_us())?
            .set_default("producer.demo_enabled", false)?
            .set_default("producer.demo_fps", default_demo_fps())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("MJPGHTTPD").separator("_"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values beyond what deserialization can check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "http.host must not be empty".to_string(),
            ));
        }
        if self.http.port == 0 {
            return Err(ConfigError::Message(
                "http.port must be nonzero".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "http.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.producer.refresh_interval_us == 0 {
            return Err(ConfigError::Message(
                "producer.refresh_interval_us must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.producer.refresh_interval_us)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                host: default_host(),
                port: default_port(),
                timeout_secs: default_timeout_secs(),
            },
            producer: ProducerConfig {
                refresh_interval_us: default_refresh_interval_us(),
                demo_enabled: false,
                demo_fps: default_demo_fps(),
            },
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_refresh_interval_us() -> u64 {
    30_000
}
fn default_demo_fps() -> u32 {
    10
}

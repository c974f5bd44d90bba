//! Configuration loading.
//!
//! Values are merged in this order (later sources override earlier):
//! 1. [`SatembedConfig::default()`]
//! 2. a TOML file (explicit path, or `satembed.toml` in the current directory)
//! 3. environment variables prefixed `SATEMBED_`, with `__` separating
//!    nested keys (e.g. `SATEMBED_FETCH__MAX_PIXELS=250000`)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{CloudError, Result};

pub const DEFAULT_CONFIG_FILENAME: &str = "satembed.toml";
pub const CONFIG_ENV_PREFIX: &str = "SATEMBED_";
pub const DEFAULT_ENDPOINT: &str = "https://earthengine.googleapis.com/v1";
pub const EMBEDDING_COLLECTION: &str = "GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatembedConfig {
    pub earth_engine: EarthEngineConfig,
    pub fetch: FetchConfig,
}

/// Service endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    /// REST root, e.g. `https://earthengine.googleapis.com/v1`
    pub endpoint: String,
    /// Cloud project id used for billing and quota
    pub project: Option<String>,
    /// OAuth2 access token; `EARTHENGINE_TOKEN` is used when unset
    pub token: Option<String>,
    /// Image collection id
    pub collection: String,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: None,
            token: None,
            collection: EMBEDDING_COLLECTION.to_string(),
        }
    }
}

/// Materialization limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Target ground sampling distance in metres
    pub scale: f64,
    /// Cap on rows x cols of a materialized cube
    pub max_pixels: usize,
    /// Cap on rows x cols of a single getPixels request
    pub max_request_pixels: usize,
    pub max_concurrent_fetches: usize,
    /// Maximum number of collection images followed across pages
    pub max_images: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            scale: 10.0,
            max_pixels: 1_000_000,
            max_request_pixels: 65_536,
            max_concurrent_fetches: 4,
            max_images: 100,
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SatembedConfig {
    /// Check value ranges after merging.
    pub fn validate(&self) -> Result<()> {
        let ee = &self.earth_engine;
        if ee.endpoint.trim().is_empty() {
            return Err(CloudError::Config("earth_engine.endpoint is empty".into()));
        }
        if ee.collection.trim().is_empty() {
            return Err(CloudError::Config("earth_engine.collection is empty".into()));
        }

        let f = &self.fetch;
        if !(f.scale.is_finite() && f.scale > 0.0) {
            return Err(CloudError::Config(format!("fetch.scale must be positive, got {}", f.scale)));
        }
        for (name, value) in [
            ("fetch.max_pixels", f.max_pixels),
            ("fetch.max_request_pixels", f.max_request_pixels),
            ("fetch.max_concurrent_fetches", f.max_concurrent_fetches),
            ("fetch.max_images", f.max_images),
        ] {
            if value == 0 {
                return Err(CloudError::Config(format!("{name} must be positive")));
            }
        }
        if f.request_timeout_secs == 0 {
            return Err(CloudError::Config("fetch.request_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Layered configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources
    pub fn load(&self) -> Result<SatembedConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(SatembedConfig::default()));

        let path = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
        if path.exists() {
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(&path));
        } else if self.config_path.is_some() {
            return Err(CloudError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        let config: SatembedConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configured file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

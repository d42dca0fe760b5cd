//! Configuration loader for the `codemetal-linkaudit` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Request handlers and the CLI read tier and
//! frequency defaults from here instead of calling `env::var` themselves.
//!
use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, Result};

use crate::error::PipelineError;
use crate::frequency::Frequency;
use crate::gap::CounterRange;
use crate::models::GatewayTier;
use crate::pipeline::RunOptions;

/// Parse an optional environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable; blank counts as unset.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name).ok().filter(|v| !v.trim().is_empty())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Readings source base URL; `GET /summary` is unavailable without it.
    pub api_url: Option<String>,

    /// Maximum number of source pages to fetch (safety limit).
    pub api_max_pages: u32,

    /// CSV replacing the built-in mesh reference table.
    pub mesh_reference_path: Option<String>,

    /// Values the sensor frame counter cycles through.
    pub counter_range: CounterRange,

    /// Frequency used when a request does not name one.
    pub default_frequency: Frequency,

    /// Tier used when a request does not name one.
    pub default_tier: GatewayTier,

    /// HTTP listen address.
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Self {
            api_url: None,
            api_max_pages: 100,
            mesh_reference_path: None,
            counter_range: CounterRange::default(),
            default_frequency: Frequency::default(),
            default_tier: GatewayTier::Direct,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `SENSOR_API_URL` – readings source base URL
/// - `API_MAX_PAGES` – max source pages to fetch (default: 100)
/// - `MESH_REFERENCE_PATH` – mesh reference CSV (default: built-in table)
/// - `FRAME_COUNTER_MIN` / `FRAME_COUNTER_MAX` – counter range (default: 0..=4)
/// - `DEFAULT_FREQUENCY` – resampling frequency (default: `1D`)
/// - `DEFAULT_GATEWAY_TIER` – `bg` or `mg` (default: `bg`)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
///
/// Returns an error if any variable is set but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let api_url = optional_env!("SENSOR_API_URL");
    let api_max_pages = parse_env!("API_MAX_PAGES", u32, defaults.api_max_pages);
    let mesh_reference_path = optional_env!("MESH_REFERENCE_PATH");
    let counter_min = parse_env!("FRAME_COUNTER_MIN", i64, defaults.counter_range.min);
    let counter_max = parse_env!("FRAME_COUNTER_MAX", i64, defaults.counter_range.max);
    let default_frequency = parse_env!("DEFAULT_FREQUENCY", Frequency, defaults.default_frequency);
    let default_tier = parse_env!("DEFAULT_GATEWAY_TIER", GatewayTier, defaults.default_tier);
    let bind_addr = parse_env!("BIND_ADDR", SocketAddr, defaults.bind_addr);

    let counter_range = CounterRange::new(counter_min, counter_max)?;

    Ok(Config {
        api_url,
        api_max_pages,
        mesh_reference_path,
        counter_range,
        default_frequency,
        default_tier,
        bind_addr,
    })
}

/// Mask the password part of `user:password@host` URLs.
fn mask_credentials(url: &str) -> String {
    // ---
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}

impl Config {
    /// Resolve per-run options, falling back to the configured defaults.
    pub fn run_options(
        &self,
        tier: Option<&str>,
        frequency: Option<&str>,
    ) -> std::result::Result<RunOptions, PipelineError> {
        // ---
        let tier = match tier {
            Some(token) => token.parse()?,
            None => self.default_tier,
        };
        let frequency = match frequency {
            Some(token) => token.parse()?,
            None => self.default_frequency,
        };
        Ok(RunOptions {
            tier,
            frequency,
            counter_range: self.counter_range,
        })
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks credentials embedded in the source URL.
    pub fn log_config(&self) {
        // ---
        let api_url = self
            .api_url
            .as_deref()
            .map(mask_credentials)
            .unwrap_or_else(|| "(unset)".to_string());
        let reference = self
            .mesh_reference_path
            .as_deref()
            .unwrap_or("(built-in)");

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_API_URL       : {}", api_url);
        tracing::info!("  API_MAX_PAGES        : {}", self.api_max_pages);
        tracing::info!("  MESH_REFERENCE_PATH  : {}", reference);
        tracing::info!(
            "  FRAME_COUNTER        : {}..={}",
            self.counter_range.min,
            self.counter_range.max
        );
        tracing::info!("  DEFAULT_FREQUENCY    : {}", self.default_frequency);
        tracing::info!("  DEFAULT_GATEWAY_TIER : {}", self.default_tier);
        tracing::info!("  BIND_ADDR            : {}", self.bind_addr);
    }
}

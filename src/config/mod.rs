//! Configuration Module
//!
//! Handles application configuration loading, validation, and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// WebSocket/HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Contact router configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Job store configuration
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Messaging transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// WebSocket/HTTP gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8787)
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default: "0.0.0.0")
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    8787
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            allowed_origins: Vec::new(),
        }
    }
}

/// What the router does when a job has no bound contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningMode {
    /// Fail with `NotProvisionable`.
    Reject,
    /// Assign a phone from `fallback_pool`.
    AssignFromPool,
    /// Read the phone from the job store record.
    JobStoreLookup,
}

/// How a phone is picked from the fallback pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Random pick (demo/test traffic).
    Random,
    /// Deterministic round-robin.
    Sequential,
}

/// Contact router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_provisioning")]
    pub provisioning: ProvisioningMode,

    /// Phones handed out by the `assign-from-pool` strategy
    #[serde(default)]
    pub fallback_pool: Vec<String>,

    #[serde(default = "default_selection")]
    pub selection: SelectionMode,
}

fn default_provisioning() -> ProvisioningMode {
    ProvisioningMode::AssignFromPool
}

fn default_selection() -> SelectionMode {
    SelectionMode::Random
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            provisioning: default_provisioning(),
            fallback_pool: Vec::new(),
            selection: default_selection(),
        }
    }
}

/// Job store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobsConfig {
    /// JSON file with jobs to load at startup
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

/// Which messaging transport to attach at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Log deliveries instead of sending (development/demo).
    Log,
    /// No transport; outbound messages are recorded as unsent.
    None,
}

/// Messaging transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_mode")]
    pub mode: TransportMode,
}

fn default_transport_mode() -> TransportMode {
    TransportMode::Log
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: default_transport_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log to file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. System config: ~/.config/courier-relay/config.toml
    /// 3. Local config: ./courier-relay.toml
    /// 4. Environment variables
    pub fn load() -> Result<Self> {
        tracing::debug!("Loading configuration...");

        // Start with defaults
        let mut config = Self::default();

        // 1. Try to load system config
        if let Some(system_config_path) = Self::system_config_path()
            && system_config_path.exists()
        {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::merge_from_file(config, &system_config_path)?;
        }

        // 2. Try to load local config
        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::merge_from_file(config, &local_config_path)?;
        }

        // 3. Apply environment variable overrides
        config = Self::apply_env_overrides(config);

        tracing::debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply environment
    /// variable overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from custom path: {:?}", path);

        let mut config = Self::default();
        if path.exists() {
            config = Self::merge_from_file(config, path)?;
        } else {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Get the system config path: ~/.config/courier-relay/config.toml
    pub fn system_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("courier-relay").join("config.toml"))
    }

    /// Get the local config path: ./courier-relay.toml
    fn local_config_path() -> PathBuf {
        PathBuf::from("./courier-relay.toml")
    }

    /// Load and merge configuration from a TOML file
    fn merge_from_file(_base: Self, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let file_config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Overlay replaces base wholesale; every section has serde defaults.
        Ok(file_config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Self) -> Self {
        if let Ok(port) = std::env::var("COURIER_RELAY_PORT")
            && let Ok(port) = port.parse()
        {
            config.gateway.port = port;
        }

        if let Ok(bind) = std::env::var("COURIER_RELAY_BIND") {
            config.gateway.bind = bind;
        }

        if let Ok(log_level) = std::env::var("COURIER_RELAY_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(log_file) = std::env::var("COURIER_RELAY_LOG_FILE") {
            config.logging.file = Some(PathBuf::from(log_file));
        }

        if let Ok(seed_file) = std::env::var("COURIER_RELAY_SEED_FILE") {
            config.jobs.seed_file = Some(PathBuf::from(seed_file));
        }

        // Comma-separated phone list
        if let Ok(pool) = std::env::var("COURIER_RELAY_FALLBACK_POOL") {
            config.router.fallback_pool = pool
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(mode) = std::env::var("COURIER_RELAY_TRANSPORT") {
            match mode.as_str() {
                "log" => config.transport.mode = TransportMode::Log,
                "none" => config.transport.mode = TransportMode::None,
                other => tracing::warn!("Unknown COURIER_RELAY_TRANSPORT value: {}", other),
            }
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration...");

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.gateway.port == 0 {
            anyhow::bail!("Gateway port must be non-zero");
        }

        // An assign-from-pool policy with nothing to assign can never route
        // an unbound job; reject it up front.
        if self.router.provisioning == ProvisioningMode::AssignFromPool
            && self.router.fallback_pool.is_empty()
        {
            anyhow::bail!(
                "router.provisioning is \"assign-from-pool\" but router.fallback_pool is empty"
            );
        }

        if let Some(ref seed_file) = self.jobs.seed_file
            && !seed_file.exists()
        {
            tracing::warn!("Seed file does not exist yet: {:?}", seed_file);
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Configuration saved to: {:?}", path);
        Ok(())
    }
}

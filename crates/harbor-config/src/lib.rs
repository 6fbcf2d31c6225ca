//! Harbor configuration system
//!
//! Loads settings from `harbor.toml` with environment-variable overrides,
//! so temporary tweaks don't require editing the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the Harbor shell
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarborConfig {
    /// Engine launch settings
    pub launch: LaunchConfig,
    /// Engine backend settings
    pub engine: EngineConfig,
    /// Bridge tuning
    pub bridge: BridgeTuning,
}

/// Engine launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Hold the engine launch until a manual trigger fires (debug gate)
    pub wait_for_trigger: bool,
    /// URI to load once the engine is up
    pub initial_uri: Option<String>,
    /// Additional engine arguments
    pub args: Vec<String>,
}

/// Engine backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the native engine library (file or containing directory).
    /// Unset means the in-process backend.
    pub library: Option<PathBuf>,
}

/// Bridge tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeTuning {
    /// Bound on blocking cross-thread exchanges, in milliseconds
    pub exchange_timeout_ms: u64,
    /// IME coalescing window, in milliseconds
    pub ime_coalesce_ms: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            wait_for_trigger: false,
            initial_uri: None,
            args: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { library: None }
    }
}

impl Default for BridgeTuning {
    fn default() -> Self {
        Self {
            exchange_timeout_ms: 30_000,
            ime_coalesce_ms: 200,
        }
    }
}

impl HarborConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load configuration from `harbor.toml` in the current directory, or
    /// return defaults if the file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file("harbor.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file
    /// values.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("HARBOR_WAIT_FOR_TRIGGER") {
            self.launch.wait_for_trigger = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(uri) = std::env::var("HARBOR_INITIAL_URI") {
            self.launch.initial_uri = Some(uri);
        }
        if let Ok(path) = std::env::var("HARBOR_ENGINE_LIBRARY") {
            self.engine.library = Some(PathBuf::from(path));
        }
        if let Ok(val) = std::env::var("HARBOR_EXCHANGE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.bridge.exchange_timeout_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("HARBOR_IME_COALESCE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.bridge.ime_coalesce_ms = ms;
            }
        }
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

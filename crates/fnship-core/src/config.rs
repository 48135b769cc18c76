//! fnship.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "fnship.toml";

pub const DEFAULT_REGION: &str = "eu-west-3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FnshipConfig {
    pub region: String,
    pub function: FunctionConfig,
    pub gateway: GatewayConfig,
    pub provision: ProvisionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub runtime: String,
    pub handler: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Pause after creating the execution role.
    pub settle_secs: u64,
    pub retry_attempts: u32,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for FnshipConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            function: FunctionConfig::default(),
            gateway: GatewayConfig::default(),
            provision: ProvisionConfig::default(),
        }
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            runtime: "provided.al2023".to_string(),
            handler: "bootstrap".to_string(),
            memory_mb: 256,
            timeout_secs: 15,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            stage: "default".to_string(),
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            settle_secs: 3,
            retry_attempts: 5,
            retry_initial_ms: 2_000,
            retry_max_ms: 16_000,
        }
    }
}

impl ProvisionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}

impl FnshipConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit config file, or `./fnship.toml` if present, or defaults.
    pub fn load(explicit: Option<&Path>) -> CoreResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

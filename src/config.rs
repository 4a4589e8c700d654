use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::schedule::{PlannerOptions, RotationWeights};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerOptions,
    #[serde(default)]
    pub rotation: RotationWeights,
    #[serde(default)]
    pub day: DayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayConfig {
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_minutes_per_slot")]
    pub minutes_per_slot: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_locations")]
    pub locations: String,
    #[serde(default = "default_bunks")]
    pub bunks: String,
    /// Optional reservations CSV
    #[serde(default)]
    pub reservations: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub iteration_cap: Option<usize>,
    pub port: Option<u16>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        PathBuf::from("camp-cascade.toml")
    }

    /// Loads the config at `path`; a missing file yields the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(data)?;
        if parsed.day.slot_count == 0 {
            anyhow::bail!("day.slot_count must be at least 1");
        }
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.storage.data_dir = data_dir;
        }
        if let Some(cap) = overrides.iteration_cap {
            self.planner.iteration_cap = cap;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[planner]
iteration_cap = 50
allow_cascade = true

[rotation]
same_day = 10000
yesterday = 500
two_days = 200
older = 50
lookback_days = 7

[day]
slot_count = 10
start_time = "09:00"
minutes_per_slot = 45

[storage]
data_dir = "data/grids"
locations = "data/locations.csv"
bunks = "data/bunks.csv"
# reservations = "data/reservations.csv"

[server]
host = "127.0.0.1"
port = 8080
"#;
        template.to_string()
    }
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            slot_count: default_slot_count(),
            start_time: default_start_time(),
            minutes_per_slot: default_minutes_per_slot(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            locations: default_locations(),
            bunks: default_bunks(),
            reservations: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_slot_count() -> usize {
    10
}

fn default_start_time() -> String {
    "09:00".to_string()
}

fn default_minutes_per_slot() -> u32 {
    45
}

fn default_data_dir() -> String {
    "data/grids".to_string()
}

fn default_locations() -> String {
    "data/locations.csv".to_string()
}

fn default_bunks() -> String {
    "data/bunks.csv".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

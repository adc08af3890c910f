use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::classifier::DEFAULT_THRESHOLD;
use crate::history::DEFAULT_CAPACITY;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub history: HistoryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String, // e.g. "/dev/ttyUSB0" or "COM9"
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub distance_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub forward_results: bool,
    pub show_values: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 2000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "spectral_fingerprints.json".to_string(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Loads `path`, falling back to defaults, then writes the result back so
    /// new fields show up in the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // Missing fields fall back to Default via #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save(path)?;

        Ok(config)
    }

    /// Rejects settings that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.classifier.distance_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            bail!("distance_threshold must be a finite, non-negative number, got {}", threshold);
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

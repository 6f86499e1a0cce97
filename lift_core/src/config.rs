//! Configuration file support for lift5x5.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/lift5x5/config.toml`.

use crate::plates::PlateCalculatorConfig;
use crate::stopwatch::DEFAULT_ALERT_THRESHOLDS_SEC;
use crate::{Error, Result, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub stopwatch: StopwatchConfig,

    #[serde(default)]
    pub plates: PlatesConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Rest stopwatch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopwatchConfig {
    #[serde(default = "default_alert_thresholds")]
    pub alert_thresholds_sec: Vec<u64>,

    /// How often `rest --watch` re-derives alerts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Self {
            alert_thresholds_sec: default_alert_thresholds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Plate calculator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatesConfig {
    #[serde(default = "default_minimum_plate_weight")]
    pub minimum_plate_weight: f64,

    #[serde(default = "default_available_plates")]
    pub available_plates: Vec<f64>,
}

impl Default for PlatesConfig {
    fn default() -> Self {
        Self {
            minimum_plate_weight: default_minimum_plate_weight(),
            available_plates: default_available_plates(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub unit: Unit,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir().join(".local/share"));
    base.join("lift5x5")
}

fn home_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home),
        Err(_) => {
            tracing::warn!("HOME environment variable not set, using current directory");
            PathBuf::from(".")
        }
    }
}

fn default_alert_thresholds() -> Vec<u64> {
    DEFAULT_ALERT_THRESHOLDS_SEC.to_vec()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_minimum_plate_weight() -> f64 {
    0.5
}

fn default_available_plates() -> Vec<f64> {
    vec![25.0, 20.0, 15.0, 10.0, 5.0, 2.5, 1.25, 0.5]
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        let problems = config.validate();
        if !problems.is_empty() {
            return Err(Error::Config(problems.join("; ")));
        }

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        base.join("lift5x5").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check value ranges; returns one message per problem
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let thresholds = &self.stopwatch.alert_thresholds_sec;
        if thresholds.is_empty() {
            errors.push("stopwatch.alert_thresholds_sec must not be empty".to_string());
        }
        if thresholds.contains(&0) {
            errors.push("stopwatch.alert_thresholds_sec must be positive".to_string());
        }
        let unique: BTreeSet<_> = thresholds.iter().collect();
        if unique.len() != thresholds.len() {
            errors.push("stopwatch.alert_thresholds_sec contains duplicates".to_string());
        }

        if self.stopwatch.poll_interval_ms == 0 {
            errors.push("stopwatch.poll_interval_ms must be positive".to_string());
        }

        if !(self.plates.minimum_plate_weight.is_finite() && self.plates.minimum_plate_weight > 0.0) {
            errors.push(format!(
                "plates.minimum_plate_weight must be positive, got {}",
                self.plates.minimum_plate_weight
            ));
        }
        for weight in &self.plates.available_plates {
            if !(weight.is_finite() && *weight > 0.0) {
                errors.push(format!("plates.available_plates has invalid weight {}", weight));
            }
        }

        errors
    }

    /// Plate calculator settings for a given bar
    pub fn plate_calculator_config(&self, bar_weight: f64) -> PlateCalculatorConfig {
        PlateCalculatorConfig {
            bar_weight,
            available_plates: self.plates.available_plates.clone(),
            minimum_plate_weight: self.plates.minimum_plate_weight,
            unit: self.display.unit,
        }
    }
}

/// Configuration file loader - parses pitmon.toml
///
/// Separates tuning values (sample counts, delays, sensor geometry, storage
/// location, endpoint port) from code, so a deployment can be adjusted
/// without recompiling the service. The loaded snapshot is immutable; the
/// core components receive values, not the parsing mechanism.

use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub monitor: MonitorSection,
    pub database: DatabaseSection,
    pub ui: UiSection,
}

/// `[monitor]` section: sampling and measurement loop tuning
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Raw readings collected per sampling cycle (>= 1)
    pub num_samples: u32,

    /// Drop the single min and max reading before averaging
    pub drop_extremes: bool,

    /// Delay between consecutive raw readings, in seconds
    pub sample_delay: f64,

    /// Pause between measurement cycles, in seconds
    pub measurement_frequency: f64,

    /// Distance from the sensor to the pit bottom, in centimeters
    pub distance_to_bottom: f64,

    /// Whether valid readings are written to the database
    pub persist_readings: bool,
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    /// Path to the SQLite database file
    pub db_path: String,
}

/// `[ui]` section
#[derive(Debug, Clone, Deserialize)]
pub struct UiSection {
    /// Port for the HTTP query endpoint
    pub port: u16,
}

impl MonitorSection {
    pub fn sample_delay(&self) -> Duration {
        Duration::from_secs_f64(self.sample_delay)
    }

    pub fn measurement_frequency(&self) -> Duration {
        Duration::from_secs_f64(self.measurement_frequency)
    }
}

/// Loads the service configuration from a TOML file.
///
/// Returns an error string suitable for printing and exiting: the service
/// cannot operate without a valid configuration, so callers treat any
/// failure here as fatal.
pub fn load_config(path: &str) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let config: Config = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", path, e))?;

    if config.monitor.num_samples == 0 {
        return Err(format!("{}: num_samples must be at least 1", path));
    }
    if config.monitor.sample_delay < 0.0 {
        return Err(format!("{}: sample_delay must be non-negative", path));
    }
    if config.monitor.measurement_frequency < 0.0 {
        return Err(format!("{}: measurement_frequency must be non-negative", path));
    }

    Ok(config)
}

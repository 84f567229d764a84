//! # gpumetrics-rs-core
//!
//! Shared plumbing for the gpumetrics-rs tools: configuration, output types,
//! the [`Sensor`] trait and the common error type.
//!
//! ## Features
//!
//! - **Configuration management** - RON config file with CLI overrides
//! - **Output formats** - plain text, JSON and Waybar's JSON protocol
//! - **Common sensor trait** - one interface for every GPU backend
//! - **Error handling** - error types with context
//!
//! ## Quick Start
//!
//! ```rust
//! use gpumetrics_rs_core::{Sensor, SensorConfig, WaybarOutput};
//!
//! struct MySensor {
//!     name: String,
//!     config: SensorConfig,
//! }
//!
//! impl Sensor for MySensor {
//!     type Error = gpumetrics_rs_core::SensorError;
//!
//!     fn read(&mut self) -> Result<WaybarOutput, Self::Error> {
//!         Ok(WaybarOutput::from_str("220 W"))
//!     }
//!
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn configure(&mut self, config: SensorConfig) -> Result<(), Self::Error> {
//!         self.config = config;
//!         Ok(())
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory name used under the user's config directory.
const CONFIG_DIR_NAME: &str = "gpumetrics-rs";

/// Default location of the DRM class directory.
pub const DEFAULT_DRM_ROOT: &str = "/sys/class/drm";

/// Standard Waybar output format compliant with Waybar's JSON protocol.
///
/// All fields except `text` are optional and will be omitted from JSON
/// serialization if they are `None`.
///
/// # Examples
///
/// ```rust
/// use gpumetrics_rs_core::WaybarOutput;
///
/// let output = WaybarOutput::new("220 W".to_string())
///     .with_tooltip("Socket power: 220 W")
///     .with_class("normal");
/// assert_eq!(output.percentage, None);
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WaybarOutput {
    /// The main text to display in the bar
    pub text: String,
    /// Optional tooltip text shown on hover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Optional CSS class for styling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Optional percentage value (0-100) for progress indicators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

impl WaybarOutput {
    /// Create a new WaybarOutput with just the required text field.
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self {
            text,
            tooltip: None,
            class: None,
            percentage: None,
        }
    }

    /// Create a new WaybarOutput from a string literal.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        Self::new(text.to_owned())
    }

    /// Add a tooltip to this output.
    #[must_use]
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Add a CSS class to this output.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

/// How a decoded snapshot is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human readable `Label: value` lines
    #[default]
    Text,
    /// The full decoded report as JSON
    Json,
    /// A single Waybar JSON line per snapshot
    Waybar,
}

impl OutputFormat {
    const VALID_OPTIONS: &'static [&'static str] = &["text", "json", "waybar"];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Waybar => write!(f, "waybar"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "waybar" | "bar" => Ok(Self::Waybar),
            _ => Err(OutputFormatParseError {
                input: s.to_owned(),
                valid_options: Self::VALID_OPTIONS,
            }),
        }
    }
}

/// Error type for parsing [`OutputFormat`] from string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid output format '{input}'. Valid options: {}", valid_options.join(", "))]
pub struct OutputFormatParseError {
    input: String,
    valid_options: &'static [&'static str],
}

/// Global configuration loaded from ~/.config/gpumetrics-rs/config.ron
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Directory holding the `cardN` entries
    #[serde(default = "default_drm_root")]
    pub drm_root: PathBuf,
    /// ASIC family used to decode the raw throttle bitmask
    #[serde(default = "default_asic")]
    pub asic: String,
    /// Default output format
    #[serde(default)]
    pub output: OutputFormat,
    /// Print the glossary before the metrics
    #[serde(default)]
    pub show_legend: bool,
    /// Update interval in milliseconds for watch mode
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    /// Hotspot temperature warning threshold (Celsius)
    #[serde(default = "default_temp_warning")]
    pub temp_warning: u16,
    /// Hotspot temperature critical threshold (Celsius)
    #[serde(default = "default_temp_critical")]
    pub temp_critical: u16,
    /// CSS classes used for Waybar output
    #[serde(default)]
    pub theme: Theme,
    /// Sensor-specific configurations
    #[serde(default)]
    pub sensors: HashMap<String, serde_json::Value>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            drm_root: default_drm_root(),
            asic: default_asic(),
            output: OutputFormat::default(),
            show_legend: false,
            update_interval: default_update_interval(),
            temp_warning: default_temp_warning(),
            temp_critical: default_temp_critical(),
            theme: Theme::default(),
            sensors: HashMap::new(),
        }
    }
}

fn default_drm_root() -> PathBuf {
    PathBuf::from(DEFAULT_DRM_ROOT)
}

fn default_asic() -> String {
    "aldebaran".to_owned()
}

fn default_update_interval() -> u64 {
    1000
}

fn default_temp_warning() -> u16 {
    90
}

fn default_temp_critical() -> u16 {
    105
}

impl GlobalConfig {
    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/gpumetrics-rs/config.ron
    /// 2. ~/.gpumetrics-rs/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, SensorError> {
        if let Some(config_path) = Self::find_config_file() {
            Self::load_from_file(&config_path)
        } else {
            log::debug!("no config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(path)?;

        let config: GlobalConfig = ron::from_str(&content).map_err(|e| {
            SensorError::parse_with_source(
                format!("Failed to parse config file {}", path.display()),
                e,
            )
        })?;
        config.validate()?;

        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join(CONFIG_DIR_NAME).join("config.ron");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir
                .join(format!(".{CONFIG_DIR_NAME}"))
                .join("config.ron");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.ron"))
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SensorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SensorError::parse_with_source("Failed to serialize config", e))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Check values that serde alone cannot constrain.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.update_interval < SensorConfig::MIN_UPDATE_INTERVAL {
            return Err(SensorError::config_with_value(
                format!(
                    "Update interval must be at least {}ms",
                    SensorConfig::MIN_UPDATE_INTERVAL
                ),
                self.update_interval.to_string(),
            ));
        }
        if self.temp_warning > self.temp_critical {
            return Err(SensorError::config_with_value(
                "temp_warning must not exceed temp_critical",
                format!("{} > {}", self.temp_warning, self.temp_critical),
            ));
        }
        Ok(())
    }

    /// Convert GlobalConfig to SensorConfig for a named sensor.
    ///
    /// Entries under `sensors.<name>` are copied into the custom map.
    pub fn to_sensor_config(&self, sensor: &str) -> SensorConfig {
        let mut config = SensorConfig {
            update_interval: self.update_interval,
            theme: self.theme.clone(),
            custom: HashMap::new(),
        };

        if let Some(serde_json::Value::Object(map)) = self.sensors.get(sensor) {
            for (key, value) in map {
                config = config.with_custom(key.clone(), value.clone());
            }
        }

        config
    }

    /// Create an example configuration with common settings.
    pub fn example_config() -> Self {
        let mut config = Self::default();
        config.show_legend = true;

        let mut amd_gpu = serde_json::Map::new();
        amd_gpu.insert("show_power".to_owned(), serde_json::Value::Bool(true));
        amd_gpu.insert("show_temperature".to_owned(), serde_json::Value::Bool(true));
        config
            .sensors
            .insert("amd-gpu".to_owned(), serde_json::Value::Object(amd_gpu));

        config
    }

    /// Save the example configuration to a file.
    pub fn save_example_config_to_file(path: &Path) -> Result<(), SensorError> {
        Self::example_config().save_to_file(path)
    }
}

/// Theme configuration for consistent styling of Waybar output.
///
/// These classes should correspond to styling definitions in your Waybar CSS.
///
/// # Examples
///
/// ```rust
/// use gpumetrics_rs_core::Theme;
///
/// let theme = Theme {
///     warning: "my-warning".to_owned(),
///     critical: "my-critical".to_owned(),
///     ..Theme::default()
/// };
/// assert_eq!(theme.class_for_thresholds(95.0, 80.0, 90.0), "my-critical");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Theme {
    /// CSS class for normal/neutral state
    pub normal: String,
    /// CSS class for warning state
    pub warning: String,
    /// CSS class for critical state
    pub critical: String,
    /// CSS class for unknown/unavailable state
    pub unknown: String,
}

impl Theme {
    /// Get the appropriate class name for a threshold-based value.
    ///
    /// - `critical` if `value >= critical_threshold`
    /// - `warning` if `value >= warning_threshold`
    /// - `normal` otherwise
    #[must_use]
    pub fn class_for_thresholds(
        &self,
        value: f64,
        warning_threshold: f64,
        critical_threshold: f64,
    ) -> &str {
        if value >= critical_threshold {
            &self.critical
        } else if value >= warning_threshold {
            &self.warning
        } else {
            &self.normal
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            normal: "normal".to_owned(),
            warning: "warning".to_owned(),
            critical: "critical".to_owned(),
            unknown: "unknown".to_owned(),
        }
    }
}

/// Configuration handed to a running [`Sensor`].
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// Update interval in milliseconds (minimum 100ms)
    pub update_interval: u64,
    /// Theme configuration for CSS styling
    pub theme: Theme,
    /// Sensor-specific custom configuration
    pub custom: HashMap<String, serde_json::Value>,
}

impl SensorConfig {
    /// Minimum allowed update interval in milliseconds.
    pub const MIN_UPDATE_INTERVAL: u64 = 100;

    /// Add a custom configuration value.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Get the update interval as a Duration.
    #[must_use]
    pub fn update_interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_interval)
    }

    /// Get a custom boolean flag, falling back to `default`.
    #[must_use]
    pub fn custom_flag(&self, key: &str, default: bool) -> bool {
        self.custom
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(default)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            theme: Theme::default(),
            custom: HashMap::new(),
        }
    }
}

/// Trait for GPU sensors providing Waybar-compatible output.
pub trait Sensor {
    /// Error type for sensor operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read one snapshot and return Waybar-formatted output.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor data cannot be read or parsed.
    fn read(&mut self) -> Result<WaybarOutput, Self::Error>;

    /// Get the unique name/identifier for this sensor.
    fn name(&self) -> &str;

    /// Update the sensor configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or cannot be applied.
    fn configure(&mut self, config: SensorConfig) -> Result<(), Self::Error>;

    /// Check if the sensor is available on this system.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor is not available or supported.
    fn check_availability(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Utility functions for formatting sensor data.
pub mod format {
    use super::{Theme, WaybarOutput};

    /// Format a tooltip or report line as `key: value`.
    ///
    /// ```rust
    /// use gpumetrics_rs_core::format;
    ///
    /// assert_eq!(format::key_value("Fan Speed", "N/A"), "Fan Speed: N/A");
    /// ```
    #[must_use]
    pub fn key_value(key: &str, value: &str) -> String {
        format!("{key}: {value}")
    }

    /// Create a Waybar output whose class follows the theme thresholds.
    ///
    /// ```rust
    /// use gpumetrics_rs_core::{format, Theme};
    ///
    /// let output = format::themed_output(
    ///     "95 C".to_owned(),
    ///     None,
    ///     None,
    ///     95.0,
    ///     90.0,
    ///     105.0,
    ///     &Theme::default(),
    /// );
    ///
    /// assert_eq!(output.class.as_deref(), Some("warning"));
    /// ```
    #[must_use]
    pub fn themed_output(
        text: String,
        tooltip: Option<String>,
        percentage: Option<u8>,
        value: f64,
        warning_threshold: f64,
        critical_threshold: f64,
        theme: &Theme,
    ) -> WaybarOutput {
        let class = Some(
            theme
                .class_for_thresholds(value, warning_threshold, critical_threshold)
                .to_owned(),
        );

        WaybarOutput {
            text,
            tooltip,
            class,
            percentage,
        }
    }
}

/// Common error types for sensor operations.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// I/O error occurred while reading sensor data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing configuration or sensor data.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (invalid settings, etc.).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
        /// The invalid configuration value if applicable
        value: Option<String>,
    },

    /// Sensor is not available on this system.
    #[error("Sensor unavailable: {reason}")]
    Unavailable {
        /// Reason why the sensor is unavailable
        reason: String,
        /// Whether this is a temporary or permanent condition
        is_temporary: bool,
    },

    /// Invalid data format or unexpected values.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of what makes the data invalid
        message: String,
        /// The invalid data if it can be safely displayed
        data: Option<String>,
    },
}

impl SensorError {
    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error with the invalid value.
    pub fn config_with_value<S: Into<String>, V: Into<String>>(message: S, value: V) -> Self {
        Self::Config {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Create a new unavailable error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: false,
        }
    }

    /// Create a new temporary unavailable error.
    pub fn temporarily_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: true,
        }
    }

    /// Create a new invalid data error with the problematic data.
    pub fn invalid_data_with_value<S: Into<String>, D: Into<String>>(message: S, data: D) -> Self {
        Self::InvalidData {
            message: message.into(),
            data: Some(data.into()),
        }
    }

    /// Check if this error represents a temporary condition.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Unavailable { is_temporary, .. } => *is_temporary,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

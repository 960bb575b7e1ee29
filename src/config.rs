//! Configuration for the Touch Feature Agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for every configured period and window.
pub const MAX_DURATION: Duration = Duration::from_secs(3600);

/// Where the positional grid is anchored on the touch surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginMode {
    BottomLeft,
    Center,
    CenterBottom,
}

impl OriginMode {
    /// The origin point in normalized surface coordinates.
    pub fn point(self) -> (f64, f64) {
        match self {
            OriginMode::BottomLeft => (0.0, 0.0),
            OriginMode::Center => (0.5, 0.5),
            OriginMode::CenterBottom => (0.5, 0.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OriginMode::BottomLeft => "Bottom_left",
            OriginMode::Center => "Center",
            OriginMode::CenterBottom => "Center_bottom",
        }
    }
}

impl FromStr for OriginMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "bottom_left" => Ok(OriginMode::BottomLeft),
            "center" => Ok(OriginMode::Center),
            "center_bottom" => Ok(OriginMode::CenterBottom),
            other => Err(ConfigError::Invalid(format!(
                "unknown origin '{other}' (expected bottom_left, center or center_bottom)"
            ))),
        }
    }
}

/// Shape of the positional encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    Circular,
    Rectangular,
}

impl GridMode {
    pub fn label(self) -> &'static str {
        match self {
            GridMode::Circular => "Circular",
            GridMode::Rectangular => "Rectangle",
        }
    }
}

impl FromStr for GridMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "circular" => Ok(GridMode::Circular),
            "rectangular" | "rectangle" => Ok(GridMode::Rectangular),
            other => Err(ConfigError::Invalid(format!(
                "unknown grid '{other}' (expected circular or rectangular)"
            ))),
        }
    }
}

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of regular channels broadcast every tick
    pub channels: usize,

    /// Broadcast period
    #[serde(with = "duration_ms")]
    pub tick_period: Duration,

    pub origin: OriginMode,
    pub grid: GridMode,

    /// Sampling interval used by the rate-limited move and the velocity feature
    #[serde(with = "duration_ms")]
    pub sample_interval: Duration,

    /// A new touch arriving this soon after the latest activation joins its group
    #[serde(with = "duration_ms")]
    pub grouping_window: Duration,

    /// Touches with less accumulated dwell than this bump the channel mode on release
    #[serde(with = "duration_ms")]
    pub short_touch_threshold: Duration,

    /// Divides raw velocity (surface units per second)
    pub velocity_normalization: f64,

    /// Moves longer than max_norm / reduce_divisor within one sample decay the dwell
    pub reduce_divisor: f64,

    pub min_area: f64,
    pub max_area: f64,

    /// Device tag of events the router accepts
    pub touch_device: String,

    pub sinks: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: 1,
            tick_period: Duration::from_millis(10),
            origin: OriginMode::BottomLeft,
            grid: GridMode::Rectangular,
            sample_interval: Duration::from_millis(10),
            grouping_window: Duration::from_millis(300),
            short_touch_threshold: Duration::from_millis(40),
            velocity_normalization: 5.0,
            reduce_divisor: 300.0,
            min_area: 0.05,
            max_area: 0.5,
            touch_device: "wm_touch".to_string(),
            sinks: SinkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("touch-feature-agent")
            .join("config.json")
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::Invalid("channels must be > 0".to_string()));
        }
        if self.tick_period.is_zero() {
            return Err(ConfigError::Invalid("tick_period must be > 0".to_string()));
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sample_interval must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("tick_period", self.tick_period),
            ("sample_interval", self.sample_interval),
            ("grouping_window", self.grouping_window),
            ("short_touch_threshold", self.short_touch_threshold),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {} ms",
                    MAX_DURATION.as_millis()
                )));
            }
        }
        if self.velocity_normalization <= 0.0 {
            return Err(ConfigError::Invalid(
                "velocity_normalization must be > 0".to_string(),
            ));
        }
        if self.reduce_divisor <= 0.0 {
            return Err(ConfigError::Invalid("reduce_divisor must be > 0".to_string()));
        }
        if self.max_area <= self.min_area {
            return Err(ConfigError::Invalid(format!(
                "max_area ({}) must be greater than min_area ({})",
                self.max_area, self.min_area
            )));
        }
        if self.touch_device.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "touch_device must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert a configured duration for timestamp arithmetic, capped at [`MAX_DURATION`].
    pub(crate) fn time_delta(duration: Duration) -> chrono::Duration {
        chrono::Duration::microseconds(duration.min(MAX_DURATION).as_micros() as i64)
    }

    /// Stream type string announced to the streaming bus.
    pub fn stream_type(&self) -> String {
        format!(
            "Origin: {}, Grid: {}",
            self.origin.label(),
            self.grid.label()
        )
    }
}

/// Configuration for the broadcast sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// OSC/UDP endpoint of the synthesis engine; `None` disables it
    pub osc_addr: Option<String>,
    /// Streaming bus endpoint for positional samples; `None` disables it
    pub outlet_addr: Option<String>,
    /// Log every feature frame to the console
    pub print_features: bool,
    /// Frames buffered between the ticker and the sink dispatcher
    pub queue_depth: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            osc_addr: Some("127.0.0.1:2222".to_string()),
            outlet_addr: Some("127.0.0.1:16571".to_string()),
            print_features: false,
            queue_depth: 64,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.channels, 1);
        assert_eq!(config.tick_period, Duration::from_millis(10));
        assert_eq!(config.origin, OriginMode::BottomLeft);
        assert_eq!(config.grid, GridMode::Rectangular);
        assert_eq!(config.touch_device, "wm_touch");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("center".parse::<OriginMode>().unwrap(), OriginMode::Center);
        assert_eq!(
            "Center-Bottom".parse::<OriginMode>().unwrap(),
            OriginMode::CenterBottom
        );
        assert_eq!("rectangle".parse::<GridMode>().unwrap(), GridMode::Rectangular);
        assert!("top_right".parse::<OriginMode>().is_err());
        assert!("hexagonal".parse::<GridMode>().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.channels = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_area = config.min_area;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tick_period = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_durations() {
        let mut config = Config::default();
        config.tick_period = MAX_DURATION;
        assert!(config.validate().is_ok());

        config.tick_period = Duration::from_secs(u64::MAX);
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("tick_period")),
            other => panic!("expected invalid config, got {other:?}"),
        }

        let mut config = Config::default();
        config.grouping_window = Duration::from_secs(u64::MAX / 2);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sample_interval = MAX_DURATION + Duration::from_millis(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_delta_is_capped() {
        assert_eq!(
            Config::time_delta(Duration::from_millis(300)),
            chrono::Duration::milliseconds(300)
        );
        let huge = Config::time_delta(Duration::from_secs(u64::MAX));
        assert!(huge > chrono::Duration::zero());
        assert_eq!(huge, chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_unknown_origin_in_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"origin": "upper_left"}"#).unwrap();

        match Config::load_from(&path) {
            Err(ConfigError::ParseError(msg)) => assert!(msg.contains("upper_left")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_load_preserves_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.channels = 3;
        config.grouping_window = Duration::from_millis(250);
        config.grid = GridMode::Circular;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.channels, 3);
        assert_eq!(loaded.grouping_window, Duration::from_millis(250));
        assert_eq!(loaded.grid, GridMode::Circular);
    }

    #[test]
    fn test_stream_type_string() {
        let mut config = Config::default();
        config.origin = OriginMode::Center;
        assert_eq!(config.stream_type(), "Origin: Center, Grid: Rectangle");
    }
}

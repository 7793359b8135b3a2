use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::activation::{ActivationMethod, GestureTimings};
use crate::motion::MotionSettings;

/// Lowest accepted sensitivity
pub const MIN_SENSITIVITY: f64 = 0.2;
/// Highest accepted sensitivity
pub const MAX_SENSITIVITY: f64 = 3.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (holds the IPC socket)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Speed multiplier, clamped to [0.2, 3.0]
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Reverse the scroll direction
    #[serde(default)]
    pub inverted: bool,
    /// Tick period while a session is active
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            inverted: false,
            tick_interval_ms: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Activation method name, e.g. "middle_click", "double_middle_click"
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_double_press_window")]
    pub double_press_window_ms: u64,
    #[serde(default = "default_modifier_scroll_window")]
    pub modifier_scroll_window_ms: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            double_press_window_ms: default_double_press_window(),
            modifier_scroll_window_ms: default_modifier_scroll_window(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrollapp")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sensitivity() -> f64 {
    1.0
}

fn default_tick_interval() -> u64 {
    10
}

fn default_method() -> String {
    ActivationMethod::default().name().to_string()
}

fn default_double_press_window() -> u64 {
    500
}

fn default_modifier_scroll_window() -> u64 {
    1000
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Clamp a sensitivity into the accepted range, warning when it moves
pub fn clamp_sensitivity(value: f64) -> f64 {
    if value.is_nan() {
        warn!("Sensitivity is NaN, using {}", default_sensitivity());
        return default_sensitivity();
    }
    let clamped = value.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
    if clamped != value {
        warn!(
            "Sensitivity {} out of range, clamped to {}",
            value, clamped
        );
    }
    clamped
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Get the configuration file path
    /// Always uses ~/.config/scrollapp/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("scrollapp")
            .join("config.toml")
    }

    /// Get the Unix socket path for IPC
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join("scrollapp.sock")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Configured activation method, falling back to the default on
    /// unknown names
    pub fn activation_method(&self) -> ActivationMethod {
        match self.activation.method.parse() {
            Ok(method) => method,
            Err(e) => {
                let fallback = ActivationMethod::default();
                warn!("{}, falling back to {}", e, fallback);
                fallback
            }
        }
    }

    pub fn sensitivity(&self) -> f64 {
        clamp_sensitivity(self.scroll.sensitivity)
    }

    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            sensitivity: self.sensitivity(),
            inverted: self.scroll.inverted,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scroll.tick_interval_ms.max(1))
    }

    pub fn gesture_timings(&self) -> GestureTimings {
        GestureTimings {
            double_press: Duration::from_millis(self.activation.double_press_window_ms),
            modifier_scroll: Duration::from_millis(self.activation.modifier_scroll_window_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.activation_method(), ActivationMethod::MiddleClick);
        assert_eq!(config.sensitivity(), 1.0);
        assert!(!config.scroll.inverted);
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.gesture_timings(), GestureTimings::default());
        assert!(config.socket_path().ends_with("scrollapp.sock"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [scroll]
            inverted = true

            [activation]
            method = "option_scroll"
            "#,
        )
        .unwrap();

        assert!(config.scroll.inverted);
        assert_eq!(config.sensitivity(), 1.0);
        assert_eq!(config.activation_method(), ActivationMethod::OptionScroll);
        assert_eq!(config.activation.double_press_window_ms, 500);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_sensitivity_is_clamped() {
        let mut config = AppConfig::default();
        config.scroll.sensitivity = 10.0;
        assert_eq!(config.sensitivity(), MAX_SENSITIVITY);
        config.scroll.sensitivity = 0.01;
        assert_eq!(config.sensitivity(), MIN_SENSITIVITY);
        config.scroll.sensitivity = 1.7;
        assert_eq!(config.motion_settings().sensitivity, 1.7);
        assert_eq!(clamp_sensitivity(f64::NAN), 1.0);
    }

    #[test]
    fn test_unknown_method_falls_back() {
        let mut config = AppConfig::default();
        config.activation.method = "left_click".to_string();
        assert_eq!(config.activation_method(), ActivationMethod::MiddleClick);
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/var/tmp/scrollapp");
        assert_eq!(config.socket_path(), PathBuf::from("/var/tmp/scrollapp/scrollapp.sock"));

        if let Some(home) = dirs::home_dir() {
            config.general.data_dir = PathBuf::from("~/scroll");
            assert_eq!(config.data_dir(), home.join("scroll"));
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[general]\nlog_level = \"debug\"\n\n[scroll]\nsensitivity = 2.0\ntick_interval_ms = 16"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.sensitivity(), 2.0);
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.activation_method(), ActivationMethod::MiddleClick);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[scroll\nsensitivity = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&bad),
            Err(crate::Error::Config(_))
        ));
    }
}

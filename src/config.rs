//! Configuration management for the rgb_fand daemon.
//!
//! Handles loading, parsing, and validation of YAML configuration files
//! that define profiles, plugin chains, port overrides, and timer intervals.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::color::LedColor;
use crate::effects::{
    PingPongEffect, PingPongEffectConfig, SnakeEffect, SnakeEffectConfig, StaticColorEffect,
    StaticColorEffectConfig,
};
use crate::plugin::{Effect, SpeedController};
use crate::port::{PortConfig, PortIdentifier};
use crate::sensor::SensorConfig;
use crate::speed::{
    CurveSpeedController, CurveSpeedControllerConfig, FixedSpeedController,
    FixedSpeedControllerConfig,
};

/// Main configuration structure for the rgb_fand daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// timers:
///   speed-ms: 2500
///
/// profiles:
///   - name: "case fans"
///     guid: "77e51a2c-6b41-4d1e-8f2b-47a0e3f0c9d1"
///     ports:
///       - { controller_id: 1, port_id: 1 }
///       - { controller_id: 1, port_id: 2 }
///     speed-controllers:
///       - kind: curve
///         sensor: "lm:k10temp-pci-00c3:Tctl"
///         points:
///           - { temperature: 40.0, speed: 30 }
///           - { temperature: 80.0, speed: 100 }
///     effects:
///       - kind: static-color
///         color: { r: 0, g: 64, b: 255 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Timer intervals, all in milliseconds.
    #[serde(default)]
    pub timers: TimerCfg,

    /// Profiles binding port groups to plugin chains.
    #[serde(default)]
    pub profiles: Vec<ProfileCfg>,

    /// Per-port configuration overrides.
    #[serde(default)]
    pub port_configs: Vec<PortConfigCfg>,

    /// Per-sensor configuration overrides.
    #[serde(default)]
    pub sensor_configs: Vec<SensorConfigCfg>,

    /// Hardware states to apply at daemon boundaries.
    #[serde(default)]
    pub computer_state_profiles: Vec<ComputerStateProfileCfg>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimerCfg {
    #[serde(default = "defaults::sensor_ms")]
    pub sensor_ms: u64,
    #[serde(default = "defaults::speed_ms")]
    pub speed_ms: u64,
    #[serde(default = "defaults::rgb_ms")]
    pub rgb_ms: u64,
    #[serde(default = "defaults::diagnostics_ms")]
    pub diagnostics_ms: u64,
}

impl Default for TimerCfg {
    fn default() -> Self {
        Self {
            sensor_ms: defaults::sensor_ms(),
            speed_ms: defaults::speed_ms(),
            rgb_ms: defaults::rgb_ms(),
            diagnostics_ms: defaults::diagnostics_ms(),
        }
    }
}

mod defaults {
    pub fn sensor_ms() -> u64 {
        250
    }
    pub fn speed_ms() -> u64 {
        2500
    }
    pub fn rgb_ms() -> u64 {
        32
    }
    pub fn diagnostics_ms() -> u64 {
        5000
    }
}

/// One profile: a named port group with ordered plugin chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileCfg {
    pub name: String,
    pub guid: Uuid,
    pub ports: Vec<PortIdentifier>,
    #[serde(default)]
    pub speed_controllers: Vec<SpeedControllerCfg>,
    #[serde(default)]
    pub effects: Vec<EffectCfg>,
}

/// Speed controller plugin variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SpeedControllerCfg {
    Fixed(FixedSpeedControllerConfig),
    Curve(CurveSpeedControllerConfig),
}

impl SpeedControllerCfg {
    pub fn build(&self) -> Result<Box<dyn SpeedController>> {
        match self {
            Self::Fixed(cfg) => Ok(Box::new(FixedSpeedController::new(cfg.clone()))),
            Self::Curve(cfg) => Ok(Box::new(CurveSpeedController::new(cfg.clone())?)),
        }
    }
}

/// Color effect plugin variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EffectCfg {
    StaticColor(StaticColorEffectConfig),
    Snake(SnakeEffectConfig),
    PingPong(PingPongEffectConfig),
}

impl EffectCfg {
    pub fn build(&self) -> Result<Box<dyn Effect>> {
        match self {
            Self::StaticColor(cfg) => Ok(Box::new(StaticColorEffect::new(cfg.clone()))),
            Self::Snake(cfg) => Ok(Box::new(SnakeEffect::new(cfg.clone()))),
            Self::PingPong(cfg) => Ok(Box::new(PingPongEffect::new(cfg.clone()))),
        }
    }
}

/// Port override: seeded defaults are replaced with this config at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfigCfg {
    pub port: PortIdentifier,
    #[serde(flatten)]
    pub config: PortConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfigCfg {
    pub sensor: String,
    #[serde(flatten)]
    pub config: SensorConfig,
}

/// Daemon lifecycle boundary a state profile fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateChangeType {
    Boot,
    Shutdown,
}

/// Hardware state pushed when the daemon crosses a lifecycle boundary.
///
/// `None` fields leave that aspect of the port untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComputerStateProfileCfg {
    pub state_type: StateChangeType,
    pub ports: Vec<PortIdentifier>,
    #[serde(default)]
    pub speed: Option<u8>,
    #[serde(default)]
    pub effect_type: Option<String>,
    #[serde(default)]
    pub effect_colors: Vec<LedColor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            timers: TimerCfg::default(),
            profiles: Vec::new(),
            port_configs: Vec::new(),
            sensor_configs: Vec::new(),
            computer_state_profiles: Vec::new(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// Validation failure is fatal; the daemon never starts on a half-valid
    /// config.
    pub fn validate(&self) -> Result<()> {
        let mut guids = std::collections::HashSet::new();
        for profile in &self.profiles {
            if !guids.insert(profile.guid) {
                anyhow::bail!("Duplicate profile guid '{}'", profile.guid);
            }
            if profile.ports.is_empty() {
                anyhow::bail!("Profile '{}' has no ports", profile.name);
            }
            for controller in &profile.speed_controllers {
                controller.build().with_context(|| {
                    format!("Invalid speed controller in profile '{}'", profile.name)
                })?;
            }
            for effect in &profile.effects {
                effect
                    .build()
                    .with_context(|| format!("Invalid effect in profile '{}'", profile.name))?;
            }
        }

        for state_profile in &self.computer_state_profiles {
            if let Some(speed) = state_profile.speed {
                if speed > 100 {
                    anyhow::bail!("State profile speed {speed} exceeds 100");
                }
            }
        }

        for timer in [
            self.timers.sensor_ms,
            self.timers.speed_ms,
            self.timers.rgb_ms,
            self.timers.diagnostics_ms,
        ] {
            if timer == 0 {
                anyhow::bail!("Timer intervals must be non-zero");
            }
        }

        Ok(())
    }

    pub fn state_profiles(
        &self,
        state: StateChangeType,
    ) -> impl Iterator<Item = &ComputerStateProfileCfg> {
        self.computer_state_profiles
            .iter()
            .filter(move |p| p.state_type == state)
    }
}

fn locate_config() -> Result<PathBuf> {
    // 2) ENV
    if let Ok(env_path) = env::var("RGB_FAND_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    // 3) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("rgb_fand/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir.clone());
        }
    }

    // 4) /etc
    let etc = Path::new("/etc/rgb_fand/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Configuration manager that handles both config data and file operations.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. RGB_FAND_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/rgb_fand/config.yml or ~/.config/rgb_fand/config.yml
    /// 4. /etc/rgb_fand/config.yml
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path)?;

        Ok(Self::new(config, config_path))
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clones the current configuration.
    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    const VALID_YAML: &str = r#"
version: 1
timers:
  speed-ms: 1000

profiles:
  - name: "case fans"
    guid: "77e51a2c-6b41-4d1e-8f2b-47a0e3f0c9d1"
    ports:
      - { controller_id: 1, port_id: 1 }
      - { controller_id: 1, port_id: 2 }
    speed-controllers:
      - kind: curve
        sensor: "cpu"
        points:
          - { temperature: 40.0, speed: 30 }
          - { temperature: 80.0, speed: 100 }
      - kind: fixed
        speed: 50
    effects:
      - kind: snake
        length: 4
        snake_color: { r: 255, g: 0, b: 0 }
      - kind: static-color
        color: { r: 0, g: 64, b: 255 }

port_configs:
  - port: { controller_id: 1, port_id: 1 }
    device_type: riing-duo
    led_rotation: 3

sensor_configs:
  - sensor: "cpu"
    critical_value: 90.0

computer_state_profiles:
  - state-type: boot
    ports:
      - { controller_id: 1, port_id: 1 }
    speed: 30
    effect-type: "Full"
    effect-colors:
      - { r: 0, g: 0, b: 0 }
"#;

    #[tokio::test]
    async fn loads_valid_yaml() {
        let temp_file = create_temp_config(VALID_YAML);
        let manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        let config = manager.clone_config().await;

        assert_eq!(config.version, 1);
        assert_eq!(config.timers.speed_ms, 1000);
        // Unspecified timers fall back to defaults
        assert_eq!(config.timers.sensor_ms, 250);
        assert_eq!(config.timers.rgb_ms, 32);

        assert_eq!(config.profiles.len(), 1);
        let profile = &config.profiles[0];
        assert_eq!(profile.ports.len(), 2);
        assert_eq!(profile.speed_controllers.len(), 2);
        assert_eq!(profile.effects.len(), 2);

        assert_eq!(config.port_configs.len(), 1);
        assert_eq!(config.port_configs[0].config.led_rotation, 3);
        assert_eq!(
            config.sensor_configs[0].config.critical_value,
            Some(90.0)
        );
        assert_eq!(config.computer_state_profiles.len(), 1);
    }

    #[tokio::test]
    async fn rejects_unsupported_version() {
        let temp_file = create_temp_config("version: 2\n");
        assert!(
            ConfigManager::load(Some(temp_file.path().to_path_buf()))
                .await
                .is_err()
        );
    }

    #[test]
    fn validate_rejects_duplicate_guids() {
        let mut config: Config = serde_yaml::from_str(VALID_YAML).unwrap();
        let copy = config.profiles[0].clone();
        config.profiles.push(copy);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate profile guid"));
    }

    #[test]
    fn validate_rejects_invalid_curve() {
        let yaml = r#"
version: 1
profiles:
  - name: "broken"
    guid: "77e51a2c-6b41-4d1e-8f2b-47a0e3f0c9d2"
    ports:
      - { controller_id: 1, port_id: 1 }
    speed-controllers:
      - kind: curve
        sensor: "cpu"
        points: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid speed controller"));
    }

    #[test]
    fn validate_rejects_empty_port_group() {
        let yaml = r#"
version: 1
profiles:
  - name: "empty"
    guid: "77e51a2c-6b41-4d1e-8f2b-47a0e3f0c9d3"
    ports: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.timers.rgb_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_overspeed_state_profile() {
        let mut config = Config::default();
        config.computer_state_profiles.push(ComputerStateProfileCfg {
            state_type: StateChangeType::Shutdown,
            ports: vec![PortIdentifier::new(1, 1)],
            speed: Some(130),
            effect_type: None,
            effect_colors: Vec::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn state_profiles_filter_by_boundary() {
        let config: Config = serde_yaml::from_str(VALID_YAML).unwrap();
        assert_eq!(config.state_profiles(StateChangeType::Boot).count(), 1);
        assert_eq!(config.state_profiles(StateChangeType::Shutdown).count(), 0);
    }

    #[test]
    fn plugin_factories_build_from_config() {
        let config: Config = serde_yaml::from_str(VALID_YAML).unwrap();
        let profile = &config.profiles[0];
        for cfg in &profile.speed_controllers {
            cfg.build().unwrap();
        }
        for cfg in &profile.effects {
            cfg.build().unwrap();
        }
    }
}

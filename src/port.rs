//! Port addressing model: identifiers, per-port configuration and telemetry.

use serde::{Deserialize, Serialize};

/// Identity of a single addressable output on a controller.
///
/// Equality is by value; this is the key into the data cache and the device
/// manager. `controller_id` is the discovery index of the owning controller,
/// `port_id` the controller-scoped port index (1-based, matching the wire
/// protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortIdentifier {
    pub controller_id: u8,
    pub port_id: u8,
}

impl PortIdentifier {
    pub const fn new(controller_id: u8, port_id: u8) -> Self {
        Self {
            controller_id,
            port_id,
        }
    }
}

impl std::fmt::Display for PortIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.controller_id, self.port_id)
    }
}

/// Kind of device attached to a port, used by effects that render against a
/// physical ring layout and to derive the default LED count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    #[default]
    Default,
    /// Two 12-LED rings plus a 6-LED center ring.
    RiingTrio,
    /// One 12-LED ring plus a 6-LED center ring.
    RiingDuo,
    /// Single 9-LED ring.
    PurePlus,
}

impl DeviceType {
    pub const fn led_count(self) -> usize {
        match self {
            DeviceType::Default => 12,
            DeviceType::RiingTrio => 30,
            DeviceType::RiingDuo => 18,
            DeviceType::PurePlus => 9,
        }
    }
}

/// Policy for adapting a generated color buffer to the physical LED count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedCountHandling {
    /// Resample through a gradient across the source colors.
    #[default]
    Lerp,
    /// Pick the nearest source index for each target position.
    Nearest,
    /// Circular fold, keeping the tail of the extended sequence.
    Wrap,
    /// Truncate to the physical count.
    Trim,
    /// Repeat the source until the physical count is reached.
    Copy,
    /// Push the buffer through unchanged.
    DoNothing,
}

/// Static per-port configuration.
///
/// Populated once at initialization from device-reported defaults, then
/// overridden by persisted configuration. Read on every RGB tick, never
/// mutated concurrently with reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    #[serde(default)]
    pub device_type: DeviceType,
    /// Physical LED count; defaults from the device type.
    #[serde(default)]
    pub led_count: Option<usize>,
    #[serde(default)]
    pub led_rotation: usize,
    #[serde(default)]
    pub led_reverse: bool,
    #[serde(default)]
    pub led_count_handling: LedCountHandling,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Default,
            led_count: None,
            led_rotation: 0,
            led_reverse: false,
            led_count_handling: LedCountHandling::default(),
        }
    }
}

impl PortConfig {
    pub fn led_count(&self) -> usize {
        self.led_count.unwrap_or_else(|| self.device_type.led_count())
    }
}

/// Last observed telemetry for a port, refreshed once per speed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortData {
    pub speed_percent: u8,
    pub rpm: u32,
}

impl std::fmt::Display for PortData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "speed={}% rpm={}", self.speed_percent, self.rpm)
    }
}

//! Constant-percentage speed controller.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::CacheReadView;
use crate::plugin::{SpeedController, SpeedMap};
use crate::port::PortIdentifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedSpeedControllerConfig {
    /// Percentage applied to every port, clamped to 100.
    pub speed: u8,
}

pub struct FixedSpeedController {
    config: FixedSpeedControllerConfig,
}

impl FixedSpeedController {
    pub fn new(config: FixedSpeedControllerConfig) -> Self {
        Self { config }
    }
}

impl SpeedController for FixedSpeedController {
    fn name(&self) -> &'static str {
        "FixedSpeedController"
    }

    fn is_enabled(&self, _cache: &CacheReadView) -> bool {
        true
    }

    fn generate_speeds(
        &mut self,
        ports: &[PortIdentifier],
        _cache: &CacheReadView,
    ) -> Result<Option<SpeedMap>> {
        let speed = self.config.speed.min(100);
        Ok(Some(ports.iter().map(|p| (*p, speed)).collect()))
    }
}

//! Solid color effect, the smallest contract-conforming plugin.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::CacheReadView;
use crate::color::LedColor;
use crate::plugin::{ColorMap, Effect};
use crate::port::PortIdentifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticColorEffectConfig {
    pub color: LedColor,
}

pub struct StaticColorEffect {
    config: StaticColorEffectConfig,
}

impl StaticColorEffect {
    pub fn new(config: StaticColorEffectConfig) -> Self {
        Self { config }
    }
}

impl Effect for StaticColorEffect {
    fn name(&self) -> &'static str {
        "StaticColorEffect"
    }

    fn effect_type(&self) -> &'static str {
        "Full"
    }

    fn is_enabled(&self, _cache: &CacheReadView) -> bool {
        true
    }

    fn generate_colors(
        &mut self,
        ports: &[PortIdentifier],
        _cache: &CacheReadView,
    ) -> Result<Option<ColorMap>> {
        Ok(Some(
            ports.iter().map(|p| (*p, vec![self.config.color])).collect(),
        ))
    }
}

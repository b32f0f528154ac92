//! Circular runner effect.
//!
//! All ports' LEDs, concatenated in port order, form one circular buffer. A
//! runner of configured length trails a head index that advances by one
//! position per tick, wrapping modulo the total length; everything else holds
//! the background color. The combined buffer is sliced back per port, with
//! each port's own rotation/reversal applied before emission — the runner's
//! geometry depends on assembling the global ring first, so this orientation
//! handling is the effect's own, prior to the post-processing pipeline.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::CacheReadView;
use crate::color::LedColor;
use crate::led_transform;
use crate::plugin::{ColorMap, Effect};
use crate::port::PortIdentifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnakeEffectConfig {
    pub length: usize,
    pub snake_color: LedColor,
    #[serde(default)]
    pub background_color: LedColor,
}

pub struct SnakeEffect {
    config: SnakeEffectConfig,
    head: usize,
}

impl SnakeEffect {
    pub fn new(config: SnakeEffectConfig) -> Self {
        Self { config, head: 0 }
    }
}

fn wrap(a: isize, len: usize) -> usize {
    let len = len as isize;
    (((a % len) + len) % len) as usize
}

impl Effect for SnakeEffect {
    fn name(&self) -> &'static str {
        "SnakeEffect"
    }

    fn effect_type(&self) -> &'static str {
        "PerLed"
    }

    fn is_enabled(&self, _cache: &CacheReadView) -> bool {
        true
    }

    fn generate_colors(
        &mut self,
        ports: &[PortIdentifier],
        cache: &CacheReadView,
    ) -> Result<Option<ColorMap>> {
        let configs: Vec<_> = ports
            .iter()
            .map(|p| cache.port_config(p).unwrap_or_default())
            .collect();
        let led_count: usize = configs.iter().map(|c| c.led_count()).sum();
        if led_count == 0 {
            return Ok(None);
        }

        let mut colors = vec![self.config.background_color; led_count];
        for i in 0..self.config.length.min(led_count) {
            colors[wrap(self.head as isize - i as isize, led_count)] = self.config.snake_color;
        }

        let mut result = ColorMap::new();
        let mut slice_offset = 0;
        for (port, config) in ports.iter().zip(&configs) {
            let mut slice = colors[slice_offset..slice_offset + config.led_count()].to_vec();
            led_transform::rotate_left(&mut slice, config.led_rotation);
            if config.led_reverse {
                slice.reverse();
            }
            slice_offset += config.led_count();
            result.insert(*port, slice);
        }

        self.head = (self.head + 1) % led_count;
        Ok(Some(result))
    }
}

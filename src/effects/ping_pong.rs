//! Oscillating band effect.
//!
//! A scalar phase `t` sweeps `[0, 1]` and reflects at the boundaries. The
//! full port list forms one concatenated normalized axis; each port owns the
//! sub-interval `[i/N, (i+1)/N)`. A band of configured height centered at `t`
//! is intersected with each port's interval and rendered onto the port's ring
//! layout, brightness falling off linearly towards the band's edges.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::CacheReadView;
use crate::color::LedColor;
use crate::plugin::{ColorMap, Effect};
use crate::port::{DeviceType, PortIdentifier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingPongEffectConfig {
    /// Phase increment per tick.
    #[serde(default = "defaults::step")]
    pub step: f64,
    /// Band height on the normalized axis.
    #[serde(default = "defaults::height")]
    pub height: f64,
    /// Angular width mask: ring positions inside `[width, 1 - width]` stay
    /// dark.
    #[serde(default = "defaults::width")]
    pub width: f64,
}

mod defaults {
    pub fn step() -> f64 {
        0.01
    }
    pub fn height() -> f64 {
        0.02
    }
    pub fn width() -> f64 {
        0.3
    }
}

pub struct PingPongEffect {
    config: PingPongEffectConfig,
    t: f64,
    direction: f64,
}

impl PingPongEffect {
    pub fn new(config: PingPongEffectConfig) -> Self {
        Self {
            config,
            t: 0.0,
            direction: 1.0,
        }
    }

    /// Renders the band intersection onto one symmetric ring.
    ///
    /// `ring_offset` shifts positions inward for concentric center rings;
    /// `odd_divide` selects the mirroring rule for even-count rings.
    fn ring_colors(
        &self,
        led_count: usize,
        local_start: f64,
        local_end: f64,
        ring_offset: f64,
        odd_divide: bool,
    ) -> Vec<LedColor> {
        let mut colors = vec![LedColor::default(); led_count];
        if led_count < 2 {
            return colors;
        }

        let is_odd = led_count % 2 != 0;
        let upper = if odd_divide || is_odd {
            led_count / 2
        } else {
            led_count / 2 - 1
        };
        for j in 0..=upper {
            let position =
                ring_offset + (j as f64 / (led_count / 2) as f64) * (1.0 - ring_offset * 2.0);
            if position >= self.config.width && position <= 1.0 - self.config.width {
                continue;
            }

            if position >= local_start && position <= local_end {
                let dist = (position - local_start).min(local_end - position).abs();
                let falloff = (2.0 * dist) / (local_end - local_start);
                let brightness = (255.0 * falloff) as u8;
                let color = LedColor::new(brightness, brightness, brightness);

                colors[j] = color;
                if !odd_divide && !is_odd {
                    colors[led_count - j - 1] = color;
                } else if j != 0 && (j != led_count / 2 || is_odd) {
                    colors[led_count - j] = color;
                }
            }
        }
        colors
    }
}

impl Effect for PingPongEffect {
    fn name(&self) -> &'static str {
        "PingPongEffect"
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
        self.t += self.config.step * self.direction;
        if self.t < 0.0 {
            self.direction = 1.0;
            self.t = 0.0;
        } else if self.t > 1.0 {
            self.direction = -1.0;
            self.t = 1.0;
        }

        let mut result = ColorMap::new();
        let count = ports.len();
        for (i, port) in ports.iter().enumerate() {
            let config = cache.port_config(port).unwrap_or_default();
            let led_count = config.device_type.led_count();

            let global_start = i as f64 / count as f64;
            let global_end = (i + 1) as f64 / count as f64;

            let t_bottom = self.t - self.config.height / 2.0;
            let t_top = self.t + self.config.height / 2.0;

            let outside = (t_bottom < global_start && t_top < global_start)
                || (t_bottom > global_end && t_top > global_end);
            if outside {
                result.insert(*port, vec![LedColor::default(); led_count]);
                continue;
            }

            let local_start = (t_bottom - global_start) / (global_end - global_start);
            let local_end = (t_top - global_start) / (global_end - global_start);

            let colors = match config.device_type {
                DeviceType::RiingTrio => {
                    let mut c = self.ring_colors(12, local_start, local_end, 0.0, true);
                    c.extend_from_within(..);
                    c.extend(self.ring_colors(6, local_start, local_end, 0.4, false));
                    c
                }
                DeviceType::RiingDuo => {
                    let mut c = self.ring_colors(12, local_start, local_end, 0.0, true);
                    c.extend(self.ring_colors(6, local_start, local_end, 0.4, false));
                    c
                }
                DeviceType::PurePlus => self.ring_colors(9, local_start, local_end, 0.4, true),
                DeviceType::Default => {
                    self.ring_colors(led_count, local_start, local_end, 0.0, true)
                }
            };
            result.insert(*port, colors);
        }

        Ok(Some(result))
    }
}

//! RGB color value type and gradient interpolation for LED buffers.

use serde::{Deserialize, Serialize};

/// Color of a single addressable LED.
///
/// Default is black (all channels off), which effects use as "unlit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LedColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Solid red, the alarm color pushed when an effect plugin fails.
    pub const fn alarm() -> Self {
        Self::new(255, 0, 0)
    }

    /// Linear interpolation between two colors, `t` in `[0, 1]`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl From<[u8; 3]> for LedColor {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

/// Gradient over a list of source colors stretched across `[0, length]`.
///
/// Source colors sit at evenly spaced positions; sampling between two stops
/// interpolates linearly. Used by the `Lerp` LED count adaptation to resample
/// an `n`-color buffer at `m` positions.
#[derive(Debug, Clone)]
pub struct LedColorGradient {
    stops: Vec<(f64, LedColor)>,
}

impl LedColorGradient {
    /// Builds a gradient placing `colors` evenly over `[0, length]`.
    ///
    /// A single source color yields a constant gradient.
    pub fn new(colors: &[LedColor], length: f64) -> Self {
        let stops = match colors.len() {
            0 => vec![(0.0, LedColor::default())],
            1 => vec![(0.0, colors[0])],
            n => colors
                .iter()
                .enumerate()
                .map(|(i, c)| (length * i as f64 / (n - 1) as f64, *c))
                .collect(),
        };
        Self { stops }
    }

    /// Samples the gradient at `position`, clamping outside `[0, length]`.
    pub fn color_at(&self, position: f64) -> LedColor {
        let first = self.stops[0];
        if position <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if position <= p1 {
                if (p1 - p0).abs() < f64::EPSILON {
                    return c1;
                }
                return c0.lerp(c1, (position - p0) / (p1 - p0));
            }
        }
        self.stops.last().map(|(_, c)| *c).unwrap_or_default()
    }
}

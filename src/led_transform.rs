//! LED buffer post-processing: rotation, reversal, count adaptation.
//!
//! Runs after effect generation and before the hardware write, independently
//! per port. Rotation and reversal operate on the generated buffer (the
//! effect author's coordinate space); count adaptation happens last so an
//! effect can author against a logical LED count regardless of the port's
//! physical layout.

use crate::color::{LedColor, LedColorGradient};
use crate::port::{LedCountHandling, PortConfig};

/// Applies the full pipeline for one port.
pub fn apply(mut colors: Vec<LedColor>, config: &PortConfig) -> Vec<LedColor> {
    rotate_left(&mut colors, config.led_rotation);
    if config.led_reverse {
        colors.reverse();
    }
    adapt_count(colors, config.led_count(), config.led_count_handling)
}

/// Left-rotates the buffer by `k` positions (modulo its length).
pub fn rotate_left(colors: &mut [LedColor], k: usize) {
    if colors.is_empty() {
        return;
    }
    let k = k % colors.len();
    if k > 0 {
        colors.rotate_left(k);
    }
}

/// Adapts an `n`-color buffer to `target` physical LEDs.
pub fn adapt_count(
    colors: Vec<LedColor>,
    target: usize,
    handling: LedCountHandling,
) -> Vec<LedColor> {
    let n = colors.len();
    if n == 0 {
        return colors;
    }

    match handling {
        LedCountHandling::Lerp => {
            if target == n {
                return colors;
            }
            let gradient = LedColorGradient::new(&colors, target.saturating_sub(1) as f64);
            (0..target).map(|i| gradient.color_at(i as f64)).collect()
        }
        LedCountHandling::Nearest => {
            if target == n {
                return colors;
            }
            (0..target)
                .map(|i| {
                    let idx = if target == 1 {
                        ((n - 1) as f64 / 2.0).round() as usize
                    } else {
                        ((i as f64 / (target - 1) as f64) * (n - 1) as f64).round() as usize
                    };
                    colors[idx]
                })
                .collect()
        }
        LedCountHandling::Wrap => {
            // Only folds down; the last `target` colors of the circular
            // extension, remainder chunk first.
            if target >= n {
                return colors;
            }
            let remainder = n % target;
            let mut out = Vec::with_capacity(target);
            out.extend_from_slice(&colors[n - remainder..]);
            out.extend_from_slice(&colors[n - target..n - remainder]);
            out
        }
        LedCountHandling::Trim => {
            if target >= n {
                return colors;
            }
            colors[..target].to_vec()
        }
        LedCountHandling::Copy => {
            if target <= n {
                return colors;
            }
            colors.iter().copied().cycle().take(target).collect()
        }
        LedCountHandling::DoNothing => colors,
    }
}

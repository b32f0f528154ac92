//! Temperature-curve speed controller.
//!
//! Maps one sensor's smoothed value through a point curve with linear
//! interpolation between neighbouring points. Values below the first point
//! clamp to its speed, above the last point to full speed.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cache::CacheReadView;
use crate::plugin::{SpeedController, SpeedMap};
use crate::port::PortIdentifier;
use crate::sensor::SensorIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temperature: f32,
    pub speed: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveSpeedControllerConfig {
    pub sensor: SensorIdentifier,
    /// Points sorted by temperature; validated at construction.
    pub points: Vec<CurvePoint>,
}

pub struct CurveSpeedController {
    config: CurveSpeedControllerConfig,
}

impl CurveSpeedController {
    pub fn new(config: CurveSpeedControllerConfig) -> Result<Self> {
        if config.points.is_empty() {
            anyhow::bail!("curve speed controller requires at least one point");
        }
        if config
            .points
            .windows(2)
            .any(|w| w[1].temperature <= w[0].temperature)
        {
            anyhow::bail!("curve points must be strictly increasing in temperature");
        }
        Ok(Self { config })
    }

    fn speed_at(&self, value: f32) -> u8 {
        let points = &self.config.points;
        let first = points[0];
        let last = points[points.len() - 1];
        if value <= first.temperature {
            return first.speed;
        }
        if value >= last.temperature {
            return last.speed.min(100);
        }
        points
            .windows(2)
            .find_map(|w| {
                let (p0, p1) = (w[0], w[1]);
                if (p0.temperature..=p1.temperature).contains(&value) {
                    let ratio = (value - p0.temperature) / (p1.temperature - p0.temperature);
                    let speed = f32::from(p0.speed) * (1.0 - ratio) + f32::from(p1.speed) * ratio;
                    Some(speed.round().clamp(0.0, 100.0) as u8)
                } else {
                    None
                }
            })
            .unwrap_or(last.speed)
    }
}

impl SpeedController for CurveSpeedController {
    fn name(&self) -> &'static str {
        "CurveSpeedController"
    }

    fn is_enabled(&self, _cache: &CacheReadView) -> bool {
        true
    }

    fn used_sensors(&self) -> Vec<SensorIdentifier> {
        vec![self.config.sensor.clone()]
    }

    fn generate_speeds(
        &mut self,
        ports: &[PortIdentifier],
        cache: &CacheReadView,
    ) -> Result<Option<SpeedMap>> {
        let value = cache.sensor_value(&self.config.sensor);
        if value.is_nan() {
            // Sensor not sampled yet: no update this tick.
            return Ok(None);
        }

        let speed = self.speed_at(value);
        Ok(Some(ports.iter().map(|p| (*p, speed)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DataCache;
    use pretty_assertions::assert_eq;

    fn controller() -> CurveSpeedController {
        CurveSpeedController::new(CurveSpeedControllerConfig {
            sensor: "cpu".into(),
            points: vec![
                CurvePoint {
                    temperature: 30.0,
                    speed: 20,
                },
                CurvePoint {
                    temperature: 50.0,
                    speed: 40,
                },
                CurvePoint {
                    temperature: 70.0,
                    speed: 100,
                },
            ],
        })
        .unwrap()
    }

    #[test]
    fn rejects_empty_curve() {
        assert!(
            CurveSpeedController::new(CurveSpeedControllerConfig {
                sensor: "cpu".into(),
                points: vec![],
            })
            .is_err()
        );
    }

    #[test]
    fn rejects_unsorted_points() {
        assert!(
            CurveSpeedController::new(CurveSpeedControllerConfig {
                sensor: "cpu".into(),
                points: vec![
                    CurvePoint {
                        temperature: 50.0,
                        speed: 40
                    },
                    CurvePoint {
                        temperature: 30.0,
                        speed: 20
                    },
                ],
            })
            .is_err()
        );
    }

    #[test]
    fn interpolates_between_points() {
        let controller = controller();
        assert_eq!(controller.speed_at(40.0), 30);
        assert_eq!(controller.speed_at(60.0), 70);
    }

    #[test]
    fn clamps_outside_curve() {
        let controller = controller();
        assert_eq!(controller.speed_at(0.0), 20);
        assert_eq!(controller.speed_at(95.0), 100);
    }

    #[test]
    fn unsampled_sensor_yields_no_update() {
        let mut controller = controller();
        let cache = DataCache::new();
        let ports = [PortIdentifier::new(1, 1)];
        let result = controller
            .generate_speeds(&ports, &cache.read_view())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn smoothed_value_drives_all_ports() {
        let mut controller = controller();
        let cache = DataCache::new();
        cache.write_view().store_sensor_value("cpu".into(), 50.0);
        let ports = [PortIdentifier::new(1, 1), PortIdentifier::new(2, 1)];

        let map = controller
            .generate_speeds(&ports, &cache.read_view())
            .unwrap()
            .unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.values().all(|s| *s == 40));
    }

    #[test]
    fn reports_used_sensor() {
        let controller = controller();
        assert_eq!(controller.used_sensors(), vec!["cpu".into()]);
    }
}

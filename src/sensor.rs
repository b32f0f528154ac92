//! Sensor identity, smoothing, and the polling manager.
//!
//! Raw readings come from a [`HardwareMonitor`] collaborator and are damped
//! with an exponential moving average before being published into the cache.
//! A value of `f32::NAN` means "not yet sampled" and must be treated as
//! absent by every consumer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::CacheWriteView;

/// Identity of a hardware sensor, e.g. `lm:k10temp-pci-00c3:Tctl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorIdentifier(Arc<str>);

impl SensorIdentifier {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SensorIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorIdentifier {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Per-sensor configuration overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Smoothed value above which every port is driven to full speed.
    #[serde(default)]
    pub critical_value: Option<f32>,
}

/// Collaborator exposing a flat list of sensors with instantaneous values.
///
/// Polled, never pushed. Backed by lm-sensors in production, mocked in tests.
#[async_trait]
pub trait HardwareMonitor: Send + Sync {
    fn sensors(&self) -> Vec<SensorIdentifier>;

    /// Reads the current raw value of one sensor.
    async fn read_value(&self, sensor: &SensorIdentifier) -> Result<f32>;
}

/// Exponential moving average over raw sensor samples.
///
/// `smoothed = alpha * smoothed + (1 - alpha) * raw`; the first sample seeds
/// the filter directly so the output is never `NaN` once a sample arrived.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverageSensorValueProvider {
    alpha: f32,
    value: f32,
}

impl MovingAverageSensorValueProvider {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            value: f32::NAN,
        }
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        if self.value.is_nan() {
            self.value = raw;
        } else {
            self.value = self.alpha * self.value + (1.0 - self.alpha) * raw;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Decay constant derived from the two timer intervals:
/// faster speed ticks relative to sensor ticks mean heavier damping.
pub fn smoothing_alpha(sensor_interval_ms: u64, speed_interval_ms: u64) -> f32 {
    (-(sensor_interval_ms as f32) / speed_interval_ms as f32).exp()
}

/// Owns the set of enabled sensors and their smoothing state.
///
/// Enablement is additive and monotonic for the process lifetime; sensors are
/// never disabled mid-run.
pub struct SensorManager {
    monitor: Arc<dyn HardwareMonitor>,
    alpha: f32,
    providers: HashMap<SensorIdentifier, MovingAverageSensorValueProvider>,
}

impl SensorManager {
    pub fn new(monitor: Arc<dyn HardwareMonitor>, alpha: f32) -> Self {
        Self {
            monitor,
            alpha,
            providers: HashMap::new(),
        }
    }

    /// Adds sensors to the enabled set. Already-enabled sensors keep their
    /// smoothing state.
    pub fn enable_sensors<I>(&mut self, sensors: I)
    where
        I: IntoIterator<Item = SensorIdentifier>,
    {
        for sensor in sensors {
            self.providers
                .entry(sensor)
                .or_insert_with(|| MovingAverageSensorValueProvider::new(self.alpha));
        }
    }

    pub fn enabled_sensors(&self) -> impl Iterator<Item = &SensorIdentifier> {
        self.providers.keys()
    }

    /// Polls every enabled sensor once and advances its filter.
    ///
    /// A failed read leaves that sensor's smoothed value untouched.
    pub async fn update(&mut self) {
        let sensors: Vec<_> = self.providers.keys().cloned().collect();
        for sensor in sensors {
            match self.monitor.read_value(&sensor).await {
                Ok(raw) => {
                    if let Some(provider) = self.providers.get_mut(&sensor) {
                        provider.update(raw);
                    }
                }
                Err(e) => {
                    log::error!("Failed to read sensor {sensor}: {e}");
                }
            }
        }
    }

    /// Publishes every smoothed value into the cache through the write view.
    pub fn accept(&self, cache: &CacheWriteView) {
        for (sensor, provider) in &self.providers {
            if !provider.value().is_nan() {
                cache.store_sensor_value(sensor.clone(), provider.value());
            }
        }
    }

    pub fn value_of(&self, sensor: &SensorIdentifier) -> f32 {
        self.providers
            .get(sensor)
            .map_or(f32::NAN, MovingAverageSensorValueProvider::value)
    }
}

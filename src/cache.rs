//! Shared device/sensor state cache with a read/write capability split.
//!
//! One process-wide store holds per-port configuration and telemetry plus
//! per-sensor configuration and smoothed values. Plugin code only ever sees
//! [`CacheReadView`]; the sensor and device managers publish through
//! [`CacheWriteView`]. Neither view can be converted into the other, so the
//! split is enforced by type, not convention.
//!
//! The sharded map gives per-entry atomicity: a reader observes an entry
//! either before or after an upsert, never a partial update. No cross-entry
//! transactions are provided.

use std::sync::Arc;

use dashmap::DashMap;

use crate::port::{PortConfig, PortData, PortIdentifier};
use crate::sensor::{SensorConfig, SensorIdentifier};

#[derive(Default)]
struct CacheInner {
    port_configs: DashMap<PortIdentifier, PortConfig>,
    port_data: DashMap<PortIdentifier, PortData>,
    sensor_configs: DashMap<SensorIdentifier, SensorConfig>,
    sensor_values: DashMap<SensorIdentifier, f32>,
}

/// The owning handle. Held by the engine only; plugin code gets views.
#[derive(Clone, Default)]
pub struct DataCache {
    inner: Arc<CacheInner>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_view(&self) -> CacheReadView {
        CacheReadView {
            inner: self.inner.clone(),
        }
    }

    pub fn write_view(&self) -> CacheWriteView {
        CacheWriteView {
            inner: self.inner.clone(),
        }
    }

    /// Drops every entry. Called once during shutdown, after the timers have
    /// stopped.
    pub fn clear(&self) {
        self.inner.port_configs.clear();
        self.inner.port_data.clear();
        self.inner.sensor_configs.clear();
        self.inner.sensor_values.clear();
    }
}

/// Observation-only facade handed to plugins.
#[derive(Clone)]
pub struct CacheReadView {
    inner: Arc<CacheInner>,
}

impl CacheReadView {
    pub fn port_config(&self, port: &PortIdentifier) -> Option<PortConfig> {
        self.inner.port_configs.get(port).map(|e| e.value().clone())
    }

    pub fn port_data(&self, port: &PortIdentifier) -> Option<PortData> {
        self.inner.port_data.get(port).map(|e| *e.value())
    }

    pub fn sensor_config(&self, sensor: &SensorIdentifier) -> Option<SensorConfig> {
        self.inner.sensor_configs.get(sensor).map(|e| *e.value())
    }

    /// Latest smoothed reading, `NaN` if the sensor has not been sampled yet.
    pub fn sensor_value(&self, sensor: &SensorIdentifier) -> f32 {
        self.inner
            .sensor_values
            .get(sensor)
            .map_or(f32::NAN, |e| *e.value())
    }
}

/// Publish-only facade for the trusted managers. Upserts plus telemetry
/// retraction, no read capability.
#[derive(Clone)]
pub struct CacheWriteView {
    inner: Arc<CacheInner>,
}

impl CacheWriteView {
    pub fn store_port_config(&self, port: PortIdentifier, config: PortConfig) {
        self.inner.port_configs.insert(port, config);
    }

    pub fn store_port_data(&self, port: PortIdentifier, data: PortData) {
        self.inner.port_data.insert(port, data);
    }

    /// Retracts a port's telemetry entry, e.g. when the port stops answering.
    pub fn remove_port_data(&self, port: &PortIdentifier) {
        self.inner.port_data.remove(port);
    }

    pub fn store_sensor_config(&self, sensor: SensorIdentifier, config: SensorConfig) {
        self.inner.sensor_configs.insert(sensor, config);
    }

    pub fn store_sensor_value(&self, sensor: SensorIdentifier, value: f32) {
        self.inner.sensor_values.insert(sensor, value);
    }
}

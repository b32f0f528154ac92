//! lm-sensors backed hardware monitor.
//!
//! Discovers every temperature input libsensors exposes and publishes them
//! under stable `lm:{chip}:{feature}` identifiers.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lm_sensors::{
    LMSensors, SubFeatureRef,
    value::{Kind as ValueKind, Value},
};
use log::info;

use crate::sensor::{HardwareMonitor, SensorIdentifier};

struct Probe {
    subf: SubFeatureRef<'static>,
}

// SAFETY: libsensors (>= 3.6) guards all sensor access with an internal global mutex.
//         The `SubFeatureRef::value()` call is read-only.
//         Therefore, moving this pointer across threads cannot cause data races.
unsafe impl Send for Probe {}
unsafe impl Sync for Probe {}

/// Initializes libsensors once for the process lifetime.
pub fn init_lm_sensors() -> Result<&'static LMSensors> {
    let sensors = lm_sensors::Initializer::default()
        .initialize()
        .context("Failed to initialize libsensors")?;
    Ok(Box::leak(Box::new(sensors)))
}

pub fn sensor_key(chip: &str, feature: &str) -> SensorIdentifier {
    SensorIdentifier::from(format!("lm:{chip}:{feature}").as_str())
}

pub struct LmHardwareMonitor {
    probes: HashMap<SensorIdentifier, Probe>,
}

impl LmHardwareMonitor {
    pub fn discover(lmsensors: &'static LMSensors) -> Result<Self> {
        let mut probes = HashMap::new();
        for chip in lmsensors.chip_iter(None) {
            let chip_name = match chip.name() {
                Ok(name) => name,
                Err(_) => continue,
            };
            for feature in chip.feature_iter() {
                let Some(Ok(feature_name)) = feature.name() else {
                    continue;
                };
                let Some(subf) = feature
                    .sub_feature_iter()
                    .find(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))
                else {
                    continue;
                };

                let key = sensor_key(&chip_name, feature_name);
                info!("Found LM sensor: {key}");
                probes.insert(key, Probe { subf });
            }
        }
        if probes.is_empty() {
            info!("No temperature inputs discovered");
        }
        Ok(Self { probes })
    }
}

#[async_trait]
impl HardwareMonitor for LmHardwareMonitor {
    fn sensors(&self) -> Vec<SensorIdentifier> {
        self.probes.keys().cloned().collect()
    }

    async fn read_value(&self, sensor: &SensorIdentifier) -> Result<f32> {
        let probe = self
            .probes
            .get(sensor)
            .ok_or_else(|| anyhow!("Unknown sensor '{sensor}'"))?;
        match probe.subf.value()? {
            Value::TemperatureInput(t) => Ok(t as f32),
            _ => Err(anyhow!("Non-temperature value from '{sensor}'")),
        }
    }
}

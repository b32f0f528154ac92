//! Daemon orchestration: timers, tick bodies, and lifecycle boundaries.
//!
//! The engine owns the cache, the device manager, and the plugin registries.
//! Three periodic timers drive it: sensor polling, speed control, and RGB
//! rendering, plus an optional diagnostics timer at debug log level. Plugin
//! failures never escape a tick; they are mapped to the documented fail-safe
//! outputs (full speed, solid alarm color).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::DataCache;
use crate::color::LedColor;
use crate::config::{Config, StateChangeType};
use crate::device_manager::DeviceManager;
use crate::led_transform;
use crate::plugin::{EffectManager, SpeedControllerManager, SpeedMap};
use crate::port::{PortConfig, PortIdentifier};
use crate::sensor::{HardwareMonitor, SensorIdentifier, SensorManager, smoothing_alpha};
use crate::timer_manager::TimerManager;

struct ProfileBinding {
    guid: Uuid,
    name: String,
    ports: Vec<PortIdentifier>,
}

struct EngineShared {
    config: Config,
    cache: DataCache,
    devices: Arc<DeviceManager>,
    sensors: Mutex<SensorManager>,
    speed_controllers: Mutex<SpeedControllerManager>,
    effects: Mutex<EffectManager>,
    profiles: Vec<ProfileBinding>,
    critical_sensors: Vec<SensorIdentifier>,
}

pub struct Engine {
    shared: Arc<EngineShared>,
    timers: TimerManager,
}

impl Engine {
    /// Builds every plugin instance from the configuration and wires up the
    /// sensor set they declare.
    pub fn new(
        config: Config,
        devices: Arc<DeviceManager>,
        monitor: Arc<dyn HardwareMonitor>,
    ) -> Result<Self> {
        let alpha = smoothing_alpha(config.timers.sensor_ms, config.timers.speed_ms);
        let mut sensors = SensorManager::new(monitor, alpha);
        let mut speed_controllers = SpeedControllerManager::new();
        let mut effects = EffectManager::new();
        let mut profiles = Vec::new();

        for profile in &config.profiles {
            for cfg in &profile.speed_controllers {
                let controller = cfg
                    .build()
                    .with_context(|| format!("Building plugins for profile '{}'", profile.name))?;
                sensors.enable_sensors(controller.used_sensors());
                speed_controllers.add(profile.guid, controller);
            }
            for cfg in &profile.effects {
                let effect = cfg
                    .build()
                    .with_context(|| format!("Building plugins for profile '{}'", profile.name))?;
                sensors.enable_sensors(effect.used_sensors());
                effects.add(profile.guid, effect);
            }
            profiles.push(ProfileBinding {
                guid: profile.guid,
                name: profile.name.clone(),
                ports: profile.ports.clone(),
            });
        }

        let critical_sensors: Vec<SensorIdentifier> = config
            .sensor_configs
            .iter()
            .filter(|s| s.config.critical_value.is_some())
            .map(|s| SensorIdentifier::from(s.sensor.as_str()))
            .collect();
        sensors.enable_sensors(critical_sensors.iter().cloned());

        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                cache: DataCache::new(),
                devices,
                sensors: Mutex::new(sensors),
                speed_controllers: Mutex::new(speed_controllers),
                effects: Mutex::new(effects),
                profiles,
                critical_sensors,
            }),
            timers: TimerManager::new(),
        })
    }

    /// Handshakes the hardware, seeds the cache, and applies the boot state.
    pub async fn initialize(&self) -> Result<()> {
        let shared = &self.shared;
        shared
            .devices
            .send_init()
            .await
            .context("Controller init handshake failed")?;

        let write = shared.cache.write_view();
        for port in shared.devices.all_ports() {
            write.store_port_config(port, PortConfig::default());
        }
        for override_cfg in &shared.config.port_configs {
            write.store_port_config(override_cfg.port, override_cfg.config.clone());
        }
        for sensor_cfg in &shared.config.sensor_configs {
            write.store_sensor_config(
                SensorIdentifier::from(sensor_cfg.sensor.as_str()),
                sensor_cfg.config,
            );
        }

        shared.apply_state_profile(StateChangeType::Boot).await;
        info!("Engine initialized");
        Ok(())
    }

    /// Starts the periodic timers. The diagnostics timer is only registered
    /// when debug logging is active.
    pub fn start(&mut self) {
        let timers = self.shared.config.timers;

        let shared = self.shared.clone();
        self.timers.register_timer(
            "sensor",
            Duration::from_millis(timers.sensor_ms),
            move || {
                let shared = shared.clone();
                async move { shared.sensor_tick().await }
            },
        );

        let shared = self.shared.clone();
        self.timers.register_timer(
            "speed",
            Duration::from_millis(timers.speed_ms),
            move || {
                let shared = shared.clone();
                async move { shared.speed_tick().await }
            },
        );

        let shared = self.shared.clone();
        self.timers
            .register_timer("rgb", Duration::from_millis(timers.rgb_ms), move || {
                let shared = shared.clone();
                async move { shared.rgb_tick().await }
            });

        if log::log_enabled!(log::Level::Debug) {
            let shared = self.shared.clone();
            self.timers.register_timer(
                "diagnostics",
                Duration::from_millis(timers.diagnostics_ms),
                move || {
                    let shared = shared.clone();
                    async move { shared.diagnostics_tick().await }
                },
            );
        }
    }

    /// Stops the timers, applies the shutdown state, and drops cached state.
    ///
    /// Timer shutdown completes before the shutdown profile is written, so no
    /// tick can interleave with the final hardware state.
    pub async fn dispose(&mut self) -> Result<()> {
        let shutdown = self.timers.shutdown_all().await;
        self.shared
            .apply_state_profile(StateChangeType::Shutdown)
            .await;
        self.shared.cache.clear();
        info!("Engine disposed");
        shutdown
    }
}

impl EngineShared {
    async fn sensor_tick(&self) -> Result<()> {
        let mut sensors = self.sensors.lock().await;
        sensors.update().await;
        sensors.accept(&self.cache.write_view());
        Ok(())
    }

    /// True once any configured critical sensor exceeds its threshold.
    fn critical_reached(&self) -> bool {
        let read = self.cache.read_view();
        self.critical_sensors.iter().any(|sensor| {
            let value = read.sensor_value(sensor);
            !value.is_nan()
                && read
                    .sensor_config(sensor)
                    .and_then(|c| c.critical_value)
                    .is_some_and(|threshold| value > threshold)
        })
    }

    async fn refresh_port_data(&self) {
        let write = self.cache.write_view();
        for controller in self.devices.controllers() {
            for port in controller.ports() {
                match controller.port_data(port.port_id).await {
                    Ok(Some(data)) => write.store_port_data(port, data),
                    // A port that stopped answering must not keep serving its
                    // last reading.
                    Ok(None) => write.remove_port_data(&port),
                    Err(e) => error!("Failed to read telemetry for port {port}: {e:#}"),
                }
            }
        }
    }

    async fn speed_tick(&self) -> Result<()> {
        {
            let _guard = self.devices.lock().await;
            self.refresh_port_data().await;
        }

        let critical = self.critical_reached();
        if critical {
            error!("Critical sensor threshold reached, forcing full speed");
        }

        let read = self.cache.read_view();
        let mut speed_controllers = self.speed_controllers.lock().await;
        for profile in &self.profiles {
            let map: Option<SpeedMap> = if critical {
                Some(profile.ports.iter().map(|p| (*p, 100)).collect())
            } else {
                match speed_controllers.first_enabled(&profile.guid, &read) {
                    None => None,
                    Some(controller) => match controller.generate_speeds(&profile.ports, &read) {
                        Ok(map) => map,
                        Err(e) => {
                            error!(
                                "Speed controller '{}' failed in profile '{}': {e:#}",
                                controller.name(),
                                profile.name
                            );
                            // Fail-safe: the whole profile goes to full speed.
                            Some(profile.ports.iter().map(|p| (*p, 100)).collect())
                        }
                    },
                }
            };
            let Some(map) = map else { continue };

            // The writes for one profile form one command group; generation
            // above runs without the hardware lock so a stalled plugin cannot
            // block the other timers.
            let _guard = self.devices.lock().await;
            for port in &profile.ports {
                let Some(percent) = map.get(port) else {
                    continue;
                };
                let Some(controller) = self.devices.controller_for(port) else {
                    continue;
                };
                if let Err(e) = controller.set_speed(port.port_id, *percent).await {
                    // Dropped, not retried; the next tick regenerates.
                    error!("Failed to set speed on port {port}: {e:#}");
                }
            }
        }
        Ok(())
    }

    async fn rgb_tick(&self) -> Result<()> {
        let read = self.cache.read_view();
        let mut effects = self.effects.lock().await;

        for profile in &self.profiles {
            let Some(effect) = effects.first_enabled(&profile.guid, &read) else {
                continue;
            };
            let (effect_type, map) = match effect.generate_colors(&profile.ports, &read) {
                Ok(Some(map)) => (effect.effect_type(), map),
                Ok(None) => continue,
                Err(e) => {
                    error!(
                        "Effect '{}' failed in profile '{}': {e:#}",
                        effect.name(),
                        profile.name
                    );
                    // Fail-safe: solid alarm color in the universal mode.
                    (
                        "Full",
                        profile
                            .ports
                            .iter()
                            .map(|p| (*p, vec![LedColor::alarm()]))
                            .collect(),
                    )
                }
            };

            // Run the transform pipeline before touching the hardware so the
            // device lock covers only this profile's write group.
            let mut writes = Vec::with_capacity(profile.ports.len());
            for port in &profile.ports {
                let Some(colors) = map.get(port) else {
                    continue;
                };
                let Some(port_config) = read.port_config(port) else {
                    continue;
                };
                writes.push((*port, led_transform::apply(colors.clone(), &port_config)));
            }

            let _guard = self.devices.lock().await;
            for (port, colors) in writes {
                let Some(controller) = self.devices.controller_for(&port) else {
                    continue;
                };
                let Some(effect_byte) = controller.effect_byte(effect_type) else {
                    debug!(
                        "Controller {} does not support effect '{effect_type}'",
                        port.controller_id
                    );
                    continue;
                };
                if let Err(e) = controller.set_rgb(port.port_id, effect_byte, &colors).await {
                    error!("Failed to set colors on port {port}: {e:#}");
                }
            }
        }
        Ok(())
    }

    async fn diagnostics_tick(&self) -> Result<()> {
        let read = self.cache.read_view();
        for port in self.devices.all_ports() {
            if let Some(data) = read.port_data(&port) {
                debug!("Port {port}: {data}");
            }
        }
        let sensors = self.sensors.lock().await;
        for sensor in sensors.enabled_sensors() {
            debug!("Sensor {sensor}: {:.1}", sensors.value_of(sensor));
        }
        Ok(())
    }

    /// Applies every state profile bound to the given boundary, then persists
    /// hardware state once per controller that was touched.
    ///
    /// Best-effort: individual port failures are logged and skipped so a dead
    /// port cannot block the boundary transition.
    async fn apply_state_profile(&self, state: StateChangeType) {
        let state_profiles: Vec<_> = self.config.state_profiles(state).cloned().collect();
        if state_profiles.is_empty() {
            return;
        }
        info!("Applying {state:?} state profiles");

        let _guard = self.devices.lock().await;
        let mut dirty_controllers: HashSet<u8> = HashSet::new();

        for state_profile in &state_profiles {
            for port in &state_profile.ports {
                let Some(controller) = self.devices.controller_for(port) else {
                    continue;
                };
                if let Some(speed) = state_profile.speed {
                    match controller.set_speed(port.port_id, speed).await {
                        Ok(()) => {
                            dirty_controllers.insert(controller.controller_id());
                        }
                        Err(e) => error!("State profile speed failed on port {port}: {e:#}"),
                    }
                }
                if let Some(effect_type) = &state_profile.effect_type {
                    let Some(effect_byte) = controller.effect_byte(effect_type) else {
                        continue;
                    };
                    match controller
                        .set_rgb(port.port_id, effect_byte, &state_profile.effect_colors)
                        .await
                    {
                        Ok(()) => {
                            dirty_controllers.insert(controller.controller_id());
                        }
                        Err(e) => error!("State profile colors failed on port {port}: {e:#}"),
                    }
                }
            }
        }

        for controller in self.devices.controllers() {
            if dirty_controllers.contains(&controller.controller_id()) {
                if let Err(e) = controller.save_profile().await {
                    error!(
                        "Failed to persist profile on controller {}: {e:#}",
                        controller.controller_id()
                    );
                }
            }
        }
    }
}

//! Plugin contracts and per-profile registries.
//!
//! Each profile carries an ordered list of speed-controller and effect
//! instances. On every tick the first enabled plugin in the list wins; the
//! rest are not evaluated. Generation returns an explicit `Result` so the
//! engine can pattern-match failures into the documented fail-safe outputs
//! instead of unwinding.

use std::collections::HashMap;

use anyhow::Result;
use uuid::Uuid;

use crate::cache::CacheReadView;
use crate::color::LedColor;
use crate::port::PortIdentifier;
use crate::sensor::SensorIdentifier;

/// Per-port speed map produced by a speed controller.
///
/// `Ok(None)` means "no update this tick". A missing port in an otherwise
/// valid map is skipped for that port only.
pub type SpeedMap = HashMap<PortIdentifier, u8>;

/// Per-port color buffers produced by an effect.
pub type ColorMap = HashMap<PortIdentifier, Vec<LedColor>>;

/// Speed control plugin: observes the cache, emits per-port percentages.
pub trait SpeedController: Send + Sync {
    /// Stable tag naming the plugin kind, for logging.
    fn name(&self) -> &'static str;

    fn is_enabled(&self, cache: &CacheReadView) -> bool;

    /// Sensors this plugin reads; the engine enables them at startup.
    fn used_sensors(&self) -> Vec<SensorIdentifier> {
        Vec::new()
    }

    fn generate_speeds(
        &mut self,
        ports: &[PortIdentifier],
        cache: &CacheReadView,
    ) -> Result<Option<SpeedMap>>;
}

/// Color effect plugin: observes the cache and its own phase state, emits
/// per-port raw LED buffers in the effect author's coordinate space.
pub trait Effect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Category tag resolved to the controller's effect byte at write time.
    fn effect_type(&self) -> &'static str;

    fn is_enabled(&self, cache: &CacheReadView) -> bool;

    fn used_sensors(&self) -> Vec<SensorIdentifier> {
        Vec::new()
    }

    fn generate_colors(
        &mut self,
        ports: &[PortIdentifier],
        cache: &CacheReadView,
    ) -> Result<Option<ColorMap>>;
}

/// Ordered speed-controller lists keyed by profile GUID.
#[derive(Default)]
pub struct SpeedControllerManager {
    controllers: HashMap<Uuid, Vec<Box<dyn SpeedController>>>,
}

impl SpeedControllerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, profile: Uuid, controller: Box<dyn SpeedController>) {
        self.controllers.entry(profile).or_default().push(controller);
    }

    /// First enabled controller in the profile's list, or `None` (skip tick).
    ///
    /// Plugins after the first enabled one are not probed.
    pub fn first_enabled(
        &mut self,
        profile: &Uuid,
        cache: &CacheReadView,
    ) -> Option<&mut Box<dyn SpeedController>> {
        let list = self.controllers.get_mut(profile)?;
        let idx = list.iter().position(|c| c.is_enabled(cache))?;
        list.get_mut(idx)
    }

    pub fn used_sensors(&self, profile: &Uuid) -> Vec<SensorIdentifier> {
        self.controllers
            .get(profile)
            .map(|list| list.iter().flat_map(|c| c.used_sensors()).collect())
            .unwrap_or_default()
    }
}

/// Ordered effect lists keyed by profile GUID.
#[derive(Default)]
pub struct EffectManager {
    effects: HashMap<Uuid, Vec<Box<dyn Effect>>>,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, profile: Uuid, effect: Box<dyn Effect>) {
        self.effects.entry(profile).or_default().push(effect);
    }

    pub fn first_enabled(
        &mut self,
        profile: &Uuid,
        cache: &CacheReadView,
    ) -> Option<&mut Box<dyn Effect>> {
        let list = self.effects.get_mut(profile)?;
        let idx = list.iter().position(|e| e.is_enabled(cache))?;
        list.get_mut(idx)
    }

    pub fn used_sensors(&self, profile: &Uuid) -> Vec<SensorIdentifier> {
        self.effects
            .get(profile)
            .map(|list| list.iter().flat_map(|e| e.used_sensors()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DataCache;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct StubController {
        enabled: bool,
        enabled_probes: Arc<AtomicU32>,
        generate_calls: Arc<AtomicU32>,
    }

    impl StubController {
        fn new(enabled: bool) -> (Self, Arc<AtomicU32>, Arc<AtomicU32>) {
            let probes = Arc::new(AtomicU32::new(0));
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    enabled,
                    enabled_probes: probes.clone(),
                    generate_calls: calls.clone(),
                },
                probes,
                calls,
            )
        }
    }

    impl SpeedController for StubController {
        fn name(&self) -> &'static str {
            "Stub"
        }

        fn is_enabled(&self, _cache: &CacheReadView) -> bool {
            self.enabled_probes.fetch_add(1, Ordering::SeqCst);
            self.enabled
        }

        fn generate_speeds(
            &mut self,
            ports: &[PortIdentifier],
            _cache: &CacheReadView,
        ) -> Result<Option<SpeedMap>> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ports.iter().map(|p| (*p, 50)).collect()))
        }
    }

    #[test]
    fn first_enabled_wins_and_later_plugins_not_generated() {
        let profile = Uuid::new_v4();
        let cache = DataCache::new();
        let mut manager = SpeedControllerManager::new();

        let (a, a_probes, a_calls) = StubController::new(false);
        let (b, _b_probes, b_calls) = StubController::new(true);
        let (c, _c_probes, c_calls) = StubController::new(true);
        manager.add(profile, Box::new(a));
        manager.add(profile, Box::new(b));
        manager.add(profile, Box::new(c));

        let ports = [PortIdentifier::new(1, 1)];
        let selected = manager.first_enabled(&profile, &cache.read_view()).unwrap();
        let _ = selected.generate_speeds(&ports, &cache.read_view()).unwrap();

        assert_eq!(a_probes.load(Ordering::SeqCst), 1);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        // C must never be asked to generate
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_enabled_plugin_skips_profile() {
        let profile = Uuid::new_v4();
        let cache = DataCache::new();
        let mut manager = SpeedControllerManager::new();
        let (a, ..) = StubController::new(false);
        manager.add(profile, Box::new(a));

        assert!(manager.first_enabled(&profile, &cache.read_view()).is_none());
    }

    #[test]
    fn unknown_profile_has_no_selection() {
        let cache = DataCache::new();
        let mut manager = SpeedControllerManager::new();
        assert!(
            manager
                .first_enabled(&Uuid::new_v4(), &cache.read_view())
                .is_none()
        );
    }

    #[test]
    fn used_sensors_aggregates_over_list() {
        struct SensorfulController(Vec<SensorIdentifier>);
        impl SpeedController for SensorfulController {
            fn name(&self) -> &'static str {
                "Sensorful"
            }
            fn is_enabled(&self, _cache: &CacheReadView) -> bool {
                true
            }
            fn used_sensors(&self) -> Vec<SensorIdentifier> {
                self.0.clone()
            }
            fn generate_speeds(
                &mut self,
                _ports: &[PortIdentifier],
                _cache: &CacheReadView,
            ) -> Result<Option<SpeedMap>> {
                Ok(None)
            }
        }

        let profile = Uuid::new_v4();
        let mut manager = SpeedControllerManager::new();
        manager.add(profile, Box::new(SensorfulController(vec!["a".into()])));
        manager.add(profile, Box::new(SensorfulController(vec!["b".into()])));

        let sensors = manager.used_sensors(&profile);
        assert_eq!(sensors.len(), 2);
    }
}

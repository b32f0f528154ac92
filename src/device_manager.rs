//! Controller ownership and the exclusive hardware-access boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::info;

use crate::color::LedColor;
use crate::port::{PortData, PortIdentifier};

/// Hardware command surface of one addressable controller.
///
/// Implementations encode the device's wire protocol on top of the bus
/// transport; callers never see raw bytes.
#[async_trait]
pub trait ControllerProxy: Send + Sync + core::fmt::Debug {
    /// Discovery index used inside [`PortIdentifier`]s.
    fn controller_id(&self) -> u8;

    /// All ports this controller owns.
    fn ports(&self) -> Vec<PortIdentifier>;

    /// One-time hardware handshake.
    async fn send_init(&self) -> Result<()>;

    /// Sets fan speed on a port, percent in `0..=100`.
    async fn set_speed(&self, port_id: u8, percent: u8) -> Result<()>;

    /// Pushes a color buffer with the given hardware effect mode.
    async fn set_rgb(&self, port_id: u8, effect_byte: u8, colors: &[LedColor]) -> Result<()>;

    /// Resolves a named effect type to this controller's effect byte, `None`
    /// if the mode is unsupported.
    fn effect_byte(&self, effect_type: &str) -> Option<u8>;

    /// Latest telemetry for a port, `None` if the port reports nothing.
    async fn port_data(&self, port_id: u8) -> Result<Option<PortData>>;

    /// Persists the current hardware state into the device's own non-volatile
    /// memory.
    async fn save_profile(&self) -> Result<()>;
}

/// Owns every discovered controller and serializes access to them.
///
/// This is the sole writer to the hardware transport. Any read-decide-write
/// sequence spanning controller calls must run inside [`DeviceManager::lock`]
/// so that interleaved timers cannot leave a half-applied command sequence on
/// the wire.
pub struct DeviceManager {
    controllers: Vec<Arc<dyn ControllerProxy>>,
    exclusive: tokio::sync::Mutex<()>,
}

impl DeviceManager {
    pub fn new(controllers: Vec<Arc<dyn ControllerProxy>>) -> Self {
        info!("Device manager owns {} controller(s)", controllers.len());
        Self {
            controllers,
            exclusive: tokio::sync::Mutex::new(()),
        }
    }

    /// Acquires the exclusive critical section for a multi-step command group.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.exclusive.lock().await
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Arc<dyn ControllerProxy>> {
        self.controllers.iter()
    }

    /// Every port across all controllers.
    pub fn all_ports(&self) -> Vec<PortIdentifier> {
        self.controllers.iter().flat_map(|c| c.ports()).collect()
    }

    /// Resolves a port to its owning controller.
    ///
    /// `None` means "skip, not fatal": the port belongs to hardware that is
    /// not present this run.
    pub fn controller_for(&self, port: &PortIdentifier) -> Option<&Arc<dyn ControllerProxy>> {
        self.controllers
            .iter()
            .find(|c| c.controller_id() == port.controller_id && c.ports().contains(port))
    }

    /// Runs the init handshake on every controller, failing on the first
    /// error.
    pub async fn send_init(&self) -> Result<()> {
        for controller in &self.controllers {
            controller.send_init().await?;
        }
        Ok(())
    }
}

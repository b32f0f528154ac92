//! # rgb_fand
//!
//! A Linux daemon driving fan speeds and addressable RGB lighting on
//! HID-attached fan controllers.
//!
//! ## Features
//!
//! - **Async Architecture**: independent periodic timers on Tokio
//! - **Temperature Monitoring**: lm-sensors readings smoothed with a moving
//!   average
//! - **Profiles**: port groups bound to ordered speed-controller and effect
//!   plugin chains, first enabled plugin wins
//! - **Fail-Safe**: plugin failures drive fans to full speed and LEDs to a
//!   solid alarm color instead of crashing the daemon
//! - **Boundary States**: configurable hardware states applied at boot and
//!   shutdown, persisted to controller memory
//!
//! ## Architecture
//!
//! - [`Engine`](engine::Engine) — lifecycle manager owning the timers
//! - [`DataCache`](cache::DataCache) — shared state with a read/write
//!   capability split
//! - [`DeviceManager`](device_manager::DeviceManager) — controller ownership
//!   and the exclusive hardware critical section
//! - [`ControllerProxy`](device_manager::ControllerProxy) /
//!   [`BusTransport`](transport::BusTransport) — protocol and byte seams
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rgb_fand::{config::ConfigManager, device_manager::DeviceManager, engine::Engine};
//! use rgb_fand::drivers::riing::RiingController;
//! use rgb_fand::monitors::{LmHardwareMonitor, init_lm_sensors};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigManager::load(None).await?.clone_config().await;
//!     let api = hidapi::HidApi::new()?;
//!     let devices = Arc::new(DeviceManager::new(RiingController::probe(&api)));
//!     let monitor = Arc::new(LmHardwareMonitor::discover(init_lm_sensors()?)?);
//!
//!     let mut engine = Engine::new(config, devices, monitor)?;
//!     engine.initialize().await?;
//!     engine.start();
//!     tokio::signal::ctrl_c().await?;
//!     engine.dispose().await
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod color;
pub mod config;
pub mod device_manager;
pub mod drivers;
pub mod effects;
pub mod engine;
pub mod led_transform;
pub mod monitors;
pub mod plugin;
pub mod port;
pub mod sensor;
pub mod speed;
pub mod timer_manager;
pub mod transport;

//! Riing-family controller driver.
//!
//! Encodes the vendor protocol spoken by Riing fan hubs: every command is a
//! report-ID-prefixed packet, speeds are a single percent byte, colors travel
//! as GRB triplets behind a hardware effect mode byte.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hidapi::HidApi;
use log::{debug, info};

use crate::color::LedColor;
use crate::device_manager::ControllerProxy;
use crate::port::{PortData, PortIdentifier};
use crate::transport::{BusTransport, HidTransport};

pub const VID: u16 = 0x264A; // Thermaltake
pub const PORTS_PER_CONTROLLER: u8 = 5;
pub const INIT_PACKET: [u8; 3] = [0x00, 0xFE, 0x33];

fn speed_packet(port_id: u8, percent: u8) -> [u8; 6] {
    [0x00, 0x32, 0x51, port_id, 0x01, percent]
}

fn rgb_packet(port_id: u8, effect_byte: u8, colors: &[LedColor]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(5 + colors.len() * 3);
    packet.extend_from_slice(&[0x00, 0x32, 0x52, port_id, effect_byte]);
    for color in colors {
        // Wire order is GRB on this family.
        packet.extend_from_slice(&[color.g, color.r, color.b]);
    }
    packet
}

fn port_data_packet(port_id: u8) -> [u8; 4] {
    [0x00, 0x33, 0x51, port_id]
}

const SAVE_PROFILE_PACKET: [u8; 4] = [0x00, 0x32, 0x53, 0x01];

#[derive(Debug)]
pub struct RiingController {
    controller_id: u8,
    transport: Arc<dyn BusTransport>,
}

impl RiingController {
    pub fn new(controller_id: u8, transport: Arc<dyn BusTransport>) -> Self {
        Self {
            controller_id,
            transport,
        }
    }

    /// Opens every Riing hub on the bus, assigning controller ids in
    /// enumeration order starting at 1.
    pub fn probe(api: &HidApi) -> Vec<Arc<dyn ControllerProxy>> {
        HidTransport::probe(api, VID)
            .into_iter()
            .enumerate()
            .map(|(idx, transport)| {
                let id = (idx + 1) as u8;
                info!("Riing controller {id} attached");
                Arc::new(RiingController::new(id, Arc::new(transport))) as Arc<dyn ControllerProxy>
            })
            .collect()
    }

    async fn blocking_write(&self, packet: Vec<u8>) -> Result<()> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.write(&packet))
            .await
            .context("transport task panicked")?
    }
}

#[async_trait]
impl ControllerProxy for RiingController {
    fn controller_id(&self) -> u8 {
        self.controller_id
    }

    fn ports(&self) -> Vec<PortIdentifier> {
        (1..=PORTS_PER_CONTROLLER)
            .map(|p| PortIdentifier::new(self.controller_id, p))
            .collect()
    }

    async fn send_init(&self) -> Result<()> {
        info!("Initializing Riing controller {}", self.controller_id);
        self.blocking_write(INIT_PACKET.to_vec()).await
    }

    async fn set_speed(&self, port_id: u8, percent: u8) -> Result<()> {
        debug!(
            "Controller {} port {port_id}: speed {percent}%",
            self.controller_id
        );
        self.blocking_write(speed_packet(port_id, percent.min(100)).to_vec())
            .await
    }

    async fn set_rgb(&self, port_id: u8, effect_byte: u8, colors: &[LedColor]) -> Result<()> {
        self.blocking_write(rgb_packet(port_id, effect_byte, colors))
            .await
    }

    fn effect_byte(&self, effect_type: &str) -> Option<u8> {
        match effect_type {
            "Flow" => Some(0x00),
            "Spectrum" => Some(0x04),
            "Ripple" => Some(0x08),
            "Blink" => Some(0x0C),
            "Pulse" => Some(0x10),
            "Wave" => Some(0x14),
            "PerLed" => Some(0x18),
            "Full" => Some(0x19),
            _ => None,
        }
    }

    async fn port_data(&self, port_id: u8) -> Result<Option<PortData>> {
        let transport = self.transport.clone();
        let response = tokio::task::spawn_blocking(move || {
            transport.write_read(&port_data_packet(port_id))
        })
        .await
        .context("transport task panicked")??;

        if response.len() < 0x07 {
            return Ok(None);
        }
        Ok(Some(PortData {
            speed_percent: response[0x04],
            rpm: (u32::from(response[0x05]) << 8) | u32::from(response[0x06]),
        }))
    }

    async fn save_profile(&self) -> Result<()> {
        info!(
            "Persisting hardware profile on controller {}",
            self.controller_id
        );
        self.blocking_write(SAVE_PROFILE_PACKET.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::LoopbackTransport;
    use pretty_assertions::assert_eq;

    fn controller(transport: Arc<LoopbackTransport>) -> RiingController {
        RiingController::new(1, transport)
    }

    #[tokio::test]
    async fn init_sends_handshake_packet() {
        let transport = Arc::new(LoopbackTransport::default());
        controller(transport.clone()).send_init().await.unwrap();
        assert_eq!(transport.written(), vec![vec![0x00, 0xFE, 0x33]]);
    }

    #[tokio::test]
    async fn speed_packet_frames_port_and_percent() {
        let transport = Arc::new(LoopbackTransport::default());
        controller(transport.clone()).set_speed(3, 75).await.unwrap();
        assert_eq!(
            transport.written(),
            vec![vec![0x00, 0x32, 0x51, 0x03, 0x01, 75]]
        );
    }

    #[tokio::test]
    async fn speed_is_clamped_to_full() {
        let transport = Arc::new(LoopbackTransport::default());
        controller(transport.clone())
            .set_speed(1, 250)
            .await
            .unwrap();
        assert_eq!(transport.written()[0][5], 100);
    }

    #[tokio::test]
    async fn rgb_packet_carries_grb_triplets() {
        let transport = Arc::new(LoopbackTransport::default());
        let colors = [LedColor::new(1, 2, 3), LedColor::new(255, 0, 128)];
        controller(transport.clone())
            .set_rgb(2, 0x18, &colors)
            .await
            .unwrap();
        assert_eq!(
            transport.written(),
            vec![vec![0x00, 0x32, 0x52, 0x02, 0x18, 2, 1, 3, 0, 255, 128]]
        );
    }

    #[tokio::test]
    async fn port_data_parses_speed_and_rpm() {
        let mut response = vec![0u8; 8];
        response[0x04] = 42;
        response[0x05] = 0x02;
        response[0x06] = 0x58;
        let transport = Arc::new(LoopbackTransport::with_responses(vec![response]));

        let data = controller(transport.clone())
            .port_data(4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.speed_percent, 42);
        assert_eq!(data.rpm, 600);
        assert_eq!(transport.written(), vec![vec![0x00, 0x33, 0x51, 0x04]]);
    }

    #[tokio::test]
    async fn truncated_report_yields_no_data() {
        let transport = Arc::new(LoopbackTransport::with_responses(vec![vec![0u8; 3]]));
        assert!(
            controller(transport)
                .port_data(1)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let transport = Arc::new(LoopbackTransport::default());
        transport
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(controller(transport).set_speed(1, 50).await.is_err());
    }

    #[test]
    fn effect_modes_cover_software_rendering() {
        let transport = Arc::new(LoopbackTransport::default());
        let ctl = controller(transport);
        assert_eq!(ctl.effect_byte("Full"), Some(0x19));
        assert_eq!(ctl.effect_byte("PerLed"), Some(0x18));
        assert_eq!(ctl.effect_byte("Disco"), None);
    }

    #[test]
    fn controller_owns_five_ports() {
        let transport = Arc::new(LoopbackTransport::default());
        let ports = controller(transport).ports();
        assert_eq!(ports.len(), 5);
        assert_eq!(ports[0], PortIdentifier::new(1, 1));
        assert_eq!(ports[4], PortIdentifier::new(1, 5));
    }
}

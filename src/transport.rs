//! Byte-level bus abstraction under the controller drivers.
//!
//! Drivers speak framed packets; the transport only moves bytes. Keeping the
//! seam here lets driver tests run against an in-memory transport while the
//! real daemon talks HID.

use std::fmt::Debug;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use hidapi::{HidApi, HidDevice};
use log::debug;

pub const READ_TIMEOUT_MS: i32 = 250;
const REPORT_LEN: usize = 193;

pub trait BusTransport: Send + Sync + Debug {
    /// Writes one framed packet.
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Writes one framed packet and reads the device's response report.
    fn write_read(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// HID-backed transport. `HidDevice` handles are not `Sync`, so the handle
/// lives behind a mutex and callers go through `spawn_blocking`.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    product: String,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        let product = device
            .get_product_string()
            .ok()
            .flatten()
            .unwrap_or_else(|| String::from("unknown"));
        Self {
            device: Mutex::new(device),
            product,
        }
    }

    /// Opens every device on the bus matching `vendor_id`.
    pub fn probe(api: &HidApi, vendor_id: u16) -> Vec<HidTransport> {
        api.device_list()
            .filter(|d| d.vendor_id() == vendor_id)
            .inspect(|d| {
                debug!(
                    "{:?} device PID={:04X}",
                    d.product_string(),
                    d.product_id()
                )
            })
            .filter_map(|d| api.open(d.vendor_id(), d.product_id()).ok())
            .map(HidTransport::new)
            .collect()
    }
}

impl Debug for HidTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidTransport")
            .field("product", &self.product)
            .finish_non_exhaustive()
    }
}

impl BusTransport for HidTransport {
    fn write(&self, data: &[u8]) -> Result<()> {
        let device = self
            .device
            .lock()
            .map_err(|_| anyhow!("HID device mutex poisoned"))?;
        device
            .write(data)
            .map(|_| ())
            .with_context(|| format!("HID write to '{}' failed", self.product))
    }

    fn write_read(&self, data: &[u8]) -> Result<Vec<u8>> {
        let device = self
            .device
            .lock()
            .map_err(|_| anyhow!("HID device mutex poisoned"))?;
        device
            .write(data)
            .with_context(|| format!("HID write to '{}' failed", self.product))?;

        let mut buf = [0u8; REPORT_LEN];
        let n = device
            .read_timeout(&mut buf, READ_TIMEOUT_MS)
            .with_context(|| format!("HID read from '{}' failed", self.product))?;
        Ok(buf[..n].to_vec())
    }
}

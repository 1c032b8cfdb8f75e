use crate::config::SensorParams;
use crate::hid::{HidApiBackend, HidBackend, HidDeviceEntry};
use crate::protocol::VENDOR_ID;
use crate::types::{DeviceRecord, FirmwareVersion};
use crate::{Result, SensorError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Discovered sensor hubs, keyed by serial number.
///
/// The set is rebuilt from scratch on every successful [`enumerate`] call.
/// A failed call leaves the previous set in place.
///
/// [`enumerate`]: DeviceRegistry::enumerate
pub struct DeviceRegistry {
    backend: Arc<dyn HidBackend>,
    verbose: bool,
    devices: BTreeMap<u32, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new(backend: Arc<dyn HidBackend>, params: &SensorParams) -> Self {
        Self {
            backend,
            verbose: params.verbose,
            devices: BTreeMap::new(),
        }
    }

    /// Registry over the system HID stack.
    pub fn with_hidapi(params: &SensorParams) -> Self {
        Self::new(Arc::new(HidApiBackend), params)
    }

    /// Rescan the bus and replace the registry contents.
    ///
    /// Fails with [`SensorError::SerialFormat`] if any device reports a
    /// serial number that is not an integer.
    pub fn enumerate(&mut self) -> Result<usize> {
        let entries = self.backend.enumerate(VENDOR_ID)?;

        let mut devices = BTreeMap::new();
        for entry in &entries {
            let record = parse_record(entry)?;
            if self.verbose {
                log_device(entry, &record);
            }
            devices.insert(record.serial, record);
        }

        log::debug!("Enumerated {} sensor hub(s)", devices.len());
        self.devices = devices;
        Ok(self.devices.len())
    }

    /// Serial numbers of all known devices, ascending.
    ///
    /// Enumerates once if the registry is still empty.
    pub fn list_serials(&mut self) -> Result<Vec<u32>> {
        if self.devices.is_empty() {
            self.enumerate()?;
        }
        Ok(self.devices.keys().copied().collect())
    }

    pub fn record(&self, serial: u32) -> Option<&DeviceRecord> {
        self.devices.get(&serial)
    }

    pub fn product_id(&self, serial: u32) -> Option<u16> {
        self.record(serial).map(|r| r.product_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    /// Lowest known serial number.
    pub fn first_serial(&self) -> Option<u32> {
        self.devices.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn HidBackend> {
        &self.backend
    }
}

fn parse_record(entry: &HidDeviceEntry) -> Result<DeviceRecord> {
    let raw = entry.serial_number.as_deref().unwrap_or("");
    let serial = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| SensorError::SerialFormat {
            serial: raw.to_string(),
            path: entry.path.clone(),
        })?;

    Ok(DeviceRecord {
        serial,
        product_id: entry.product_id,
        release: FirmwareVersion::from_release(entry.release_number),
    })
}

fn log_device(entry: &HidDeviceEntry, record: &DeviceRecord) {
    log::info!(
        "Device found: VID={:04x} PID={:04x} model={:?} path={} serial={} manufacturer={} product={} release={}",
        entry.vendor_id,
        entry.product_id,
        record.model(),
        entry.path,
        record.serial,
        entry.manufacturer.as_deref().unwrap_or("?"),
        entry.product.as_deref().unwrap_or("?"),
        record.release,
    );
}

/// List all connected sensor hubs using the system HID stack.
pub fn list_devices() -> Result<Vec<DeviceRecord>> {
    let mut registry = DeviceRegistry::with_hidapi(&SensorParams::from_env());
    registry.enumerate()?;
    Ok(registry.records().copied().collect())
}

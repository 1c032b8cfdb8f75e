use crate::protocol::{self, REPORT_SIZE};
use crate::{Result, SensorError};
use hidapi::{HidApi, HidDevice, HidResult};

/// One HID device as reported by the enumeration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidDeviceEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    /// USB `bcdDevice`, carries the firmware version.
    pub release_number: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: String,
}

impl From<&hidapi::DeviceInfo> for HidDeviceEntry {
    fn from(d: &hidapi::DeviceInfo) -> Self {
        Self {
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
            serial_number: d.serial_number().map(str::to_string),
            release_number: d.release_number(),
            manufacturer: d.manufacturer_string().map(str::to_string),
            product: d.product_string().map(str::to_string),
            path: d.path().to_string_lossy().into_owned(),
        }
    }
}

/// An open HID handle: blocking input reads plus feature reports.
pub trait HidLink: Send {
    /// Read one input report. Returns 0 on timeout.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize>;

    /// Send a feature report; `data[0]` is the report ID.
    fn send_feature_report(&self, data: &[u8]) -> HidResult<()>;

    /// Fetch a feature report; `buf[0]` must hold the report ID on entry.
    fn get_feature_report(&self, buf: &mut [u8]) -> HidResult<usize>;
}

/// Device discovery and opening.
pub trait HidBackend: Send + Sync {
    /// List every HID device with the given vendor id.
    fn enumerate(&self, vendor_id: u16) -> Result<Vec<HidDeviceEntry>>;

    /// Open the device matching vendor id, product id and serial string.
    fn open(&self, vendor_id: u16, product_id: u16, serial: &str) -> HidResult<Box<dyn HidLink>>;
}

impl HidLink for HidDevice {
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize> {
        HidDevice::read_timeout(self, buf, timeout_ms)
    }

    fn send_feature_report(&self, data: &[u8]) -> HidResult<()> {
        HidDevice::send_feature_report(self, data)
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> HidResult<usize> {
        HidDevice::get_feature_report(self, buf)
    }
}

fn create_hid_api() -> HidResult<HidApi> {
    let api = HidApi::new()?;
    #[cfg(target_os = "macos")]
    {
        // The session must be the only reader of the sensor stream.
        api.set_open_exclusive(true);
    }
    Ok(api)
}

/// Production backend over hidapi.
///
/// A fresh `HidApi` context is created per call so the device list is always
/// current.
#[derive(Debug, Default, Clone, Copy)]
pub struct HidApiBackend;

impl HidBackend for HidApiBackend {
    fn enumerate(&self, vendor_id: u16) -> Result<Vec<HidDeviceEntry>> {
        let api = create_hid_api().map_err(|e| SensorError::TransportInit(e.to_string()))?;
        let devices = api
            .device_list()
            .filter(|d| d.vendor_id() == vendor_id)
            .map(HidDeviceEntry::from)
            .collect();
        Ok(devices)
    }

    fn open(&self, vendor_id: u16, product_id: u16, serial: &str) -> HidResult<Box<dyn HidLink>> {
        let api = create_hid_api()?;
        let device = api.open_serial(vendor_id, product_id, serial)?;
        Ok(Box::new(device))
    }
}

/// Sensor hub command layer on top of an open HID link.
pub struct HidTransport {
    link: Box<dyn HidLink>,
}

impl HidTransport {
    pub fn new(link: Box<dyn HidLink>) -> Self {
        Self { link }
    }

    /// Read one input report into `buf`. Returns 0 on timeout.
    pub fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize> {
        self.link.read_timeout(buf, timeout_ms)
    }

    /// Turn the sensor data stream on or off.
    pub fn set_stream_enabled(&self, enable: bool) -> Result<()> {
        self.link
            .send_feature_report(&protocol::build_stream_cmd(enable))
            .map_err(|e| {
                SensorError::Command(format!(
                    "Unable to set a feature report [SensStreamStatus] - {}",
                    e
                ))
            })
    }

    /// Read back the stream status feature report.
    pub fn is_stream_enabled(&self) -> Result<bool> {
        let mut buf = [0u8; REPORT_SIZE];
        buf[0] = protocol::REP_ID_SENSOR_STREAM_STATUS;
        let len = self.link.get_feature_report(&mut buf).map_err(|e| {
            SensorError::Query(format!(
                "Unable to get a feature report [SensStreamStatus] - {}",
                e
            ))
        })?;
        protocol::parse_stream_status(&buf[..len.min(REPORT_SIZE)])
    }

    /// Send the keep-alive ping.
    pub fn ping(&self) -> Result<()> {
        self.link
            .send_feature_report(&protocol::build_ping_cmd())
            .map_err(|e| {
                SensorError::Command(format!(
                    "Unable to send ping [REP_ID_REQUEST_SET-RQ_CMD_PING] - {}",
                    e
                ))
            })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockLink, MockState};
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn transport() -> (HidTransport, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        let link = MockLink {
            state: state.clone(),
        };
        (HidTransport::new(Box::new(link)), state)
    }

    #[test]
    fn test_set_stream_enabled_writes_feature_report() {
        let (hid, state) = transport();
        hid.set_stream_enabled(true).unwrap();
        hid.set_stream_enabled(false).unwrap();
        let sent = state.feature_reports.lock().unwrap().clone();
        assert_eq!(sent, vec![vec![0x32u8, 0x01], vec![0x32, 0x00]]);
    }

    #[test]
    fn test_set_stream_enabled_failure_carries_transport_text() {
        let (hid, state) = transport();
        state.fail_stream_enable.store(true, Ordering::SeqCst);
        match hid.set_stream_enabled(true) {
            Err(SensorError::Command(msg)) => assert!(msg.contains("feature report rejected")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_is_stream_enabled_validates_reply() {
        let (hid, state) = transport();
        *state.status_reply.lock().unwrap() = vec![0x32, 0x01];
        assert!(hid.is_stream_enabled().unwrap());

        *state.status_reply.lock().unwrap() = vec![0x32, 0x00];
        assert!(!hid.is_stream_enabled().unwrap());

        *state.status_reply.lock().unwrap() = vec![0x32];
        assert!(matches!(hid.is_stream_enabled(), Err(SensorError::Query(_))));

        *state.status_reply.lock().unwrap() = vec![0x01, 0x01];
        assert!(matches!(hid.is_stream_enabled(), Err(SensorError::Query(_))));

        state.status_reply.lock().unwrap().clear();
        assert!(matches!(hid.is_stream_enabled(), Err(SensorError::Query(_))));
    }

    #[test]
    fn test_ping() {
        let (hid, state) = transport();
        hid.ping().unwrap();
        assert_eq!(state.pings(), 1);

        state.fail_ping.store(true, Ordering::SeqCst);
        assert!(matches!(hid.ping(), Err(SensorError::Command(_))));
    }
}

/// Errors that can occur when talking to the sensor hub.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("HID transport initialization failed: {0}")]
    TransportInit(String),

    #[error("Invalid serial number '{serial}' reported by device {path}")]
    SerialFormat { serial: String, path: String },

    #[error("No sensor hub found (VID=2B03)")]
    NoDeviceFound,

    #[error("No sensor hub with serial number {0}")]
    UnknownSerial(u32),

    #[error("Connection to device with sn {serial} failed: {reason}")]
    DeviceOpen { serial: u32, reason: String },

    #[error("Feature report command failed: {0}")]
    Command(String),

    #[error("Feature report query failed: {0}")]
    Query(String),

    #[error("Session is already open")]
    SessionActive,

    #[error("Session is not open")]
    NotOpen,

    #[error("Failed to spawn capture thread: {0}")]
    ThreadSpawn(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Sensor stream stopped")]
    StreamStopped,
}

/// Reasons an input report is not turned into a sample.
///
/// These never escape the capture loop; they only feed counters and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("short report: {0} bytes")]
    Short(usize),

    #[error("sensor data type mismatch: tag 0x{0:02x}")]
    Tag(u8),
}

use crate::protocol;

/// Per-channel update status reported by the firmware for the magnetometer
/// and environmental sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// The sensor is not fitted on this camera model.
    NotPresent,
    /// The frame repeats the previous value.
    #[default]
    NoNewData,
    /// The frame carries a fresh reading.
    NewValue,
    /// Any other status byte.
    NotValid(u8),
}

impl ChannelStatus {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ChannelStatus::NotPresent,
            1 => ChannelStatus::NoNewData,
            2 => ChannelStatus::NewValue,
            other => ChannelStatus::NotValid(other),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ChannelStatus::NewValue)
    }
}

/// Camera frame synchronization flags carried alongside each IMU reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSync {
    /// The IMU reading coincides with a camera frame.
    pub synced: bool,
    /// The firmware supports frame synchronization.
    pub capable: bool,
    /// Number of synced frames since power-up.
    pub count: u32,
}

/// Accelerometer/gyroscope reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    pub valid: bool,
    /// Device timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Acceleration [x, y, z] in m/s².
    pub accel: [f64; 3],
    /// Angular rate [x, y, z] in deg/s.
    pub gyro: [f64; 3],
    /// IMU die temperature in °C.
    pub temp_c: f64,
    pub sync: FrameSync,
}

/// Magnetometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagSample {
    pub status: ChannelStatus,
    pub timestamp_ns: u64,
    /// Magnetic field [x, y, z] in µT.
    pub field: [f64; 3],
}

/// Environmental sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvSample {
    pub status: ChannelStatus,
    pub timestamp_ns: u64,
    pub temp_c: f64,
    pub pressure_hpa: f64,
    /// Relative humidity in %rH.
    pub humidity_pct: f64,
}

/// Temperature of the left and right image sensors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CamTempSample {
    pub valid: bool,
    pub timestamp_ns: u64,
    pub temp_left_c: f64,
    pub temp_right_c: f64,
}

/// Firmware release taken from the USB device descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    /// Split a BCD-style `bcdDevice` release number.
    pub fn from_release(release: u16) -> Self {
        Self {
            major: (release >> 8) as u8,
            minor: (release & 0x00FF) as u8,
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Camera model owning a sensor hub, identified by the hub's product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorModel {
    ZedMini,
    Zed2,
    Zed2i,
    Unknown(u16),
}

impl SensorModel {
    pub fn from_product_id(pid: u16) -> Self {
        match pid {
            protocol::PID_ZED_M_MCU => SensorModel::ZedMini,
            protocol::PID_ZED_2_MCU => SensorModel::Zed2,
            protocol::PID_ZED_2I_MCU => SensorModel::Zed2i,
            other => SensorModel::Unknown(other),
        }
    }
}

/// One discovered sensor hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRecord {
    pub serial: u32,
    pub product_id: u16,
    pub release: FirmwareVersion,
}

impl DeviceRecord {
    pub fn model(&self) -> SensorModel {
        SensorModel::from_product_id(self.product_id)
    }
}

use crate::error::FrameError;
use crate::types::{CamTempSample, ChannelStatus, EnvSample, FrameSync, ImuSample, MagSample};
use crate::{Result, SensorError};

// -- USB identifiers --
pub const VENDOR_ID: u16 = 0x2B03;
pub const PID_ZED_M_MCU: u16 = 0xF681;
pub const PID_ZED_2_MCU: u16 = 0xF781;
pub const PID_ZED_2I_MCU: u16 = 0xF881;

// -- Report geometry --
/// Largest report exchanged with the hub, report ID included.
pub const REPORT_SIZE: usize = 65;
/// Size of a packed sensor data input report.
pub const SENSOR_FRAME_SIZE: usize = 62;
/// Size of the stream status feature report.
pub const STREAM_STATUS_SIZE: usize = 2;

// -- Report IDs --
pub const REP_ID_SENSOR_DATA: u8 = 0x01;
pub const REP_ID_REQUEST_SET: u8 = 0x21;
pub const REP_ID_SENSOR_STREAM_STATUS: u8 = 0x32;

// -- Request sub-commands --
pub const RQ_CMD_PING: u8 = 0xF2;

/// Raw IMU validity byte meaning "not valid".
pub const IMU_NOT_VALID: u8 = 1;
/// Raw camera temperature meaning "no reading" (-273.15 °C).
pub const TEMP_NOT_VALID: i16 = -27315;

// -- Firmware scale factors --
/// Timestamp ticks to nanoseconds.
pub const TS_SCALE: u64 = 39;
/// Accelerometer, ±8 g full scale, to m/s².
pub const ACC_SCALE: f64 = 9.8189 * (8.0 / 32768.0);
/// Gyroscope, ±1000 deg/s full scale, to deg/s.
pub const GYRO_SCALE: f64 = 1000.0 / 32768.0;
/// Temperatures are reported in 0.01 °C.
pub const TEMP_SCALE: f64 = 0.01;
/// Magnetometer to µT.
pub const MAG_SCALE: f64 = 1.0 / 16.0;
/// Pressure to hPa.
pub const PRESS_SCALE: f64 = 0.0001;
/// Humidity to %rH.
pub const HUMID_SCALE: f64 = 0.01;

/// One decoded sensor data report, already in physical units.
///
/// Every channel is decoded together with its status; whether a channel is
/// actually applied is decided by [`crate::store::SampleStore::apply`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub imu: ImuSample,
    pub mag: MagSample,
    pub env: EnvSample,
    pub cam_temp: CamTempSample,
}

fn read_u8(data: &[u8], off: usize) -> u8 {
    data[off]
}

fn read_i16(data: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([data[off], data[off + 1]])
}

fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn read_u64(data: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[off..off + 8]);
    u64::from_le_bytes(bytes)
}

fn read_i16x3(data: &[u8], off: usize, scale: f64) -> [f64; 3] {
    [
        read_i16(data, off) as f64 * scale,
        read_i16(data, off + 2) as f64 * scale,
        read_i16(data, off + 4) as f64 * scale,
    ]
}

/// Parse a sensor data input report.
///
/// Packet layout (little-endian, packed):
/// - `[0]`: report ID 0x01
/// - `[1]`: IMU not-valid flag
/// - `[2..10]`: u64 timestamp (ticks)
/// - `[10..16]`: 3x i16 gyroscope
/// - `[16..22]`: 3x i16 accelerometer
/// - `[22]`, `[23]`, `[24..28]`: frame sync flag, sync capability, u32 sync count
/// - `[28..30]`: i16 IMU temperature
/// - `[30]`: magnetometer status, `[31..37]`: 3x i16 magnetic field
/// - `[37..47]`: deprecated motion/free-fall flags and counters
/// - `[47]`: environmental status, `[48..50]`: i16 temperature
/// - `[50..54]`: u32 pressure, `[54..58]`: u32 humidity
/// - `[58..60]`, `[60..62]`: i16 left/right camera temperature
pub fn parse_sensor_frame(data: &[u8]) -> std::result::Result<SensorFrame, FrameError> {
    if data.len() < SENSOR_FRAME_SIZE {
        return Err(FrameError::Short(data.len()));
    }
    if data[0] != REP_ID_SENSOR_DATA {
        return Err(FrameError::Tag(data[0]));
    }

    let timestamp_ns = read_u64(data, 2).saturating_mul(TS_SCALE);

    let imu = ImuSample {
        valid: read_u8(data, 1) != IMU_NOT_VALID,
        timestamp_ns,
        gyro: read_i16x3(data, 10, GYRO_SCALE),
        accel: read_i16x3(data, 16, ACC_SCALE),
        temp_c: read_i16(data, 28) as f64 * TEMP_SCALE,
        sync: FrameSync {
            synced: read_u8(data, 22) != 0,
            capable: read_u8(data, 23) != 0,
            count: read_u32(data, 24),
        },
    };

    let mag = MagSample {
        status: ChannelStatus::from_raw(read_u8(data, 30)),
        timestamp_ns,
        field: read_i16x3(data, 31, MAG_SCALE),
    };

    let env = EnvSample {
        status: ChannelStatus::from_raw(read_u8(data, 47)),
        timestamp_ns,
        temp_c: read_i16(data, 48) as f64 * TEMP_SCALE,
        pressure_hpa: read_u32(data, 50) as f64 * PRESS_SCALE,
        humidity_pct: read_u32(data, 54) as f64 * HUMID_SCALE,
    };

    // Camera sensor temperatures are sampled together with the environmental
    // sensor at firmware level and carry no timestamp of their own.
    let raw_left = read_i16(data, 58);
    let raw_right = read_i16(data, 60);
    let cam_temp = CamTempSample {
        valid: raw_left != TEMP_NOT_VALID && raw_right != TEMP_NOT_VALID && env.status.is_new(),
        timestamp_ns,
        temp_left_c: raw_left as f64 * TEMP_SCALE,
        temp_right_c: raw_right as f64 * TEMP_SCALE,
    };

    Ok(SensorFrame {
        imu,
        mag,
        env,
        cam_temp,
    })
}

/// Build the stream status feature report.
/// Enable: [0x32, 0x01]
/// Disable: [0x32, 0x00]
pub fn build_stream_cmd(enable: bool) -> [u8; STREAM_STATUS_SIZE] {
    [REP_ID_SENSOR_STREAM_STATUS, if enable { 1 } else { 0 }]
}

/// Build the keep-alive ping feature report: [0x21, 0xF2]
pub fn build_ping_cmd() -> [u8; 2] {
    [REP_ID_REQUEST_SET, RQ_CMD_PING]
}

/// Validate a stream status feature report and return the enable flag.
pub fn parse_stream_status(response: &[u8]) -> Result<bool> {
    if response.len() < STREAM_STATUS_SIZE {
        return Err(SensorError::Query(format!(
            "stream status size mismatch ({} bytes)",
            response.len()
        )));
    }
    if response[0] != REP_ID_SENSOR_STREAM_STATUS {
        return Err(SensorError::Query(format!(
            "stream status type mismatch (tag 0x{:02x})",
            response[0]
        )));
    }
    Ok(response[1] == 1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Raw field values used to craft sensor data reports in tests.
    #[derive(Clone, Copy)]
    pub(crate) struct RawFrame {
        pub imu_not_valid: u8,
        pub timestamp: u64,
        pub gyro: [i16; 3],
        pub accel: [i16; 3],
        pub imu_temp: i16,
        pub mag_status: u8,
        pub mag: [i16; 3],
        pub env_status: u8,
        pub env_temp: i16,
        pub pressure: u32,
        pub humidity: u32,
        pub cam_left: i16,
        pub cam_right: i16,
    }

    impl Default for RawFrame {
        fn default() -> Self {
            Self {
                imu_not_valid: 0,
                timestamp: 1_000,
                gyro: [100, -200, 300],
                accel: [-4096, 0, 4096],
                imu_temp: 3512,
                mag_status: 2,
                mag: [160, -320, 480],
                env_status: 2,
                env_temp: 2875,
                pressure: 10_132_500,
                humidity: 4_550,
                cam_left: 4020,
                cam_right: 4110,
            }
        }
    }

    impl RawFrame {
        pub(crate) fn encode(&self) -> Vec<u8> {
            let mut buf = vec![0u8; SENSOR_FRAME_SIZE];
            buf[0] = REP_ID_SENSOR_DATA;
            buf[1] = self.imu_not_valid;
            buf[2..10].copy_from_slice(&self.timestamp.to_le_bytes());
            for i in 0..3 {
                buf[10 + 2 * i..12 + 2 * i].copy_from_slice(&self.gyro[i].to_le_bytes());
                buf[16 + 2 * i..18 + 2 * i].copy_from_slice(&self.accel[i].to_le_bytes());
                buf[31 + 2 * i..33 + 2 * i].copy_from_slice(&self.mag[i].to_le_bytes());
            }
            buf[28..30].copy_from_slice(&self.imu_temp.to_le_bytes());
            buf[30] = self.mag_status;
            buf[47] = self.env_status;
            buf[48..50].copy_from_slice(&self.env_temp.to_le_bytes());
            buf[50..54].copy_from_slice(&self.pressure.to_le_bytes());
            buf[54..58].copy_from_slice(&self.humidity.to_le_bytes());
            buf[58..60].copy_from_slice(&self.cam_left.to_le_bytes());
            buf[60..62].copy_from_slice(&self.cam_right.to_le_bytes());
            buf
        }
    }

    #[test]
    fn test_parse_scales_imu_fields() {
        let raw = RawFrame::default();
        let frame = parse_sensor_frame(&raw.encode()).unwrap();

        assert!(frame.imu.valid);
        assert_eq!(frame.imu.timestamp_ns, 39_000);
        for i in 0..3 {
            assert_eq!(frame.imu.accel[i], raw.accel[i] as f64 * ACC_SCALE);
            assert_eq!(frame.imu.gyro[i], raw.gyro[i] as f64 * GYRO_SCALE);
        }
        assert_eq!(frame.imu.temp_c, raw.imu_temp as f64 * TEMP_SCALE);
        // 4096 LSB at ±8 g is 1 g
        assert!((frame.imu.accel[2] - 9.8189).abs() < 1e-9);
    }

    #[test]
    fn test_parse_scales_mag_and_env_fields() {
        let raw = RawFrame::default();
        let frame = parse_sensor_frame(&raw.encode()).unwrap();

        assert_eq!(frame.mag.status, ChannelStatus::NewValue);
        assert_eq!(frame.mag.field, [10.0, -20.0, 30.0]);
        assert_eq!(frame.env.status, ChannelStatus::NewValue);
        assert!((frame.env.temp_c - 28.75).abs() < 1e-9);
        assert!((frame.env.pressure_hpa - 1013.25).abs() < 1e-9);
        assert!((frame.env.humidity_pct - 45.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_imu_not_valid() {
        let raw = RawFrame {
            imu_not_valid: IMU_NOT_VALID,
            ..Default::default()
        };
        let frame = parse_sensor_frame(&raw.encode()).unwrap();
        assert!(!frame.imu.valid);
    }

    #[test]
    fn test_parse_frame_sync_fields() {
        let mut data = RawFrame::default().encode();
        data[22] = 1;
        data[23] = 1;
        data[24..28].copy_from_slice(&77u32.to_le_bytes());
        let frame = parse_sensor_frame(&data).unwrap();
        assert_eq!(
            frame.imu.sync,
            FrameSync {
                synced: true,
                capable: true,
                count: 77
            }
        );
    }

    #[test]
    fn test_cam_temp_valid_only_with_new_env() {
        let frame = parse_sensor_frame(&RawFrame::default().encode()).unwrap();
        assert!(frame.cam_temp.valid);
        assert!((frame.cam_temp.temp_left_c - 40.2).abs() < 1e-9);
        assert!((frame.cam_temp.temp_right_c - 41.1).abs() < 1e-9);

        let stale_env = RawFrame {
            env_status: 1,
            ..Default::default()
        };
        assert!(!parse_sensor_frame(&stale_env.encode()).unwrap().cam_temp.valid);

        let left_missing = RawFrame {
            cam_left: TEMP_NOT_VALID,
            ..Default::default()
        };
        assert!(!parse_sensor_frame(&left_missing.encode()).unwrap().cam_temp.valid);

        let right_missing = RawFrame {
            cam_right: TEMP_NOT_VALID,
            ..Default::default()
        };
        assert!(!parse_sensor_frame(&right_missing.encode()).unwrap().cam_temp.valid);
    }

    #[test]
    fn test_parse_rejects_short_and_mistagged() {
        assert_eq!(parse_sensor_frame(&[0x01; 10]), Err(FrameError::Short(10)));

        let mut data = RawFrame::default().encode();
        data[0] = REP_ID_SENSOR_STREAM_STATUS;
        assert_eq!(parse_sensor_frame(&data), Err(FrameError::Tag(0x32)));
    }

    #[test]
    fn test_parse_accepts_padded_report() {
        let mut data = RawFrame::default().encode();
        data.resize(64, 0);
        assert!(parse_sensor_frame(&data).is_ok());
    }

    #[test]
    fn test_build_commands() {
        assert_eq!(build_stream_cmd(true), [0x32, 0x01]);
        assert_eq!(build_stream_cmd(false), [0x32, 0x00]);
        assert_eq!(build_ping_cmd(), [0x21, 0xF2]);
    }

    #[test]
    fn test_parse_stream_status() {
        assert!(parse_stream_status(&[0x32, 0x01]).unwrap());
        assert!(!parse_stream_status(&[0x32, 0x00, 0x00]).unwrap());
        assert!(matches!(
            parse_stream_status(&[0x32]),
            Err(SensorError::Query(_))
        ));
        assert!(matches!(
            parse_stream_status(&[0x21, 0x01]),
            Err(SensorError::Query(_))
        ));
    }
}

use std::time::Duration;

/// Default blocking read timeout of the capture loop.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Capture loop iterations between two keep-alive pings.
pub const DEFAULT_PING_INTERVAL: u32 = 400;
/// Capacity of the fresh-IMU notification queue.
pub const DEFAULT_IMU_QUEUE_DEPTH: usize = 256;

/// Session configuration. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorParams {
    /// Log per-device discovery records and per-frame warnings.
    pub verbose: bool,
    /// Upper bound on one blocking read; also bounds `close()` latency.
    pub read_timeout: Duration,
    /// Send a ping every this many capture loop iterations.
    pub ping_interval: u32,
    pub imu_queue_depth: usize,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            verbose: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            imu_queue_depth: DEFAULT_IMU_QUEUE_DEPTH,
        }
    }
}

impl SensorParams {
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Defaults overridden by environment variables:
    /// - `ZED_SENSORS_VERBOSE` (1/true/yes/on, 0/false/no/off)
    /// - `ZED_SENSORS_READ_TIMEOUT_MS`
    /// - `ZED_SENSORS_PING_INTERVAL`
    /// - `ZED_SENSORS_IMU_QUEUE`
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read_timeout_ms = parse_u64(lookup("ZED_SENSORS_READ_TIMEOUT_MS"))
            .filter(|&ms| ms > 0)
            .unwrap_or(defaults.read_timeout.as_millis() as u64);
        Self {
            verbose: parse_bool(lookup("ZED_SENSORS_VERBOSE")).unwrap_or(defaults.verbose),
            read_timeout: Duration::from_millis(read_timeout_ms),
            ping_interval: parse_u64(lookup("ZED_SENSORS_PING_INTERVAL"))
                .filter(|&n| n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.ping_interval),
            imu_queue_depth: parse_u64(lookup("ZED_SENSORS_IMU_QUEUE"))
                .filter(|&n| n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.imu_queue_depth),
        }
    }

    /// Read timeout in the unit hidapi expects.
    pub(crate) fn read_timeout_ms(&self) -> i32 {
        i32::try_from(self.read_timeout.as_millis()).unwrap_or(i32::MAX)
    }
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    value.and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}

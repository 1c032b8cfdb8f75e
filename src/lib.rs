//! # zed-sensors - Rust driver for the ZED camera sensor hub
//!
//! The sensor hub of ZED Mini / ZED 2 / ZED 2i stereo cameras is a USB HID
//! device streaming IMU, magnetometer, environmental and camera temperature
//! data. This crate provides:
//! - Device discovery by serial number
//! - A capture session with a background reader thread and keep-alive pings
//! - Lock-protected access to the latest sample of every channel
//!
//! ## Quick Start
//! ```no_run
//! use zed_sensors::{CaptureSession, SensorParams};
//! use std::time::Duration;
//!
//! let mut session = CaptureSession::new(SensorParams::from_env());
//! session.open(None).unwrap();
//! for _ in 0..100 {
//!     let imu = session.recv_imu_timeout(Duration::from_secs(1)).unwrap();
//!     println!("accel: {:?}", imu.accel);
//! }
//! println!("env: {:?}", session.last_env());
//! session.close();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod hid;
pub mod protocol;
pub mod session;
pub mod store;
pub mod types;

pub use config::SensorParams;
pub use device::DeviceRegistry;
pub use error::SensorError;
pub use session::{CaptureSession, CaptureStats, SessionState};
pub use store::SampleStore;
pub use types::*;

/// Result type alias for sensor hub operations.
pub type Result<T> = std::result::Result<T, SensorError>;

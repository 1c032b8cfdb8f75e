use crate::protocol::SensorFrame;
use crate::types::{CamTempSample, EnvSample, ImuSample, MagSample};
use std::sync::{Mutex, MutexGuard};

/// Latest known value of every sensor channel.
///
/// Written by the capture thread only. Each sample family sits behind its own
/// lock and is read and written as a whole value, so readers never observe a
/// half-updated sample.
#[derive(Debug, Default)]
pub struct SampleStore {
    imu: Mutex<ImuSample>,
    mag: Mutex<MagSample>,
    env: Mutex<EnvSample>,
    cam_temp: Mutex<CamTempSample>,
}

// Samples are plain values, a panic mid-write cannot leave them inconsistent.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imu(&self) -> ImuSample {
        *lock(&self.imu)
    }

    pub fn mag(&self) -> MagSample {
        *lock(&self.mag)
    }

    pub fn env(&self) -> EnvSample {
        *lock(&self.env)
    }

    pub fn cam_temp(&self) -> CamTempSample {
        *lock(&self.cam_temp)
    }

    /// Apply a decoded frame.
    ///
    /// - IMU is replaced on every frame.
    /// - Magnetometer and environmental samples are replaced only on
    ///   `NewValue`; otherwise only their status follows the frame.
    /// - Camera temperature is replaced when the frame marks it valid;
    ///   otherwise it is only flagged invalid.
    pub fn apply(&self, frame: &SensorFrame) {
        *lock(&self.imu) = frame.imu;

        {
            let mut mag = lock(&self.mag);
            if frame.mag.status.is_new() {
                *mag = frame.mag;
            } else {
                mag.status = frame.mag.status;
            }
        }

        {
            let mut env = lock(&self.env);
            if frame.env.status.is_new() {
                *env = frame.env;
            } else {
                env.status = frame.env.status;
            }
        }

        let mut cam_temp = lock(&self.cam_temp);
        if frame.cam_temp.valid {
            *cam_temp = frame.cam_temp;
        } else {
            cam_temp.valid = false;
        }
    }

    /// Return every channel to its initial invalid state.
    pub fn reset(&self) {
        *lock(&self.imu) = ImuSample::default();
        *lock(&self.mag) = MagSample::default();
        *lock(&self.env) = EnvSample::default();
        *lock(&self.cam_temp) = CamTempSample::default();
    }
}

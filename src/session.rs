use crate::config::SensorParams;
use crate::device::DeviceRegistry;
use crate::error::FrameError;
use crate::hid::{HidApiBackend, HidBackend, HidTransport};
use crate::protocol::{self, REPORT_SIZE, VENDOR_ID};
use crate::store::{lock, SampleStore};
use crate::types::{CamTempSample, EnvSample, ImuSample, MagSample};
use crate::{Result, SensorError};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Lifecycle of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Streaming,
    Stopping,
}

/// Capture loop counters since the session was last opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub iterations: u64,
    pub frames: u64,
    /// Timeouts and reports shorter than a sensor frame.
    pub short_reads: u64,
    /// Reports carrying another report ID.
    pub mismatched: u64,
    pub read_errors: u64,
    pub pings: u64,
    pub ping_failures: u64,
}

#[derive(Debug, Default)]
struct CaptureCounters {
    iterations: AtomicU64,
    frames: AtomicU64,
    short_reads: AtomicU64,
    mismatched: AtomicU64,
    read_errors: AtomicU64,
    pings: AtomicU64,
    ping_failures: AtomicU64,
}

impl CaptureCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            iterations: self.iterations.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            mismatched: self.mismatched.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
            ping_failures: self.ping_failures.load(Ordering::Relaxed),
        }
    }
}

/// An exclusive session against one sensor hub.
///
/// While open, a background thread reads sensor reports, decodes them and
/// publishes the latest samples. The thread is always stopped and joined
/// before the device handle is released, including on drop.
pub struct CaptureSession {
    params: SensorParams,
    registry: DeviceRegistry,
    state: SessionState,
    serial: Option<u32>,
    store: Arc<SampleStore>,
    counters: Arc<CaptureCounters>,
    imu_tx: Sender<ImuSample>,
    imu_rx: Receiver<ImuSample>,
    transport: Option<Arc<Mutex<HidTransport>>>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Session over the system HID stack.
    pub fn new(params: SensorParams) -> Self {
        Self::with_backend(params, Arc::new(HidApiBackend))
    }

    pub fn with_backend(params: SensorParams, backend: Arc<dyn HidBackend>) -> Self {
        let (imu_tx, imu_rx) = crossbeam_channel::bounded(params.imu_queue_depth.max(1));
        Self {
            registry: DeviceRegistry::new(backend, &params),
            params,
            state: SessionState::Closed,
            serial: None,
            store: Arc::new(SampleStore::new()),
            counters: Arc::new(CaptureCounters::default()),
            imu_tx,
            imu_rx,
            transport: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Open the device with the given serial number, or the lowest serial
    /// available when `None`, enable its data stream and start capturing.
    pub fn open(&mut self, serial: Option<u32>) -> Result<()> {
        if self.state != SessionState::Closed {
            return Err(SensorError::SessionActive);
        }

        self.state = SessionState::Opening;
        match self.start(serial) {
            Ok(()) => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    fn resolve_serial(&mut self, serial: Option<u32>) -> Result<u32> {
        match serial {
            None => {
                if self.registry.is_empty() {
                    self.registry.enumerate()?;
                }
                self.registry.first_serial().ok_or(SensorError::NoDeviceFound)
            }
            Some(sn) => {
                if self.registry.record(sn).is_none() {
                    self.registry.enumerate()?;
                }
                match self.registry.record(sn) {
                    Some(_) => Ok(sn),
                    None => Err(SensorError::UnknownSerial(sn)),
                }
            }
        }
    }

    fn start(&mut self, serial: Option<u32>) -> Result<()> {
        let serial = self.resolve_serial(serial)?;
        let product_id = self
            .registry
            .product_id(serial)
            .ok_or(SensorError::UnknownSerial(serial))?;

        let link = self
            .registry
            .backend()
            .open(VENDOR_ID, product_id, &serial.to_string())
            .map_err(|e| SensorError::DeviceOpen {
                serial,
                reason: e.to_string(),
            })?;
        let transport = HidTransport::new(link);

        if self.params.verbose {
            log::info!("Connected to device with sn {}", serial);
        }

        transport.set_stream_enabled(true)?;

        let transport = Arc::new(Mutex::new(transport));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(CaptureCounters::default());
        while self.imu_rx.try_recv().is_ok() {}

        let ctx = CaptureContext {
            transport: transport.clone(),
            store: self.store.clone(),
            counters: counters.clone(),
            imu_tx: self.imu_tx.clone(),
            imu_rx: self.imu_rx.clone(),
            stop_flag: stop_flag.clone(),
            params: self.params.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("zed-sensors-capture".into())
            .spawn(move || capture_loop(ctx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                if let Err(disable_err) = lock(&transport).set_stream_enabled(false) {
                    log::warn!("{}", disable_err);
                }
                return Err(SensorError::ThreadSpawn(e.to_string()));
            }
        };

        self.serial = Some(serial);
        self.transport = Some(transport);
        self.stop_flag = stop_flag;
        self.counters = counters;
        self.thread = Some(thread);
        Ok(())
    }

    /// Stop capturing, disable the stream and release the device.
    ///
    /// Idempotent; blocks for at most one read timeout while the capture
    /// thread notices the stop flag.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed && self.thread.is_none() && self.transport.is_none() {
            return;
        }

        self.state = SessionState::Stopping;
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Sensor capture thread panicked");
            }
        }

        if let Some(transport) = self.transport.take() {
            let disabled = lock(&transport).set_stream_enabled(false);
            if let Err(e) = disabled {
                log::warn!("{}", e);
            }
        }

        self.store.reset();
        while self.imu_rx.try_recv().is_ok() {}

        if let Some(serial) = self.serial.take() {
            if self.params.verbose {
                log::info!("Device closed (sn {})", serial);
            } else {
                log::debug!("Device closed (sn {})", serial);
            }
        }
        self.state = SessionState::Closed;
    }

    fn with_transport<T>(&self, f: impl FnOnce(&HidTransport) -> Result<T>) -> Result<T> {
        let transport = self.transport.as_ref().ok_or(SensorError::NotOpen)?;
        let hid = lock(transport);
        f(&hid)
    }

    /// Turn the device's sensor data stream on or off.
    pub fn set_stream_enabled(&self, enable: bool) -> Result<()> {
        self.with_transport(|hid| hid.set_stream_enabled(enable))
    }

    /// Query the device's stream status flag.
    pub fn is_stream_enabled(&self) -> Result<bool> {
        self.with_transport(|hid| hid.is_stream_enabled())
    }

    /// Send a keep-alive ping now.
    pub fn ping(&self) -> Result<()> {
        self.with_transport(|hid| hid.ping())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serial number of the open device.
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    pub fn params(&self) -> &SensorParams {
        &self.params
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Shared handle to the latest samples, usable from other threads.
    pub fn store(&self) -> Arc<SampleStore> {
        self.store.clone()
    }

    pub fn last_imu(&self) -> ImuSample {
        self.store.imu()
    }

    pub fn last_mag(&self) -> MagSample {
        self.store.mag()
    }

    pub fn last_env(&self) -> EnvSample {
        self.store.env()
    }

    pub fn last_cam_temp(&self) -> CamTempSample {
        self.store.cam_temp()
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// True while the capture thread is running.
    pub fn is_capturing(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the next queued IMU sample.
    ///
    /// The queue holds the most recent `imu_queue_depth` samples; older ones
    /// are discarded by the capture thread.
    pub fn recv_imu_timeout(&self, timeout: Duration) -> Result<ImuSample> {
        if self.state != SessionState::Streaming {
            return Err(SensorError::NotOpen);
        }
        // The session keeps its own sender, so a dead capture thread never
        // disconnects the channel.
        if !self.is_capturing() && self.imu_rx.is_empty() {
            return Err(SensorError::StreamStopped);
        }
        self.imu_rx.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout if !self.is_capturing() => {
                SensorError::StreamStopped
            }
            crossbeam_channel::RecvTimeoutError::Timeout => SensorError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => SensorError::StreamStopped,
        })
    }

    /// Take a queued IMU sample without blocking.
    pub fn try_recv_imu(&self) -> Option<ImuSample> {
        self.imu_rx.try_recv().ok()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything the capture thread owns or shares with its session.
struct CaptureContext {
    transport: Arc<Mutex<HidTransport>>,
    store: Arc<SampleStore>,
    counters: Arc<CaptureCounters>,
    imu_tx: Sender<ImuSample>,
    /// Used to drop the oldest queued sample when the queue is full.
    imu_rx: Receiver<ImuSample>,
    stop_flag: Arc<AtomicBool>,
    params: SensorParams,
}

impl CaptureContext {
    fn send_ping(&self) {
        match lock(&self.transport).ping() {
            Ok(()) => CaptureCounters::bump(&self.counters.pings),
            Err(e) => {
                CaptureCounters::bump(&self.counters.ping_failures);
                log::warn!("{}", e);
            }
        }
    }

    fn publish_imu(&self, sample: ImuSample) {
        if let Err(crossbeam_channel::TrySendError::Full(sample)) = self.imu_tx.try_send(sample) {
            log::trace!("IMU queue full, dropping oldest sample");
            let _ = self.imu_rx.try_recv();
            let _ = self.imu_tx.try_send(sample);
        }
    }
}

/// The capture loop runs in a dedicated thread until the stop flag is set.
///
/// Each iteration holds the transport lock for one read only, so on-demand
/// commands from the session interleave with reads.
fn capture_loop(ctx: CaptureContext) {
    let mut buf = [0u8; REPORT_SIZE];
    let timeout_ms = ctx.params.read_timeout_ms();
    let mut ping_count: u32 = 0;
    let mut consecutive_errors: u64 = 0;

    log::info!("Sensor capture started");

    while !ctx.stop_flag.load(Ordering::SeqCst) {
        // Keep the HID stream from going idle.
        ping_count += 1;
        if ping_count >= ctx.params.ping_interval {
            ping_count = 0;
            ctx.send_ping();
        }
        CaptureCounters::bump(&ctx.counters.iterations);

        let read = lock(&ctx.transport).read_report(&mut buf, timeout_ms);
        let len = match read {
            Ok(n) => {
                consecutive_errors = 0;
                n
            }
            Err(e) => {
                CaptureCounters::bump(&ctx.counters.read_errors);
                consecutive_errors += 1;
                if consecutive_errors == 1 {
                    log::warn!("Sensor read error: {}", e);
                } else {
                    log::trace!("Sensor read error #{}: {}", consecutive_errors, e);
                }
                std::thread::sleep(ctx.params.read_timeout);
                continue;
            }
        };

        match protocol::parse_sensor_frame(&buf[..len]) {
            Ok(frame) => {
                ctx.store.apply(&frame);
                CaptureCounters::bump(&ctx.counters.frames);
                ctx.publish_imu(frame.imu);
            }
            Err(FrameError::Short(_)) => {
                CaptureCounters::bump(&ctx.counters.short_reads);
            }
            Err(e @ FrameError::Tag(_)) => {
                CaptureCounters::bump(&ctx.counters.mismatched);
                if ctx.params.verbose {
                    log::warn!("REP_ID_SENSOR_DATA - {}", e);
                }
            }
        }
    }

    log::info!("Sensor capture stopping (stop flag set)");
}

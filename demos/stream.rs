//! Stream sensor data from the first ZED sensor hub to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use std::time::{Duration, Instant};
use zed_sensors::{CaptureSession, ChannelStatus, SensorError, SensorParams};

fn main() {
    env_logger::init();

    let mut session = CaptureSession::new(SensorParams::from_env());
    if let Err(e) = session.open(None) {
        eprintln!("Failed to open device: {}", e);
        std::process::exit(1);
    }

    if let Some(record) = session.serial().and_then(|sn| session.registry().record(sn)) {
        println!("Serial:   {}", record.serial);
        println!("Model:    {:?}", record.model());
        println!("Firmware: {}", record.release);
        println!();
    }

    println!("Streaming sensors (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut count: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        match session.recv_imu_timeout(Duration::from_secs(2)) {
            Ok(imu) => {
                count += 1;

                // Print every ~100th sample to avoid flooding the terminal
                if count % 100 == 1 {
                    println!(
                        "ts={:<14}  acc=[{:+.3}, {:+.3}, {:+.3}]  gyro=[{:+.3}, {:+.3}, {:+.3}]  t={:.2}",
                        imu.timestamp_ns,
                        imu.accel[0], imu.accel[1], imu.accel[2],
                        imu.gyro[0], imu.gyro[1], imu.gyro[2],
                        imu.temp_c,
                    );
                }

                // Report rate and slow channels every 3 seconds
                let now = Instant::now();
                if now.duration_since(last_report) >= Duration::from_secs(3) {
                    let elapsed = start.elapsed().as_secs_f64();
                    let hz = count as f64 / elapsed;
                    println!("--- {} samples in {:.1}s ({:.1} Hz) ---", count, elapsed, hz);

                    let mag = session.last_mag();
                    if mag.status != ChannelStatus::NotPresent {
                        println!("    mag=[{:+.2}, {:+.2}, {:+.2}] uT", mag.field[0], mag.field[1], mag.field[2]);
                    }
                    let env = session.last_env();
                    if env.status != ChannelStatus::NotPresent {
                        println!(
                            "    env t={:.2} C  p={:.2} hPa  h={:.2} %",
                            env.temp_c, env.pressure_hpa, env.humidity_pct
                        );
                    }
                    let cam = session.last_cam_temp();
                    if cam.valid {
                        println!("    cam left={:.2} C  right={:.2} C", cam.temp_left_c, cam.temp_right_c);
                    }
                    last_report = now;
                }
            }
            Err(SensorError::Timeout) => {
                eprintln!("Timeout waiting for sensor data");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "\nTotal: {} samples in {:.1}s ({:.1} Hz)",
        count,
        elapsed,
        count as f64 / elapsed
    );
    println!("{:?}", session.stats());
    session.close();
}

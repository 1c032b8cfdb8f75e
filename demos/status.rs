//! Open a sensor hub, query its stream status and send a ping.
//!
//! Usage: cargo run --example status [serial]

fn main() {
    env_logger::init();

    let serial = std::env::args().nth(1).and_then(|s| s.parse::<u32>().ok());
    let mut session = zed_sensors::CaptureSession::new(zed_sensors::SensorParams::verbose());

    if let Err(e) = session.open(serial) {
        eprintln!("Failed to open device: {}", e);
        std::process::exit(1);
    }

    println!("Serial:         {:?}", session.serial());
    match session.is_stream_enabled() {
        Ok(enabled) => println!("Stream enabled: {}", enabled),
        Err(e) => println!("Stream status:  {}", e),
    }
    match session.ping() {
        Ok(()) => println!("Ping:           ok"),
        Err(e) => println!("Ping:           {}", e),
    }

    session.close();
}

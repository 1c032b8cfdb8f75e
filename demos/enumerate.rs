//! List all connected ZED sensor hubs.

fn main() {
    env_logger::init();

    match zed_sensors::device::list_devices() {
        Ok(devices) => {
            println!("Found {} sensor hub(s):", devices.len());
            for (i, dev) in devices.iter().enumerate() {
                println!(
                    "  [{}] SN={}  PID={:04x}  Model={:?}  FW={}",
                    i,
                    dev.serial,
                    dev.product_id,
                    dev.model(),
                    dev.release
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

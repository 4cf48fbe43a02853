//! SLCAN Monitor
//!
//! Opens an SLCAN adapter, prints every received frame and sends a
//! tester-present request once a second.
//!
//! Usage: `slcan_monitor [PORT] [t5|t7|t8|me96]`

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use slcan_device::{CanFrame, DeviceConfig, DeviceEvent, SlcanDevice, TargetEcu};

fn main() {
    // Initialize logging
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_target(arg: Option<&str>) -> TargetEcu {
    match arg {
        Some("t5") => TargetEcu::Trionic5,
        Some("t7") => TargetEcu::Trionic7,
        Some("me96") => TargetEcu::Motronic96,
        _ => TargetEcu::Trionic8,
    }
}

fn run() -> slcan_device::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let port = match args.first() {
        Some(port) => port.clone(),
        None => {
            let ports = SlcanDevice::adapter_names()?;
            println!("Available ports: {:?}", ports);
            match ports.into_iter().next() {
                Some(port) => port,
                None => {
                    println!("Can not find a serial port");
                    return Ok(());
                }
            }
        }
    };

    let config = DeviceConfig::new(port)
        .with_target(parse_target(args.get(1).map(String::as_str)))
        .with_bypass_filters(true);
    let mut dev = SlcanDevice::new(config);

    let (tx, rx) = mpsc::channel();
    dev.set_frame_sink(move |frame: CanFrame| {
        let _ = tx.send(frame);
    });
    dev.set_event_sink(|event: &DeviceEvent| println!("{}", event));

    dev.open()?;
    println!("{}", dev);

    // Tester present, functional request
    let tester_present = CanFrame::new(0x7E0, &[0x01, 0x3E])?;

    println!("\nMonitoring CAN traffic (press Ctrl+C to stop)...\n");

    let mut next_send_time = Instant::now();
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(frame) => println!("RX  {}", frame),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_send_time {
            next_send_time = Instant::now() + Duration::from_secs(1);

            match dev.send(&tester_present) {
                Ok(()) => println!("TX  {}", tester_present),
                Err(e) => eprintln!("Send error: {}", e),
            }
        }
    }

    dev.close()
}

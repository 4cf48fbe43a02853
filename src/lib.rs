//! SLCAN Serial-to-CAN Driver for Rust
//!
//! This crate drives Lawicel/SLCAN compatible serial-to-CAN adapters for
//! Trionic and Motronic ECU tooling. It opens the serial line, negotiates the
//! bus speed for the target car network and delivers received frames from a
//! background reader thread.
//!
//! # Features
//!
//! - ASCII frame codec for 11-bit data frames (`t<ID><LEN><DATA>\r`)
//! - Automatic I-bus detection with P-bus and Trionic 5 fallback
//! - Identifier allow-list filtering with bypass
//! - Blocking wait for a single response identifier
//!
//! # Example
//!
//! ```no_run
//! use slcan_device::{CanFrame, DeviceConfig, SlcanDevice};
//! use std::time::Duration;
//!
//! fn main() -> slcan_device::Result<()> {
//!     // List candidate serial ports
//!     let ports = SlcanDevice::adapter_names()?;
//!     let Some(port) = ports.first() else {
//!         println!("No serial port found");
//!         return Ok(());
//!     };
//!
//!     let mut dev = SlcanDevice::new(DeviceConfig::new(port.as_str()).with_bypass_filters(true));
//!     dev.set_frame_sink(|frame: CanFrame| println!("RX  {}", frame));
//!     dev.open()?;
//!
//!     // Request and wait for a diagnostic response
//!     let request = CanFrame::new(0x7E0, &[0x02, 0x10, 0x92])?;
//!     let reply = dev.send_and_wait(&request, 0x7E8, Duration::from_millis(500))?;
//!     println!("Reply {}", reply);
//!
//!     dev.close()
//! }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod events;
pub mod filter;
pub mod frame;
pub mod reader;
pub mod structures;
pub mod traits;
pub mod transport;

// Re-export main types at crate root
pub use constants::{
    // Bus bit rates
    IBUS_BITRATE,
    PBUS_BITRATE,
    T5_BITRATE,
    // Serial defaults
    DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT,
};

pub use codec::{decode_frame, encode_command, encode_frame, LineFramer};
pub use config::DeviceConfig;
pub use device::SlcanDevice;
pub use error::{Result, SlcanError};
pub use events::{DeviceEvent, EventSink, FrameSink};
pub use filter::{AllowList, IdFilter};
pub use frame::CanFrame;
pub use reader::{PendingReply, ShutdownSignal};
pub use structures::{BusVariant, ConnectionState, TargetEcu};
pub use traits::CanDevice;
pub use transport::{Connector, PortSettings, SerialConnector, SerialTransport, Transport};

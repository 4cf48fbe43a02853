//! Device capability trait
//!
//! Higher-level tooling drives CAN adapters through `CanDevice` and never
//! sees the wire protocol behind it.

use std::time::Duration;

use crate::error::Result;
use crate::frame::CanFrame;

/// Capability set shared by CAN adapter drivers
pub trait CanDevice: Send {
    /// Bring the adapter onto the bus and start receiving
    fn open(&mut self) -> Result<()>;

    /// Leave the bus and release the adapter; safe to call repeatedly
    fn close(&mut self) -> Result<()>;

    /// Transmit one frame
    fn send(&mut self, frame: &CanFrame) -> Result<()>;

    /// Check if the channel is open
    fn is_open(&self) -> bool;

    /// Block until a frame with `id` is received or `timeout` expires
    fn wait_for_message(&self, id: u32, timeout: Duration) -> Result<CanFrame>;
}

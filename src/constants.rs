//! SLCAN protocol constants
//!
//! Wire commands, bus bitrates and the timing values used during
//! bus speed negotiation.

use std::time::Duration;

// ============================================================================
// Wire Format
// ============================================================================

/// Line terminator sent after every command
pub const SLCAN_CR: u8 = b'\r';
/// Line feed, accepted as a terminator on receive
pub const SLCAN_LF: u8 = b'\n';
/// Bell, sent by the adapter when it rejects a command
pub const SLCAN_BELL: u8 = 0x07;

/// Leading character of a standard data frame line
pub const DATA_FRAME_MARKER: char = 't';

/// Maximum line length kept by the framer (marker + extended id + dlc + data + slack)
pub const SLCAN_MTU: usize = 1 + 8 + 1 + 16 + 16;

/// Length of an inbound data frame line: marker + 3 id digits + dlc + 8 data bytes
pub const DATA_LINE_LEN: usize = 1 + 3 + 1 + CAN_MAX_DLEN * 2;

// ============================================================================
// CAN Payload Definitions
// ============================================================================

/// Largest identifier representable in 3 hex digits
pub const CAN_MAX_ID: u32 = 0xFFF;
/// Maximum data length for classic CAN
pub const CAN_MAX_DLEN: usize = 8;

// ============================================================================
// Commands
// ============================================================================

/// Select I-bus speed class (47,619 bit/s)
pub const CMD_SPEED_IBUS: &str = "S0";
/// Select P-bus speed class (500 kbit/s)
pub const CMD_SPEED_PBUS: &str = "S6";
/// Select Trionic 5 speed class (615,384 bit/s)
pub const CMD_SPEED_T5: &str = "S9";
/// Open the CAN channel
pub const CMD_OPEN: &str = "O";
/// Close the CAN channel
pub const CMD_CLOSE: &str = "C";

// ============================================================================
// Bus Bitrates
// ============================================================================

/// I-bus bitrate in bit/s
pub const IBUS_BITRATE: u32 = 47_619;
/// P-bus bitrate in bit/s
pub const PBUS_BITRATE: u32 = 500_000;
/// Trionic 5 bitrate in bit/s
pub const T5_BITRATE: u32 = 615_384;

// ============================================================================
// Serial Settings and Timing
// ============================================================================

/// Default serial baud rate for the adapter
pub const DEFAULT_BAUD_RATE: u32 = 3_000_000;

/// Read timeout for the I-bus acknowledgment read
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(10);
/// Delay between a speed-select command and discarding the input buffer
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);
/// Default read timeout for the background reader
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Upper bound on how long close waits for the reader thread
pub const READER_STOP_TIMEOUT: Duration = Duration::from_millis(500);

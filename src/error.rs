//! Error types for the SLCAN driver
//!
//! One error enum covers the whole driver. Lifecycle failures are
//! surfaced from `open`, while read and decode failures stay inside
//! the reader thread where they are logged and skipped.

use thiserror::Error;

/// Result type alias for SLCAN operations
pub type Result<T> = std::result::Result<T, SlcanError>;

/// Error types for SLCAN operations
#[derive(Error, Debug)]
pub enum SlcanError {
    /// Serial port error from the serialport library
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on the serial line
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No adapter port name has been set
    #[error("No SLCAN adapter selected")]
    NotConfigured,

    /// The serial port could not be opened
    #[error("Unable to open serial port {port}: {source}")]
    Access {
        port: String,
        source: serialport::Error,
    },

    /// The adapter did not acknowledge the speed-select command in time
    #[error("Bus speed negotiation timed out")]
    NegotiationTimeout,

    /// Neither bus speed could be brought up
    #[error("SLCAN cannot connect to a CAN bus on {port}")]
    OpenFailed { port: String },

    /// Device is not open
    #[error("Device is not open")]
    DeviceNotOpen,

    /// Timeout during read operation
    #[error("Read timeout")]
    ReadTimeout,

    /// Data frame line shorter than the fixed 8-byte layout
    #[error("Frame line too short: {len} characters, need {expected}")]
    LineTooShort { len: usize, expected: usize },

    /// A hex field of a data frame line could not be parsed
    #[error("Invalid hex in {field}: {text:?}")]
    InvalidHex { field: &'static str, text: String },

    /// Identifier does not fit in 3 hex digits
    #[error("CAN identifier 0x{0:X} exceeds 0xFFF")]
    IdOutOfRange(u32),

    /// More than 8 data bytes
    #[error("Data too long: {0} bytes (max 8)")]
    DataTooLong(usize),

    /// No frame with the requested identifier arrived in time
    #[error("Timed out waiting for frame 0x{id:03X}")]
    WaitTimeout { id: u32 },
}

impl SlcanError {
    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            SlcanError::ReadTimeout
            | SlcanError::NegotiationTimeout
            | SlcanError::WaitTimeout { .. } => true,
            SlcanError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Check if this error is one of the errors `open` reports
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            SlcanError::NotConfigured | SlcanError::Access { .. } | SlcanError::OpenFailed { .. }
        )
    }

    /// Check if this error is a malformed line from the adapter
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SlcanError::LineTooShort { .. } | SlcanError::InvalidHex { .. }
        )
    }
}

//! SLCAN ASCII line codec
//!
//! Frame formats handled here:
//!   Transmit: t<ID:3hex><DLC:1hex><DATA:2hex*DLC>\r
//!   Receive:  t<ID:3hex><DLC:1hex><DATA:2hex*8>\r
//!
//! Received lines are always decoded with a fixed 8-byte payload. The DLC
//! digit is carried on the wire but not interpreted.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::ops::Range;

use crate::constants::{
    CAN_MAX_DLEN, DATA_FRAME_MARKER, DATA_LINE_LEN, SLCAN_BELL, SLCAN_CR, SLCAN_LF, SLCAN_MTU,
};
use crate::error::{Result, SlcanError};
use crate::frame::CanFrame;

/// Encode a CAN frame as a transmit line
///
/// Returns ASCII bytes including the trailing `\r`.
pub fn encode_frame(frame: &CanFrame) -> Vec<u8> {
    let mut cmd = String::with_capacity(DATA_LINE_LEN + 1);

    cmd.push(DATA_FRAME_MARKER);
    cmd.push_str(&format!("{:03X}", frame.id()));
    cmd.push_str(&format!("{:X}", frame.len()));
    for byte in frame.data() {
        cmd.push_str(&format!("{:02X}", byte));
    }

    cmd.push('\r');
    cmd.into_bytes()
}

/// Encode a bare command (`S6`, `O`, ...) with its terminator
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(command.len() + 1);
    buf.extend_from_slice(command.as_bytes());
    buf.push(SLCAN_CR);
    buf
}

/// Decode a received line
///
/// Returns `Ok(None)` for anything that is not a data frame line (status
/// replies, prompts, other frame kinds, empty lines). Data frame lines that
/// cannot be parsed return an error the caller can log and skip.
///
/// Examples:
///   `t12380102030405060708` -> ID=0x123, 8 bytes 01..08
///   `z`                     -> Ok(None)
pub fn decode_frame(line: &str) -> Result<Option<CanFrame>> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if !line.starts_with(DATA_FRAME_MARKER) {
        return Ok(None);
    }

    if line.len() < DATA_LINE_LEN {
        return Err(SlcanError::LineTooShort {
            len: line.len(),
            expected: DATA_LINE_LEN,
        });
    }

    let id = hex_field(line, 1..4, "identifier")?;

    // Position 4 is the DLC digit, skipped on purpose
    let mut data = [0u8; CAN_MAX_DLEN];
    for (i, byte) in data.iter_mut().enumerate() {
        let start = 5 + i * 2;
        *byte = hex_field(line, start..start + 2, "data")? as u8;
    }

    Ok(Some(CanFrame::from_payload(id, data)))
}

fn hex_field(line: &str, range: Range<usize>, field: &'static str) -> Result<u32> {
    let text = line.get(range).unwrap_or(line);
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SlcanError::InvalidHex {
            field,
            text: text.to_string(),
        });
    }
    u32::from_str_radix(text, 16).map_err(|_| SlcanError::InvalidHex {
        field,
        text: text.to_string(),
    })
}

/// Buffered line framer over the serial byte stream
///
/// Splits incoming bytes at CR or LF. A bell from the adapter drops the
/// partial line, and lines longer than the MTU are thrown away up to the
/// next terminator.
#[derive(Debug, Default)]
pub struct LineFramer {
    line: Vec<u8>,
    ready: VecDeque<String>,
    overflow: bool,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the transport
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                SLCAN_CR | SLCAN_LF => {
                    if self.overflow {
                        self.overflow = false;
                    } else {
                        self.ready
                            .push_back(String::from_utf8_lossy(&self.line).into_owned());
                    }
                    self.line.clear();
                }
                SLCAN_BELL => self.line.clear(),
                _ if self.overflow => {}
                _ => {
                    if self.line.len() >= SLCAN_MTU {
                        self.overflow = true;
                        self.line.clear();
                    } else {
                        self.line.push(b);
                    }
                }
            }
        }
    }

    /// Take the next complete line, without its terminator
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Bytes received since the last terminator
    pub fn partial(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.line.clear();
        self.ready.clear();
        self.overflow = false;
    }

    /// Read from `src` until a complete line is available
    ///
    /// A read that times out (or returns no bytes) ends the call with
    /// `SlcanError::ReadTimeout`; buffered bytes are kept for the next call.
    pub fn read_line<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<String> {
        let mut chunk = [0u8; 64];
        loop {
            if let Some(line) = self.next_line() {
                return Ok(line);
            }

            match src.read(&mut chunk) {
                Ok(0) => return Err(SlcanError::ReadTimeout),
                Ok(n) => self.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(SlcanError::ReadTimeout)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

//! CAN frame value
//!
//! This module provides the `CanFrame` struct exchanged between the driver
//! and its callers. Frames carry an identifier of up to 3 hex digits and at
//! most 8 data bytes.

use crate::constants::{CAN_MAX_DLEN, CAN_MAX_ID};
use crate::error::{Result, SlcanError};

/// Classic CAN data frame
///
/// Fields are private so a frame cannot change after it has been built or
/// decoded. Bytes past `len()` are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanFrame {
    id: u32,
    len: u8,
    data: [u8; CAN_MAX_DLEN],
}

impl CanFrame {
    /// Create a new CAN frame with the specified ID and data
    ///
    /// # Arguments
    /// * `id` - CAN identifier (0 to 0xFFF)
    /// * `data` - Frame data (up to 8 bytes)
    pub fn new(id: u32, data: &[u8]) -> Result<Self> {
        if id > CAN_MAX_ID {
            return Err(SlcanError::IdOutOfRange(id));
        }
        if data.len() > CAN_MAX_DLEN {
            return Err(SlcanError::DataTooLong(data.len()));
        }

        let mut buf = [0u8; CAN_MAX_DLEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            len: data.len() as u8,
            data: buf,
        })
    }

    /// Build a full 8-byte frame; used by the decoder
    pub(crate) fn from_payload(id: u32, data: [u8; CAN_MAX_DLEN]) -> Self {
        Self {
            id: id & CAN_MAX_ID,
            len: CAN_MAX_DLEN as u8,
            data,
        }
    }

    /// CAN identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of data bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True for a frame without data bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frame data as a slice of `len()` bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Get a single data byte, zero past the end of the payload
    pub fn byte(&self, index: usize) -> u8 {
        if index < self.len() {
            self.data[index]
        } else {
            0
        }
    }

    /// Payload as a big-endian integer, first byte most significant
    ///
    /// Diagnostic tooling commonly treats the 8 data bytes as one word.
    pub fn data_u64(&self) -> u64 {
        u64::from_be_bytes(self.data)
    }
}

impl std::fmt::Display for CanFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data_str = self
            .data()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");

        write!(f, "{:>3X}   [{}]  {}", self.id, self.len, data_str)
    }
}

impl std::fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanFrame")
            .field("id", &format_args!("0x{:03X}", self.id))
            .field("len", &self.len)
            .field("data", &format_args!("{:02X?}", self.data()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = [0x12, 0x34, 0x56];
        let frame = CanFrame::new(0x7E0, &data).unwrap();

        assert_eq!(frame.id(), 0x7E0);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.data(), &data);
        assert_eq!(frame.byte(2), 0x56);
        assert_eq!(frame.byte(5), 0);
    }

    #[test]
    fn test_empty_frame() {
        let frame = CanFrame::new(0x000, &[]).unwrap();
        assert!(frame.is_empty());
        assert!(frame.data().is_empty());
    }

    #[test]
    fn test_frame_limits() {
        assert!(CanFrame::new(0xFFF, &[0; 8]).is_ok());
        assert!(matches!(
            CanFrame::new(0x1000, &[]),
            Err(SlcanError::IdOutOfRange(0x1000))
        ));
        assert!(matches!(
            CanFrame::new(0x123, &[0; 9]),
            Err(SlcanError::DataTooLong(9))
        ));
    }

    #[test]
    fn test_data_u64() {
        let frame = CanFrame::new(0x258, &[0x01, 0x02, 0, 0, 0, 0, 0, 0xFF]).unwrap();
        assert_eq!(frame.data_u64(), 0x0102_0000_0000_00FF);
    }

    #[test]
    fn test_display() {
        let frame = CanFrame::new(0x7E8, &[0x02, 0x7E, 0x00]).unwrap();
        assert_eq!(frame.to_string(), "7E8   [3]  02 7E 00");
    }
}

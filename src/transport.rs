//! Serial transport seam
//!
//! The driver talks to the adapter through the `Transport` trait so the
//! lifecycle and reader can run against any full-duplex byte stream. The
//! production implementation wraps a `serialport` handle.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, FlowControl, SerialPort};

use crate::error::{Result, SlcanError};

/// Full-duplex byte stream to the adapter
pub trait Transport: Read + Write + Send {
    /// Set the timeout for blocking reads
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Discard pending input and output bytes
    fn discard_buffers(&mut self) -> Result<()>;

    /// Open a second handle onto the same line, used by the reader thread
    fn try_clone_transport(&self) -> Result<Box<dyn Transport>>;
}

/// Serial line settings applied when the port is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Initial read timeout
    pub read_timeout: Duration,
}

/// Opens transports by port name
pub trait Connector: Send {
    /// Open `port` with the given settings
    ///
    /// Any failure to open is reported as `SlcanError::Access`.
    fn connect(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn Transport>>;
}

/// Connector for local serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn Transport>> {
        let serial = serialport::new(port, settings.baud_rate)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| SlcanError::Access {
                port: port.to_string(),
                source,
            })?;

        Ok(Box::new(SerialTransport::new(serial)))
    }
}

/// `Transport` over a `serialport` handle
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port.set_timeout(timeout)?;
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn try_clone_transport(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::new(self.port.try_clone()?)))
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.port.name())
            .finish()
    }
}

/// List the names of serial ports present on this machine
pub fn available_port_names() -> Result<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

/// In-memory adapter used by the driver tests
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::Duration;

    use super::{Connector, PortSettings, Transport};
    use crate::error::{Result, SlcanError};

    #[derive(Debug, Default)]
    pub struct MockState {
        /// Every byte written by the driver
        pub written: Vec<u8>,
        /// Bytes waiting to be read
        pub rx: VecDeque<u8>,
        /// Bytes that become readable after the next discard
        pub rx_after_discard: VecDeque<u8>,
        /// Fail every write with a broken pipe
        pub fail_writes: bool,
        /// Number of successful connects
        pub connects: usize,
        /// Handles currently alive
        pub live_handles: usize,
        /// Number of discard calls
        pub discards: usize,
    }

    #[derive(Clone, Default)]
    pub struct MockAdapter {
        state: Arc<Mutex<MockState>>,
        deny_access: bool,
    }

    impl MockAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Adapter whose port cannot be opened
        pub fn denied() -> Self {
            Self {
                deny_access: true,
                ..Self::default()
            }
        }

        pub fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap()
        }

        /// Queue bytes for the reader
        pub fn feed(&self, bytes: &[u8]) {
            self.state().rx.extend(bytes.iter().copied());
        }

        /// Reply the adapter sends once the driver discards its buffers
        pub fn reply_after_discard(&self, bytes: &[u8]) {
            self.state().rx_after_discard.extend(bytes.iter().copied());
        }

        pub fn written(&self) -> String {
            String::from_utf8_lossy(&self.state().written).into_owned()
        }
    }

    impl Connector for MockAdapter {
        fn connect(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn Transport>> {
            if self.deny_access {
                return Err(SlcanError::Access {
                    port: port.to_string(),
                    source: serialport::Error::new(
                        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
                        "permission denied",
                    ),
                });
            }
            let mut state = self.state();
            state.connects += 1;
            state.live_handles += 1;
            Ok(Box::new(MockLink {
                state: self.state.clone(),
                timeout: settings.read_timeout,
            }))
        }
    }

    pub struct MockLink {
        state: Arc<Mutex<MockState>>,
        timeout: Duration,
    }

    impl Read for MockLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            {
                let mut state = self.state.lock().unwrap();
                if !state.rx.is_empty() {
                    let n = buf.len().min(state.rx.len());
                    for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            std::thread::sleep(self.timeout);
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    impl Write for MockLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut state = self.state.lock().unwrap();
            if state.fail_writes {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            state.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockLink {
        fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn discard_buffers(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.discards += 1;
            state.rx.clear();
            let late = std::mem::take(&mut state.rx_after_discard);
            state.rx.extend(late);
            Ok(())
        }

        fn try_clone_transport(&self) -> Result<Box<dyn Transport>> {
            self.state.lock().unwrap().live_handles += 1;
            Ok(Box::new(MockLink {
                state: self.state.clone(),
                timeout: self.timeout,
            }))
        }
    }

    impl Drop for MockLink {
        fn drop(&mut self) {
            if let Ok(mut state) = self.state.lock() {
                state.live_handles -= 1;
            }
        }
    }
}

//! SLCAN device implementation
//!
//! This module provides the `SlcanDevice` struct, which owns the serial
//! transport, negotiates the bus speed for the configured target and runs
//! the background reader while the channel is open.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::codec::{encode_command, encode_frame, LineFramer};
use crate::config::DeviceConfig;
use crate::constants::*;
use crate::error::{Result, SlcanError};
use crate::events::{DeviceEvent, EventSink, FrameSink};
use crate::filter::{AllowList, IdFilter};
use crate::frame::CanFrame;
use crate::reader::{PendingReply, ReaderContext, ReaderHandle, Waiters};
use crate::structures::{BusVariant, ConnectionState, TargetEcu};
use crate::traits::CanDevice;
use crate::transport::{available_port_names, Connector, PortSettings, SerialConnector, Transport};

/// SLCAN adapter handle
///
/// # Example
///
/// ```no_run
/// use slcan_device::{CanFrame, DeviceConfig, SlcanDevice};
///
/// let mut dev = SlcanDevice::new(DeviceConfig::new("/dev/ttyACM0").with_bypass_filters(true));
/// dev.set_frame_sink(|frame: CanFrame| println!("RX  {}", frame));
///
/// // Tries the I-bus first, then falls back to the P-bus
/// dev.open()?;
/// println!("{}", dev.state());
///
/// dev.send(&CanFrame::new(0x7E0, &[0x02, 0x10, 0x92])?)?;
/// dev.close()?;
/// # Ok::<(), slcan_device::SlcanError>(())
/// ```
pub struct SlcanDevice {
    /// Adapter and bus settings
    config: DeviceConfig,
    /// Opens the serial port
    connector: Box<dyn Connector>,
    /// Write side of the serial port, present from connect until close
    port: Option<Box<dyn Transport>>,
    /// Current connection state
    state: ConnectionState,
    /// Filter handed to each new reader
    filter: IdFilter,
    /// Receives accepted frames
    sink: Option<Arc<dyn FrameSink>>,
    /// Receives device notifications
    events: Option<Arc<dyn EventSink>>,
    /// Pending `wait_for_message` calls
    waiters: Arc<Waiters>,
    /// Running reader thread
    reader: Option<ReaderHandle>,
}

impl SlcanDevice {
    /// Create a device that opens local serial ports
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_connector(config, SerialConnector)
    }

    /// Create a device that opens its transport through `connector`
    pub fn with_connector(config: DeviceConfig, connector: impl Connector + 'static) -> Self {
        let mut filter = IdFilter::default();
        filter.set_bypass(config.bypass_filters);

        Self {
            config,
            connector: Box::new(connector),
            port: None,
            state: ConnectionState::Closed,
            filter,
            sink: None,
            events: None,
            waiters: Arc::new(Waiters::default()),
            reader: None,
        }
    }

    /// List serial ports an adapter could be attached to
    pub fn adapter_names() -> Result<Vec<String>> {
        available_port_names()
    }

    /// Select the serial port used by the next `open`
    pub fn set_selected_adapter(&mut self, port: impl Into<String>) {
        self.config.port = port.into();
    }

    /// Set the serial baud rate used by the next `open`
    pub fn set_forced_baud_rate(&mut self, baud_rate: u32) {
        self.config.baud_rate = baud_rate;
    }

    pub fn forced_baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    pub fn set_target(&mut self, target: TargetEcu) {
        self.config.target = target;
    }

    pub fn set_use_only_pbus(&mut self, use_only_pbus: bool) {
        self.config.use_only_pbus = use_only_pbus;
    }

    /// Deliver every frame regardless of the allow-set
    ///
    /// Filter changes apply to the reader started by the next `open`.
    pub fn set_bypass_filters(&mut self, bypass: bool) {
        self.config.bypass_filters = bypass;
        self.filter.set_bypass(bypass);
    }

    pub fn bypass_filters(&self) -> bool {
        self.filter.is_bypass()
    }

    /// Install the allow-set consulted when bypass is off
    pub fn set_allow_list(&mut self, allowed: Arc<dyn AllowList>) {
        self.filter.set_allow_list(allowed);
    }

    /// Install the receiver for accepted frames
    pub fn set_frame_sink(&mut self, sink: impl FrameSink + 'static) {
        self.sink = Some(Arc::new(sink));
    }

    /// Install the receiver for connection notifications
    pub fn set_event_sink(&mut self, sink: impl EventSink + 'static) {
        self.events = Some(Arc::new(sink));
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Open the serial port and negotiate the bus speed
    ///
    /// Unless the target is a Trionic 5 or only the P-bus is allowed, the
    /// I-bus is tried first and must answer within the handshake timeout.
    /// Otherwise the P-bus (or T5) speed is selected and the channel opened
    /// without waiting for an acknowledgment.
    pub fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            self.close()?;
        }

        if !self.config.is_configured() {
            self.notify(DeviceEvent::Error(
                "SLCAN doesn't seem to be connected to your computer.".to_string(),
            ));
            return Err(SlcanError::NotConfigured);
        }

        let port_name = self.config.port.clone();
        debug!("Opening com: {}", port_name);

        let settings = PortSettings {
            baud_rate: self.config.baud_rate,
            read_timeout: HANDSHAKE_TIMEOUT,
        };
        match self.connector.connect(&port_name, &settings) {
            Ok(port) => self.port = Some(port),
            Err(e) => {
                self.notify(DeviceEvent::Error(format!(
                    "Unable to open {}: {}",
                    port_name, e
                )));
                return Err(e);
            }
        }

        if self.config.tries_ibus() {
            self.state = ConnectionState::Negotiating(BusVariant::IBus);
            match self.negotiate_ibus() {
                Ok(()) => {
                    self.finish_open(BusVariant::IBus);
                    return Ok(());
                }
                Err(e) => debug!("Unable to connect to the I-BUS: {}", e),
            }
        }

        let bus = BusVariant::fallback_for(self.config.target);
        self.state = ConnectionState::Negotiating(bus);
        match self.bring_up(bus) {
            Ok(()) => {
                self.finish_open(bus);
                Ok(())
            }
            Err(e) => {
                warn!("Unable to connect to the {}: {}", bus, e);
                self.notify(DeviceEvent::Error(
                    "SLCAN cannot connect to a CAN bus.".to_string(),
                ));
                self.close()?;
                Err(SlcanError::OpenFailed { port: port_name })
            }
        }
    }

    /// Close the channel, stop the reader and release the serial port
    ///
    /// If the reader does not stop within `READER_STOP_TIMEOUT` it is left
    /// running with its own handle, and the port stays open until it exits.
    /// A following `open` can then fail with `SlcanError::Access`.
    pub fn close(&mut self) -> Result<()> {
        if let Some(port) = self.port.as_mut() {
            // Best effort, the adapter may already be gone
            let _ = port
                .write_all(&encode_command(CMD_CLOSE))
                .and_then(|_| port.flush());
        }

        if let Some(reader) = self.reader.take() {
            reader.stop(READER_STOP_TIMEOUT);
        }

        if self.port.take().is_some() {
            debug!("Closed {}", self.config.port);
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }

    /// Send a CAN frame
    pub fn send(&mut self, frame: &CanFrame) -> Result<()> {
        if !self.state.is_open() {
            return Err(SlcanError::DeviceNotOpen);
        }

        let line = encode_frame(frame);
        let port = self.port_mut()?;
        port.write_all(&line)?;
        port.flush()?;
        Ok(())
    }

    /// Wait for the next frame with identifier `id`
    ///
    /// Only frames decoded after the call starts are seen, and the allow-set
    /// does not apply to them. Use `expect_message` or `send_and_wait` when
    /// the frame answers a request.
    pub fn wait_for_message(&self, id: u32, timeout: Duration) -> Result<CanFrame> {
        self.expect_message(id)?.wait(timeout)
    }

    /// Start collecting the next frame with identifier `id`
    ///
    /// Register before sending a request so a fast reply is not missed.
    pub fn expect_message(&self, id: u32) -> Result<PendingReply> {
        if !self.state.is_open() {
            return Err(SlcanError::DeviceNotOpen);
        }
        Ok(PendingReply::register(&self.waiters, id))
    }

    /// Send `frame` and wait for the reply with identifier `reply_id`
    pub fn send_and_wait(
        &mut self,
        frame: &CanFrame,
        reply_id: u32,
        timeout: Duration,
    ) -> Result<CanFrame> {
        let reply = self.expect_message(reply_id)?;
        self.send(frame)?;
        reply.wait(timeout)
    }

    /// Select the I-bus speed and wait for one line from the adapter
    ///
    /// Only the first line counts as the acknowledgment. Anything after it
    /// in the handshake buffer is dropped along with the flush that follows
    /// the reader start.
    fn negotiate_ibus(&mut self) -> Result<()> {
        self.write_command(CMD_SPEED_IBUS)?;
        thread::sleep(SETTLE_DELAY);

        let port = self.port_mut()?;
        port.discard_buffers()?;

        let mut framer = LineFramer::new();
        match framer.read_line(&mut **port) {
            Ok(_) => {}
            Err(e) if e.is_timeout() => return Err(SlcanError::NegotiationTimeout),
            Err(e) => return Err(e),
        }

        debug!("Connected to CAN at {} bit/s", IBUS_BITRATE);
        self.start_reader()?;

        thread::sleep(SETTLE_DELAY);
        self.port_mut()?.discard_buffers()
    }

    /// Select the fallback bus speed and open the channel
    fn bring_up(&mut self, bus: BusVariant) -> Result<()> {
        self.write_command(bus.speed_command())?;
        debug!("Selected CAN at {} bit/s", bus.bitrate());
        thread::sleep(SETTLE_DELAY);

        self.port_mut()?.discard_buffers()?;
        self.start_reader()?;
        self.write_command(CMD_OPEN)
    }

    fn start_reader(&mut self) -> Result<()> {
        if let Some(stale) = self.reader.take() {
            stale.stop(READER_STOP_TIMEOUT);
        }

        let mut reader_port = self.port_mut()?.try_clone_transport()?;
        reader_port.set_read_timeout(self.config.read_timeout)?;

        let ctx = ReaderContext {
            port_name: self.config.port.clone(),
            filter: self.filter.clone(),
            sink: self.sink.clone(),
            waiters: self.waiters.clone(),
            read_timeout: self.config.read_timeout,
        };
        self.reader = Some(ReaderHandle::spawn(reader_port, ctx)?);
        Ok(())
    }

    fn finish_open(&mut self, bus: BusVariant) {
        self.state = ConnectionState::Open(bus, bus.bitrate());
        self.notify(DeviceEvent::Info(format!(
            "Connected to CAN {} using {}",
            bus, self.config.port
        )));
    }

    fn write_command(&mut self, command: &str) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(&encode_command(command))?;
        port.flush()?;
        Ok(())
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.port.as_mut().ok_or(SlcanError::DeviceNotOpen)
    }

    fn notify(&self, event: DeviceEvent) {
        match &event {
            DeviceEvent::Info(msg) => info!("{}", msg),
            DeviceEvent::Error(msg) => warn!("{}", msg),
        }
        if let Some(events) = &self.events {
            events.notify(&event);
        }
    }
}

impl CanDevice for SlcanDevice {
    fn open(&mut self) -> Result<()> {
        SlcanDevice::open(self)
    }

    fn close(&mut self) -> Result<()> {
        SlcanDevice::close(self)
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        SlcanDevice::send(self, frame)
    }

    fn is_open(&self) -> bool {
        SlcanDevice::is_open(self)
    }

    fn wait_for_message(&self, id: u32, timeout: Duration) -> Result<CanFrame> {
        SlcanDevice::wait_for_message(self, id, timeout)
    }
}

impl std::fmt::Display for SlcanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.config.is_configured() {
            write!(f, "SLCAN {} ({})", self.config.port, self.state)
        } else {
            write!(f, "SLCAN (no adapter selected)")
        }
    }
}

impl std::fmt::Debug for SlcanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlcanDevice")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("filter", &self.filter)
            .field("reader_running", &self.reader.is_some())
            .finish()
    }
}

impl Drop for SlcanDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

//! Device configuration

use std::time::Duration;

use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::structures::TargetEcu;

/// SLCAN device configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Serial port name (e.g., "/dev/ttyACM0", "COM3"); empty means not selected
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Target ECU family, decides the fallback bus
    pub target: TargetEcu,
    /// Skip the I-bus attempt
    pub use_only_pbus: bool,
    /// Deliver every received frame regardless of the allow-set
    pub bypass_filters: bool,
    /// Read timeout used by the background reader
    pub read_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            target: TargetEcu::default(),
            use_only_pbus: false,
            bypass_filters: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    /// Configuration for the given serial port with default settings
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_target(mut self, target: TargetEcu) -> Self {
        self.target = target;
        self
    }

    pub fn with_only_pbus(mut self, use_only_pbus: bool) -> Self {
        self.use_only_pbus = use_only_pbus;
        self
    }

    pub fn with_bypass_filters(mut self, bypass: bool) -> Self {
        self.bypass_filters = bypass;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Whether an adapter port has been selected
    pub fn is_configured(&self) -> bool {
        !self.port.trim().is_empty()
    }

    /// Whether open should try the I-bus before the fallback bus
    pub fn tries_ibus(&self) -> bool {
        !self.use_only_pbus && self.target != TargetEcu::Trionic5
    }
}

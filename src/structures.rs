//! Connection state structures
//!
//! Bus variants, target ECU families and the connection state reported by
//! the device.

use crate::constants::{
    CMD_SPEED_IBUS, CMD_SPEED_PBUS, CMD_SPEED_T5, IBUS_BITRATE, PBUS_BITRATE, T5_BITRATE,
};

/// CAN bus segment the adapter is negotiated onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusVariant {
    /// Powertrain bus, 500 kbit/s
    PBus,
    /// Instrument bus, 47,619 bit/s
    IBus,
    /// Trionic 5 bus, 615,384 bit/s
    TrionicFive,
}

impl BusVariant {
    /// Speed-select command for this bus
    pub fn speed_command(&self) -> &'static str {
        match self {
            BusVariant::PBus => CMD_SPEED_PBUS,
            BusVariant::IBus => CMD_SPEED_IBUS,
            BusVariant::TrionicFive => CMD_SPEED_T5,
        }
    }

    /// CAN bitrate in bit/s
    pub fn bitrate(&self) -> u32 {
        match self {
            BusVariant::PBus => PBUS_BITRATE,
            BusVariant::IBus => IBUS_BITRATE,
            BusVariant::TrionicFive => T5_BITRATE,
        }
    }

    /// Bus used when the I-bus handshake is skipped or fails
    pub fn fallback_for(target: TargetEcu) -> Self {
        if target == TargetEcu::Trionic5 {
            BusVariant::TrionicFive
        } else {
            BusVariant::PBus
        }
    }
}

impl std::fmt::Display for BusVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BusVariant::PBus => "P-BUS",
            BusVariant::IBus => "I-BUS",
            BusVariant::TrionicFive => "T5",
        };
        write!(f, "{}", name)
    }
}

/// Target ECU family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetEcu {
    Trionic5,
    Trionic7,
    #[default]
    Trionic8,
    Motronic96,
}

/// Connection state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Transport released, reader stopped
    #[default]
    Closed,
    /// Transport open, speed selection in progress
    Negotiating(BusVariant),
    /// Channel open at the given bus and bitrate
    Open(BusVariant, u32),
}

impl ConnectionState {
    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open(..))
    }

    /// Bus variant, if negotiating or open
    pub fn bus(&self) -> Option<BusVariant> {
        match self {
            ConnectionState::Closed => None,
            ConnectionState::Negotiating(bus) | ConnectionState::Open(bus, _) => Some(*bus),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Negotiating(bus) => write!(f, "Negotiating {}", bus),
            ConnectionState::Open(bus, bitrate) => write!(f, "Open {} at {} bit/s", bus, bitrate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_commands() {
        assert_eq!(BusVariant::IBus.speed_command(), "S0");
        assert_eq!(BusVariant::PBus.speed_command(), "S6");
        assert_eq!(BusVariant::TrionicFive.speed_command(), "S9");
    }

    #[test]
    fn test_bus_bitrates() {
        assert_eq!(BusVariant::IBus.bitrate(), 47_619);
        assert_eq!(BusVariant::PBus.bitrate(), 500_000);
        assert_eq!(BusVariant::TrionicFive.bitrate(), 615_384);
    }

    #[test]
    fn test_fallback_bus() {
        assert_eq!(
            BusVariant::fallback_for(TargetEcu::Trionic5),
            BusVariant::TrionicFive
        );
        assert_eq!(BusVariant::fallback_for(TargetEcu::Trionic8), BusVariant::PBus);
        assert_eq!(BusVariant::fallback_for(TargetEcu::Motronic96), BusVariant::PBus);
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Closed.is_open());
        assert!(!ConnectionState::Negotiating(BusVariant::IBus).is_open());
        let open = ConnectionState::Open(BusVariant::PBus, 500_000);
        assert!(open.is_open());
        assert_eq!(open.bus(), Some(BusVariant::PBus));
        assert_eq!(open.to_string(), "Open P-BUS at 500000 bit/s");
    }
}

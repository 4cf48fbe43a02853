//! Caller-facing sinks for received frames and device notifications

use crate::frame::CanFrame;

/// Receives frames accepted by the reader thread
///
/// Called on the reader thread; implementations should hand the frame off
/// quickly. Any `Fn(CanFrame) + Send + Sync` closure is a sink, so an
/// `mpsc::Sender` can be wrapped as `move |f| { let _ = tx.send(f); }`.
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: CanFrame);
}

impl<F> FrameSink for F
where
    F: Fn(CanFrame) + Send + Sync,
{
    fn deliver(&self, frame: CanFrame) {
        self(frame)
    }
}

/// Informational and error messages about the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Info(String),
    Error(String),
}

impl DeviceEvent {
    pub fn message(&self) -> &str {
        match self {
            DeviceEvent::Info(msg) | DeviceEvent::Error(msg) => msg,
        }
    }
}

impl std::fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::Info(msg) => write!(f, "{}", msg),
            DeviceEvent::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Receives device notifications
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &DeviceEvent);
}

impl<F> EventSink for F
where
    F: Fn(&DeviceEvent) + Send + Sync,
{
    fn notify(&self, event: &DeviceEvent) {
        self(event)
    }
}

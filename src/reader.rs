//! Background reader thread
//!
//! One reader runs per open session. It owns a cloned transport handle,
//! pulls lines through a `LineFramer`, decodes data frames and hands the
//! accepted ones to the frame sink. Errors never leave the thread: they are
//! logged and the loop carries on. Shutdown is cooperative; the signal is
//! checked once per line read, so the loop notices it within one read
//! timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::codec::{decode_frame, LineFramer};
use crate::error::{Result, SlcanError};
use crate::events::FrameSink;
use crate::filter::IdFilter;
use crate::frame::CanFrame;
use crate::transport::Transport;

/// Name given to reader threads
pub const READER_THREAD_NAME: &str = "slcan-reader";

/// Cancellation token shared by the device and its reader thread
///
/// A new signal is created for every session, so a reader left over from an
/// earlier session can never be revived by a later open.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the reader to stop
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Waiter {
    token: u64,
    id: u32,
    tx: Sender<CanFrame>,
}

/// One-shot requests for the next frame with a given identifier
#[derive(Default)]
pub(crate) struct Waiters {
    next_token: AtomicU64,
    slots: Mutex<Vec<Waiter>>,
}

impl Waiters {
    fn slots(&self) -> MutexGuard<'_, Vec<Waiter>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in `id`; returns a token for `cancel`
    pub fn register(&self, id: u32) -> (u64, Receiver<CanFrame>) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.slots().push(Waiter { token, id, tx });
        (token, rx)
    }

    pub fn cancel(&self, token: u64) {
        self.slots().retain(|w| w.token != token);
    }

    /// Complete every waiter registered for the frame's identifier
    pub fn offer(&self, frame: &CanFrame) {
        self.slots().retain(|w| {
            if w.id != frame.id() {
                return true;
            }
            let _ = w.tx.send(*frame);
            false
        });
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.slots().len()
    }
}

/// A registered interest in the next frame with one identifier
///
/// Frames decoded after the reply is registered are kept until `wait` is
/// called, so a request can be sent between the two. Dropping the reply
/// unregisters it.
pub struct PendingReply {
    id: u32,
    token: u64,
    rx: Receiver<CanFrame>,
    waiters: Arc<Waiters>,
}

impl PendingReply {
    pub(crate) fn register(waiters: &Arc<Waiters>, id: u32) -> Self {
        let (token, rx) = waiters.register(id);
        Self {
            id,
            token,
            rx,
            waiters: waiters.clone(),
        }
    }

    /// Identifier this reply is waiting for
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Block until the frame arrives or `timeout` expires
    pub fn wait(self, timeout: Duration) -> Result<CanFrame> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| SlcanError::WaitTimeout { id: self.id })
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.waiters.cancel(self.token);
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("id", &format_args!("0x{:03X}", self.id))
            .finish()
    }
}

/// Everything the reader needs besides its transport
pub(crate) struct ReaderContext {
    pub port_name: String,
    pub filter: IdFilter,
    pub sink: Option<Arc<dyn FrameSink>>,
    pub waiters: Arc<Waiters>,
    pub read_timeout: Duration,
}

impl ReaderContext {
    /// Decode one received line and deliver it if wanted
    pub fn dispatch_line(&self, line: &str) {
        match decode_frame(line) {
            Ok(Some(frame)) => {
                self.waiters.offer(&frame);
                if !self.filter.accept(frame.id()) {
                    return;
                }
                if let Some(sink) = &self.sink {
                    sink.deliver(frame);
                }
            }
            Ok(None) => {
                if !line.is_empty() {
                    trace!("[{}] ignoring line {:?}", self.port_name, line);
                }
            }
            Err(e) => debug!("[{}] MSG: {:?} ({})", self.port_name, line, e),
        }
    }
}

/// Handle to a running reader thread
pub(crate) struct ReaderHandle {
    shutdown: ShutdownSignal,
    thread: Option<JoinHandle<()>>,
    done: Receiver<()>,
}

impl ReaderHandle {
    /// Start a reader on `transport`
    pub fn spawn(transport: Box<dyn Transport>, ctx: ReaderContext) -> Result<Self> {
        let shutdown = ShutdownSignal::new();
        let signal = shutdown.clone();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || {
                // Dropped when the loop returns or unwinds
                let _done = done_tx;
                run(transport, ctx, signal);
            })
            .map_err(SlcanError::Io)?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
            done: done_rx,
        })
    }

    /// Signal the reader and wait up to `wait` for it to finish
    ///
    /// Returns false if the thread was still running after `wait`; it is
    /// then left to exit on its own and keeps its transport handle, so the
    /// serial port stays open until it does.
    pub fn stop(mut self, wait: Duration) -> bool {
        self.shutdown.trigger();
        match self.done.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "reader thread did not stop within {:?}; its serial handle stays open until it exits",
                    wait
                );
                false
            }
            _ => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                true
            }
        }
    }
}

fn run(mut transport: Box<dyn Transport>, ctx: ReaderContext, shutdown: ShutdownSignal) {
    debug!("[{}] reader started", ctx.port_name);
    let mut framer = LineFramer::new();

    while !shutdown.is_triggered() {
        match framer.read_line(&mut *transport) {
            Ok(line) => ctx.dispatch_line(&line),
            Err(SlcanError::ReadTimeout) => {
                debug!("[{}] read timeout, partial {:?}", ctx.port_name, framer.partial());
            }
            Err(e) => {
                debug!(
                    "[{}] read error: {} (partial {:?})",
                    ctx.port_name,
                    e,
                    framer.partial()
                );
                // A dead line fails instantly; pace retries like a timeout would
                thread::sleep(ctx.read_timeout);
            }
        }
    }

    debug!("[{}] reader ended", ctx.port_name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockAdapter;
    use crate::transport::{Connector, PortSettings};
    use std::collections::HashSet;
    use std::time::Instant;

    fn context(filter: IdFilter, tx: Sender<CanFrame>) -> ReaderContext {
        ReaderContext {
            port_name: "mock".to_string(),
            filter,
            sink: Some(Arc::new(move |frame: CanFrame| {
                let _ = tx.send(frame);
            })),
            waiters: Arc::new(Waiters::default()),
            read_timeout: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        let shared = signal.clone();
        assert!(!shared.is_triggered());
        signal.trigger();
        assert!(shared.is_triggered());
        assert!(!ShutdownSignal::new().is_triggered());
    }

    #[test]
    fn test_dispatch_filters_and_skips() {
        let (tx, rx) = mpsc::channel();
        let allowed: HashSet<u32> = [0x123].into_iter().collect();
        let ctx = context(IdFilter::with_allow_list(Arc::new(allowed)), tx);

        ctx.dispatch_line("z");
        ctx.dispatch_line("");
        ctx.dispatch_line("t4568AABBCCDDEEFF0011");
        ctx.dispatch_line("t123");
        ctx.dispatch_line("t12380102030405060708");

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.id(), 0x123);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_waiters_see_filtered_frames() {
        let (tx, rx) = mpsc::channel();
        let ctx = context(IdFilter::default(), tx);

        let (_, waiter) = ctx.waiters.register(0x7E8);
        let (token, other) = ctx.waiters.register(0x7E9);
        ctx.dispatch_line("t7E88027E000000000000");

        assert_eq!(waiter.try_recv().unwrap().id(), 0x7E8);
        assert!(other.try_recv().is_err());
        assert!(rx.try_recv().is_err());
        assert_eq!(ctx.waiters.pending(), 1);

        ctx.waiters.cancel(token);
        assert_eq!(ctx.waiters.pending(), 0);
    }

    #[test]
    fn test_pending_reply_keeps_early_frame() {
        let (tx, _rx) = mpsc::channel();
        let ctx = context(IdFilter::default(), tx);

        let reply = PendingReply::register(&ctx.waiters, 0x7E8);
        ctx.dispatch_line("t7E880250920000000000");
        assert_eq!(ctx.waiters.pending(), 0);

        let frame = reply.wait(Duration::from_millis(1)).unwrap();
        assert_eq!(&frame.data()[..3], &[0x02, 0x50, 0x92]);
    }

    #[test]
    fn test_pending_reply_drop_unregisters() {
        let (tx, _rx) = mpsc::channel();
        let ctx = context(IdFilter::default(), tx);

        let reply = PendingReply::register(&ctx.waiters, 0x7E8);
        assert_eq!(reply.id(), 0x7E8);
        assert_eq!(ctx.waiters.pending(), 1);
        drop(reply);
        assert_eq!(ctx.waiters.pending(), 0);

        let reply = PendingReply::register(&ctx.waiters, 0x7E8);
        let err = reply.wait(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, SlcanError::WaitTimeout { id: 0x7E8 }));
        assert_eq!(ctx.waiters.pending(), 0);
    }

    #[test]
    fn test_detached_reader_keeps_handle_until_exit() {
        let adapter = MockAdapter::new();
        let settings = PortSettings {
            baud_rate: 3_000_000,
            read_timeout: Duration::from_millis(5),
        };
        let link = adapter.connect("mock", &settings).unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let ctx = ReaderContext {
            port_name: "mock".to_string(),
            filter: IdFilter::bypass(),
            sink: Some(Arc::new(move |_frame: CanFrame| {
                let _ = entered_tx.send(());
                thread::sleep(Duration::from_millis(200));
            })),
            waiters: Arc::new(Waiters::default()),
            read_timeout: Duration::from_millis(5),
        };
        let handle = ReaderHandle::spawn(link, ctx).unwrap();

        adapter.feed(b"t12380102030405060708\r");
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(!handle.stop(Duration::from_millis(20)));
        assert_eq!(adapter.state().live_handles, 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        while adapter.state().live_handles != 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(adapter.state().live_handles, 0);
    }

    #[test]
    fn test_reader_thread_delivers_and_stops() {
        let adapter = MockAdapter::new();
        let settings = PortSettings {
            baud_rate: 3_000_000,
            read_timeout: Duration::from_millis(5),
        };
        let link = adapter.connect("mock", &settings).unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = ReaderHandle::spawn(link, context(IdFilter::bypass(), tx)).unwrap();

        adapter.feed(b"\x07z\rt1238010203040");
        adapter.feed(b"5060708\r");
        let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let started = Instant::now();
        assert!(handle.stop(Duration::from_secs(2)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(adapter.state().live_handles, 0);

        adapter.feed(b"t12380102030405060708\r");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}

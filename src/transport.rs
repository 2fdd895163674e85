//! Contracts between the measurement core and its external collaborators.
//!
//! The core never talks to the QUIC engine, the timer, or the session
//! lifecycle directly; it goes through the small traits defined here. The
//! tokio-backed implementations ([`TickTimer`], [`CancelSession`]) live
//! alongside the traits, the quinn-backed transport lives in the client.

use std::fmt;
use std::future::poll_fn;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, Interval};
use tokio_util::sync::CancellationToken;

/// Handle identifying the QUIC stream a callback refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receive-side primitive of the transport engine.
///
/// The engine advances its flow-control window once the application has
/// consumed received bytes; the harness acknowledges exactly the byte
/// counts it has accounted for.
pub trait StreamTransport {
    /// Acknowledge that `len` received bytes on `stream` were consumed.
    fn ack_received(&mut self, stream: StreamHandle, len: usize);
}

/// Fixed-interval timer facility driving the periodic report tick.
pub trait TimerFacility {
    /// Arm a repeating timer with the given period. Arming an already
    /// armed timer is a no-op; the harness arms exactly once.
    fn arm_repeating(&mut self, period: Duration);
}

/// Lifecycle hooks of the owning session.
pub trait SessionControl {
    /// Called once when the first measured byte arrives.
    fn notify_first_byte(&mut self);

    /// Called once when the measurement window has elapsed. The session
    /// is expected to wind the process down; no further ticks matter.
    fn request_termination(&mut self);
}

/// Collaborator set handed to stream callbacks by the transport driver.
pub struct EngineCtx<'a> {
    pub transport: &'a mut dyn StreamTransport,
    pub timer: &'a mut dyn TimerFacility,
    pub session: &'a mut dyn SessionControl,
}

/// Tokio-backed [`TimerFacility`].
///
/// Starts out unarmed: [`TickTimer::tick`] pends until some handle arms
/// the timer. Handles are cheap clones sharing the same underlying
/// interval, so the event loop can await ticks on one handle while the
/// reporter arms through another.
#[derive(Clone, Default)]
pub struct TickTimer {
    inner: Arc<Mutex<Option<Interval>>>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Completes once per period after the timer has been armed.
    ///
    /// While unarmed this pends without waking; the caller's event loop
    /// re-creates the future each iteration, so a tick armed from another
    /// branch is picked up on the next pass.
    pub async fn tick(&self) {
        poll_fn(|cx| {
            let mut guard = self.inner.lock();
            match guard.as_mut() {
                Some(interval) => interval.poll_tick(cx).map(|_| ()),
                None => Poll::Pending,
            }
        })
        .await
    }
}

impl TimerFacility for TickTimer {
    fn arm_repeating(&mut self, period: Duration) {
        let mut guard = self.inner.lock();
        if guard.is_none() {
            // First fire one full period from now, then repeat.
            *guard = Some(interval_at(Instant::now() + period, period));
        }
    }
}

/// [`SessionControl`] implementation backed by a cancellation token.
///
/// Termination cancels the token; whoever drives the event loop observes
/// the cancellation and tears the connection down.
#[derive(Clone, Default)]
pub struct CancelSession {
    token: CancellationToken,
}

impl CancelSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the event loop to learn about termination.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl SessionControl for CancelSession {
    fn notify_first_byte(&mut self) {
        info!("first byte received, measurement window started");
    }

    fn request_termination(&mut self) {
        info!("measurement window elapsed, requesting shutdown");
        self.token.cancel();
    }
}

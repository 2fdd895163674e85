//! Stream callback set bound to the measured QUIC stream.
//!
//! [`StreamCallbacks`] mirrors the transport engine's per-stream callback
//! contract; [`StreamIngest`] is the one implementation this tool
//! registers. It counts inbound bytes into the [`RateReporter`] and
//! surfaces abnormal stream events on stderr without touching the
//! accounting.

use log::{debug, trace};

use crate::reporter::RateReporter;
use crate::transport::{EngineCtx, StreamHandle};
use crate::{Error, Result};

/// Per-stream callback contract consumed by the transport driver.
///
/// The egress hooks have default empty bodies: egress buffering is the
/// engine's stock implementation, and this harness never sends measured
/// data, so implementations normally leave them alone.
pub trait StreamCallbacks {
    /// The stream has been opened and its buffering allocated. Failure
    /// here is fatal for the process.
    fn on_stream_open(&mut self, stream: StreamHandle) -> Result<()>;

    /// `len` bytes arrived at `offset`. The payload itself is owned and
    /// buffered by the engine; callbacks only see the count.
    fn on_receive(&mut self, stream: StreamHandle, offset: u64, len: usize, ctx: &mut EngineCtx<'_>);

    /// Peer signaled it will accept no further outgoing data.
    fn on_send_stop(&mut self, stream: StreamHandle, error_code: u64);

    /// Peer abruptly terminated the stream.
    fn on_reset_stream(&mut self, stream: StreamHandle, error_code: u64);

    fn on_egress_shift(&mut self, _stream: StreamHandle, _amount: usize) {}

    fn on_egress_emit(&mut self, _stream: StreamHandle) {}

    fn on_egress_destroy(&mut self, _stream: StreamHandle) {}
}

/// Receive-only adapter feeding the reporter from one QUIC stream.
pub struct StreamIngest {
    reporter: RateReporter,
    bound: Option<StreamHandle>,
}

impl StreamIngest {
    pub fn new(reporter: RateReporter) -> Self {
        Self {
            reporter,
            bound: None,
        }
    }

    pub fn reporter(&self) -> &RateReporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut RateReporter {
        &mut self.reporter
    }
}

impl StreamCallbacks for StreamIngest {
    fn on_stream_open(&mut self, stream: StreamHandle) -> Result<()> {
        if let Some(existing) = self.bound {
            return Err(Error::Transport(format!(
                "adapter already bound to stream {}, refusing stream {}",
                existing, stream
            )));
        }
        self.bound = Some(stream);
        debug!("bound to stream {}", stream);
        Ok(())
    }

    fn on_receive(
        &mut self,
        stream: StreamHandle,
        offset: u64,
        len: usize,
        ctx: &mut EngineCtx<'_>,
    ) {
        if len == 0 {
            // Expected from some transports; visible but never counted,
            // and it does not start the measurement window.
            eprintln!("len=0");
            return;
        }

        trace!("stream {} offset {} len {}", stream, offset, len);
        self.reporter.on_first_byte(ctx.timer, ctx.session);
        self.reporter.accumulate(len as u64);
        ctx.transport.ack_received(stream, len);
    }

    fn on_send_stop(&mut self, _stream: StreamHandle, error_code: u64) {
        eprintln!("received STOP_SENDING: {}", error_code);
    }

    fn on_reset_stream(&mut self, _stream: StreamHandle, error_code: u64) {
        eprintln!("received RESET_STREAM: {}", error_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::Phase;
    use crate::transport::{SessionControl, StreamTransport, TimerFacility};
    use std::time::Duration;

    #[derive(Default)]
    struct MockTransport {
        acks: Vec<(StreamHandle, usize)>,
    }

    impl StreamTransport for MockTransport {
        fn ack_received(&mut self, stream: StreamHandle, len: usize) {
            self.acks.push((stream, len));
        }
    }

    #[derive(Default)]
    struct MockTimer {
        armed: usize,
    }

    impl TimerFacility for MockTimer {
        fn arm_repeating(&mut self, _period: Duration) {
            self.armed += 1;
        }
    }

    #[derive(Default)]
    struct MockSession {
        first_byte_calls: usize,
        termination_calls: usize,
    }

    impl SessionControl for MockSession {
        fn notify_first_byte(&mut self) {
            self.first_byte_calls += 1;
        }

        fn request_termination(&mut self) {
            self.termination_calls += 1;
        }
    }

    struct Rig {
        transport: MockTransport,
        timer: MockTimer,
        session: MockSession,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                transport: MockTransport::default(),
                timer: MockTimer::default(),
                session: MockSession::default(),
            }
        }

        fn ctx(&mut self) -> EngineCtx<'_> {
            EngineCtx {
                transport: &mut self.transport,
                timer: &mut self.timer,
                session: &mut self.session,
            }
        }
    }

    const STREAM: StreamHandle = StreamHandle(4);

    #[test]
    fn open_binds_once() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        assert!(ingest.on_stream_open(STREAM).is_ok());
        assert!(ingest.on_stream_open(StreamHandle(8)).is_err());
    }

    #[test]
    fn receive_accumulates_and_acks() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        let mut rig = Rig::new();

        ingest.on_receive(STREAM, 0, 1000, &mut rig.ctx());
        ingest.on_receive(STREAM, 1000, 2000, &mut rig.ctx());

        assert_eq!(ingest.reporter().bytes_this_second(), 3000);
        assert_eq!(rig.transport.acks, vec![(STREAM, 1000), (STREAM, 2000)]);
    }

    #[test]
    fn first_byte_fires_once_across_many_receives() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        let mut rig = Rig::new();

        for i in 0..5u64 {
            ingest.on_receive(STREAM, i * 100, 100, &mut rig.ctx());
        }

        assert_eq!(rig.timer.armed, 1);
        assert_eq!(rig.session.first_byte_calls, 1);
        assert_eq!(ingest.reporter().phase(), Phase::Measuring);
    }

    #[test]
    fn zero_length_receive_neither_counts_nor_starts_the_window() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        let mut rig = Rig::new();

        ingest.on_receive(STREAM, 0, 0, &mut rig.ctx());

        assert_eq!(ingest.reporter().phase(), Phase::NotStarted);
        assert_eq!(ingest.reporter().bytes_this_second(), 0);
        assert_eq!(rig.timer.armed, 0);
        assert!(rig.transport.acks.is_empty());
    }

    #[test]
    fn zero_length_between_receives_contributes_nothing() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        let mut rig = Rig::new();

        ingest.on_receive(STREAM, 0, 700, &mut rig.ctx());
        ingest.on_receive(STREAM, 700, 0, &mut rig.ctx());
        ingest.on_receive(STREAM, 700, 300, &mut rig.ctx());

        assert_eq!(ingest.reporter().bytes_this_second(), 1000);
        assert_eq!(rig.transport.acks.len(), 2);
    }

    #[test]
    fn abnormal_stream_events_leave_accounting_alone() {
        let mut ingest = StreamIngest::new(RateReporter::new(2));
        let mut rig = Rig::new();

        ingest.on_receive(STREAM, 0, 500, &mut rig.ctx());
        ingest.on_send_stop(STREAM, 77);
        ingest.on_reset_stream(STREAM, 99);

        assert_eq!(ingest.reporter().bytes_this_second(), 500);
        assert_eq!(ingest.reporter().phase(), Phase::Measuring);
        assert_eq!(rig.session.termination_calls, 0);
    }
}

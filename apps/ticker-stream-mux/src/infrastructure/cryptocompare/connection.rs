//! Connection Manager
//!
//! Owns the single outbound transport so callers never need to know whether
//! it is ready yet.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──(on_open)──► Open
//!     │                       │
//!  send() queues          send() writes
//! ```
//!
//! Frames queued while connecting are written in enqueue order, exactly
//! once, when the transport signals readiness. The queue, the state flip and
//! every later write share one lock, so no send can overtake the flush.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::application::ports::{
    CommandSender, FrameSink, PriceDispatcher, SubscriptionCommand,
};
use crate::domain::streaming::DispatchReport;
use crate::infrastructure::cryptocompare::codec::JsonCodec;
use crate::infrastructure::cryptocompare::messages::{StreamerMessage, SubscriptionRequest};
use crate::infrastructure::metrics;

// =============================================================================
// Connection State
// =============================================================================

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Waiting for the transport to become writable.
    #[default]
    Connecting,
    /// Transport is writable; sends go out immediately.
    Open,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
        }
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// When the transport became ready.
    pub opened_at: Option<DateTime<Utc>>,
    /// Frames waiting for readiness.
    pub pending_frames: usize,
    /// Frames written to the transport.
    pub frames_sent: u64,
    /// Invalid subscription notices received.
    pub invalid_subscriptions: u64,
}

struct Inner {
    state: ConnectionState,
    pending: VecDeque<String>,
    sink: Option<Box<dyn FrameSink>>,
    opened_at: Option<DateTime<Utc>>,
    frames_sent: u64,
    invalid_subscriptions: u64,
}

impl Inner {
    fn write(&mut self, frame: String) {
        let Some(sink) = &self.sink else {
            return;
        };

        match sink.write(frame) {
            Ok(()) => {
                self.frames_sent += 1;
                metrics::record_frame_sent();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping outbound frame");
                metrics::record_send_failure("transport_closed");
            }
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Deferred-send wrapper around the streaming transport.
pub struct ConnectionManager {
    codec: JsonCodec,
    inner: Mutex<Inner>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Create a manager in the `Connecting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codec: JsonCodec::new(),
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                pending: VecDeque::new(),
                sink: None,
                opened_at: None,
                frames_sent: 0,
                invalid_subscriptions: 0,
            }),
        }
    }

    /// Serialize `message` and write it, or queue it until the transport opens.
    ///
    /// Never blocks and never reports failure to the caller; encode and
    /// transport errors are logged and counted.
    pub fn send<T: serde::Serialize>(&self, message: &T) {
        let frame = match self.codec.encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode outbound message");
                metrics::record_send_failure("encode");
                return;
            }
        };

        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connecting => {
                inner.pending.push_back(frame);
                metrics::set_pending_frames(inner.pending.len());
                tracing::trace!(pending = inner.pending.len(), "Queued frame until open");
            }
            ConnectionState::Open => inner.write(frame),
        }
    }

    /// Readiness signal: flush queued frames into `sink` and switch to `Open`.
    ///
    /// The transition happens once; later signals are ignored.
    pub fn on_open(&self, sink: Box<dyn FrameSink>) {
        let mut inner = self.inner.lock();

        if inner.state == ConnectionState::Open {
            tracing::warn!("Ignoring repeated readiness signal");
            return;
        }

        inner.sink = Some(sink);
        let pending = std::mem::take(&mut inner.pending);
        let flushed = pending.len();
        for frame in pending {
            inner.write(frame);
        }

        inner.state = ConnectionState::Open;
        inner.opened_at = Some(Utc::now());

        metrics::set_pending_frames(0);
        metrics::set_connection_open(true);
        tracing::info!(flushed, "Streamer connection open");
    }

    /// Handle one inbound frame.
    ///
    /// Price updates with a non-zero price go to `dispatcher`; invalid
    /// subscription notices are logged; everything else is dropped.
    /// Returns the dispatch outcome when the frame was routed.
    pub fn on_message(
        &self,
        raw: &str,
        dispatcher: &dyn PriceDispatcher,
    ) -> Option<DispatchReport> {
        metrics::record_frame_received();

        let message = match self.codec.decode(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable frame");
                metrics::record_decode_failure();
                return None;
            }
        };

        match message {
            StreamerMessage::AggregateIndex(update) => {
                let price = update.routable_price()?;
                let report = dispatcher.dispatch(&update.from_symbol, price);
                metrics::record_dispatch(&report);
                Some(report)
            }
            StreamerMessage::InvalidSubscription(notice) => {
                self.inner.lock().invalid_subscriptions += 1;
                metrics::record_invalid_subscription();
                tracing::warn!(
                    code = notice.message.as_deref().unwrap_or_default(),
                    parameter = notice.parameter.as_deref().unwrap_or_default(),
                    info = notice.info.as_deref().unwrap_or_default(),
                    raw,
                    "Invalid subscription"
                );
                None
            }
            StreamerMessage::Control(kind) => {
                tracing::trace!(?kind, "Streamer control message");
                None
            }
            StreamerMessage::Unknown(_) => None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Snapshot of the connection.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock();
        ConnectionStatus {
            state: inner.state,
            opened_at: inner.opened_at,
            pending_frames: inner.pending.len(),
            frames_sent: inner.frames_sent,
            invalid_subscriptions: inner.invalid_subscriptions,
        }
    }
}

impl CommandSender for ConnectionManager {
    fn send_command(&self, command: &SubscriptionCommand) {
        self.send(&SubscriptionRequest::from(command));
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::Sequence;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use test_case::test_case;

    use super::*;
    use crate::application::ports::{MockFrameSink, SinkError};
    use crate::domain::streaming::Price;
    use crate::domain::subscription::SubscriptionId;

    /// Sink that records frames into shared storage.
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<String>>>,
    }

    impl FrameSink for RecordingSink {
        fn write(&self, frame: String) -> Result<(), SinkError> {
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    /// Dispatcher that records every routed update.
    #[derive(Default)]
    struct RecordingDispatcher {
        updates: Mutex<Vec<(String, Price)>>,
    }

    impl PriceDispatcher for RecordingDispatcher {
        fn dispatch(&self, symbol: &str, price: Price) -> DispatchReport {
            self.updates.lock().push((symbol.to_string(), price));
            DispatchReport {
                invoked: 1,
                failed: 0,
            }
        }
    }

    fn add(symbol: &str) -> SubscriptionCommand {
        SubscriptionCommand::add(SubscriptionId::aggregate(symbol, "USD"))
    }

    #[test]
    fn starts_connecting_with_empty_queue() {
        let manager = ConnectionManager::new();
        let status = manager.status();

        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(status.pending_frames, 0);
        assert!(status.opened_at.is_none());
    }

    #[test]
    fn send_before_open_is_queued() {
        let manager = ConnectionManager::new();

        manager.send_command(&add("BTC"));
        manager.send_command(&add("ETH"));

        assert_eq!(manager.status().pending_frames, 2);
        assert_eq!(manager.status().frames_sent, 0);
    }

    #[test]
    fn open_flushes_queue_in_order_once() {
        let manager = ConnectionManager::new();
        let sink = RecordingSink::default();

        for symbol in ["BTC", "ETH", "SOL"] {
            manager.send_command(&add(symbol));
        }
        manager.on_open(Box::new(sink.clone()));

        let frames = sink.frames.lock().clone();
        assert_eq!(
            frames,
            vec![
                r#"{"action":"SubAdd","subs":["5~CCCAGG~BTC~USD"]}"#,
                r#"{"action":"SubAdd","subs":["5~CCCAGG~ETH~USD"]}"#,
                r#"{"action":"SubAdd","subs":["5~CCCAGG~SOL~USD"]}"#,
            ]
        );

        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.pending_frames, 0);
        assert_eq!(status.frames_sent, 3);
        assert!(status.opened_at.is_some());
    }

    #[test]
    fn send_after_open_writes_immediately() {
        let mut sink = MockFrameSink::new();
        let mut seq = Sequence::new();
        sink.expect_write()
            .withf(|f| f.contains("BTC"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_write()
            .withf(|f| f.contains("ETH"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let manager = ConnectionManager::new();
        manager.send_command(&add("BTC"));
        manager.on_open(Box::new(sink));
        manager.send_command(&add("ETH"));

        assert_eq!(manager.status().frames_sent, 2);
    }

    #[test]
    fn repeated_open_does_not_reflush() {
        let manager = ConnectionManager::new();
        let first = RecordingSink::default();
        let second = RecordingSink::default();

        manager.send_command(&add("BTC"));
        manager.on_open(Box::new(first.clone()));
        manager.on_open(Box::new(second.clone()));
        manager.send_command(&add("ETH"));

        assert_eq!(first.frames.lock().len(), 2);
        assert!(second.frames.lock().is_empty());
    }

    #[test]
    fn closed_transport_drops_frame() {
        let mut sink = MockFrameSink::new();
        sink.expect_write().returning(|_| Err(SinkError::Closed));

        let manager = ConnectionManager::new();
        manager.on_open(Box::new(sink));
        manager.send_command(&add("BTC"));

        assert_eq!(manager.status().frames_sent, 0);
        assert_eq!(manager.status().pending_frames, 0);
    }

    #[test]
    fn price_update_is_dispatched() {
        let manager = ConnectionManager::new();
        let dispatcher = RecordingDispatcher::default();

        let raw = r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000}"#;
        let report = manager.on_message(raw, &dispatcher);

        assert_eq!(report.map(|r| r.invoked), Some(1));
        assert_eq!(
            *dispatcher.updates.lock(),
            vec![("BTC".to_string(), Decimal::from(50_000))]
        );
    }

    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000,"LASTUPDATE":1700000000.5}"# ; "fractional timestamp")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000,"FLAGS":"4"}"# ; "string flags")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000,"TOSYMBOL":1}"# ; "numeric quote symbol")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000,"MARKET":null}"# ; "null market")]
    fn frame_with_odd_extras_is_dispatched(raw: &str) {
        let manager = ConnectionManager::new();
        let dispatcher = RecordingDispatcher::default();

        let report = manager.on_message(raw, &dispatcher);

        assert_eq!(report.map(|r| r.invoked), Some(1));
        assert_eq!(
            *dispatcher.updates.lock(),
            vec![("BTC".to_string(), Decimal::from(50_000))]
        );
    }

    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC"}"# ; "absent price")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":0}"# ; "zero price")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":null}"# ; "null price")]
    #[test_case(r#"{"TYPE":"2","FROMSYMBOL":"BTC","PRICE":50000}"# ; "other kind")]
    #[test_case(r#"{"TYPE":"999","MESSAGE":"HEARTBEAT"}"# ; "heartbeat")]
    #[test_case(r#"{"TYPE":"500","MESSAGE":"INVALID_SUB"}"# ; "invalid subscription")]
    #[test_case("{not json" ; "malformed")]
    fn frame_is_not_dispatched(raw: &str) {
        let manager = ConnectionManager::new();
        let dispatcher = RecordingDispatcher::default();

        assert!(manager.on_message(raw, &dispatcher).is_none());
        assert!(dispatcher.updates.lock().is_empty());
    }

    #[test]
    fn invalid_subscription_is_counted() {
        let manager = ConnectionManager::new();
        let dispatcher = RecordingDispatcher::default();

        manager.on_message(
            r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~NOPE~USD"}"#,
            &dispatcher,
        );

        assert_eq!(manager.status().invalid_subscriptions, 1);
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    /// Writer that captures formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn invalid_subscription_logs_raw_frame() {
        let manager = ConnectionManager::new();
        let dispatcher = RecordingDispatcher::default();
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let raw = r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~NOPE~USD"}"#;
        tracing::subscriber::with_default(subscriber, || {
            manager.on_message(raw, &dispatcher);
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Invalid subscription"));
        assert!(output.contains("5~CCCAGG~NOPE~USD"));
        assert!(dispatcher.updates.lock().is_empty());
    }

    #[test]
    fn connection_state_as_str() {
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionState::Open.as_str(), "open");
    }
}

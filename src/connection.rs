//! Connection manager: owns the transport and reports its lifecycle.
//!
//! [`start`] spawns a background task that connects through a [`Connector`]
//! and then multiplexes outgoing frames, incoming frames and shutdown with
//! `tokio::select!`. [`attach`] does the same for a transport that is already
//! connected. Both return a [`ConnectionHandle`] for sending frames and a
//! receiver of ordered [`ConnectionSignal`]s:
//!
//! 1. `Opened` exactly once, when the transport is up (skipped if connecting fails)
//! 2. `Message(frame)` for each incoming text frame, in receive order
//! 3. `Closed(reason)` exactly once, always last
//!
//! Every close is final. The phase never leaves [`ConnectionPhase::Closed`],
//! and nothing here retries.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::transport::{Connector, Transport};

/// Default capacity of the bounded signal channel.
pub const DEFAULT_SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Phase ───────────────────────────────────────────────────────────

/// Lifecycle phase of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Nothing started yet.
    Idle,
    /// Connection setup in progress.
    Connecting,
    /// Transport is up; frames flow both ways.
    Online,
    /// Terminal.
    Closed,
}

impl ConnectionPhase {
    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Online => 2,
            Self::Closed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Online,
            3 => Self::Closed,
            _ => Self::Idle,
        }
    }
}

/// Atomic phase shared by the handle and the connection task.
#[derive(Debug, Clone)]
struct PhaseCell(Arc<AtomicU8>);

impl PhaseCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionPhase::Idle.to_u8())))
    }

    fn get(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless already closed. Returns `false` if refused.
    fn advance(&self, next: ConnectionPhase) -> bool {
        let closed = ConnectionPhase::Closed.to_u8();
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != closed).then_some(next.to_u8())
            })
            .is_ok()
    }
}

// ── Signals ─────────────────────────────────────────────────────────

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseReason {
    /// The connector could not establish the transport.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// The server closed the connection cleanly.
    #[error("closed by server")]
    ServerClosed,
    /// Sending or receiving failed.
    #[error("transport error: {0}")]
    TransportError(String),
    /// The local side shut the connection down.
    #[error("client shut down")]
    LocalShutdown,
}

/// Lifecycle notification delivered on the signal channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    Opened,
    Message(String),
    Closed(CloseReason),
}

// ── Configuration ───────────────────────────────────────────────────

/// Tuning for the connection task.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Capacity of the bounded signal channel.
    ///
    /// Signals are never dropped; when the channel is full the connection
    /// task stops reading from the transport until the consumer catches up.
    /// Values below 1 are clamped to 1.
    pub signal_channel_capacity: usize,
    /// Time [`ConnectionHandle::shutdown`] waits for a graceful close before
    /// aborting the task. Zero aborts immediately.
    pub shutdown_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            signal_channel_capacity: DEFAULT_SIGNAL_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// Sending half of a connection plus control over its task.
///
/// [`send`](Self::send) queues a frame and returns immediately. Dropping the
/// handle aborts the connection task without a close handshake; call
/// [`shutdown`](Self::shutdown) for a graceful close.
pub struct ConnectionHandle {
    frame_tx: mpsc::UnboundedSender<String>,
    phase: PhaseCell,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ConnectionHandle {
    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase.get()
    }

    /// Returns `true` while frames can flow.
    pub fn is_online(&self) -> bool {
        self.phase() == ConnectionPhase::Online
    }

    /// Queue one text frame for the transport.
    ///
    /// Frames queued while still connecting go out once the transport is up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] once the connection has closed.
    pub fn send(&self, frame: String) -> Result<()> {
        if self.phase() == ConnectionPhase::Closed {
            return Err(ClientError::NotConnected);
        }
        self.frame_tx
            .send(frame)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Close the transport and stop the connection task.
    ///
    /// The task gets `shutdown_timeout` to close the transport and emit its
    /// final `Closed` signal; after that it is aborted. Idempotent.
    pub async fn shutdown(&mut self) {
        debug!("connection shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("connection task terminated with join error: {join_err}"),
                Err(_) => {
                    warn!("connection task did not exit within timeout; aborting");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection task aborted: {join_err}");
                    }
                }
            }
        }

        self.phase.advance(ConnectionPhase::Closed);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("phase", &self.phase())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        // No executor to drive a close handshake from here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Entry points ────────────────────────────────────────────────────

/// Connect to `url` through `connector` in a background task.
///
/// The phase is `Connecting` by the time this returns.
#[must_use = "the signal receiver must be used to observe the connection"]
pub fn start<C: Connector>(
    connector: Arc<C>,
    url: String,
    config: &ConnectionConfig,
) -> (ConnectionHandle, mpsc::Receiver<ConnectionSignal>) {
    spawn(config, move |channels| connect_then_run(connector, url, channels))
}

/// Drive an already-connected transport in a background task.
#[must_use = "the signal receiver must be used to observe the connection"]
pub fn attach(
    transport: impl Transport,
    config: &ConnectionConfig,
) -> (ConnectionHandle, mpsc::Receiver<ConnectionSignal>) {
    spawn(config, move |channels| transport_loop(transport, channels))
}

/// Channel ends and shared state owned by the connection task.
struct TaskChannels {
    frame_rx: mpsc::UnboundedReceiver<String>,
    signal_tx: mpsc::Sender<ConnectionSignal>,
    phase: PhaseCell,
    shutdown_rx: oneshot::Receiver<()>,
}

fn spawn<F, Fut>(
    config: &ConnectionConfig,
    run: F,
) -> (ConnectionHandle, mpsc::Receiver<ConnectionSignal>)
where
    F: FnOnce(TaskChannels) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (frame_tx, frame_rx) = mpsc::unbounded_channel::<String>();
    // tokio panics on a zero-capacity channel.
    let capacity = config.signal_channel_capacity.max(1);
    let (signal_tx, signal_rx) = mpsc::channel::<ConnectionSignal>(capacity);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let phase = PhaseCell::new();
    phase.advance(ConnectionPhase::Connecting);

    let task = tokio::spawn(run(TaskChannels {
        frame_rx,
        signal_tx,
        phase: phase.clone(),
        shutdown_rx,
    }));

    let handle = ConnectionHandle {
        frame_tx,
        phase,
        task: Some(task),
        shutdown_tx: Some(shutdown_tx),
        shutdown_timeout: config.shutdown_timeout,
    };
    (handle, signal_rx)
}

// ── Connection task ─────────────────────────────────────────────────

async fn connect_then_run<C: Connector>(connector: Arc<C>, url: String, mut ch: TaskChannels) {
    debug!(url = %url, "connection task started");

    let connected = tokio::select! {
        result = connector.connect(&url) => result,
        _ = &mut ch.shutdown_rx => {
            debug!("shutdown requested while connecting");
            emit_closed(&ch, CloseReason::LocalShutdown).await;
            return;
        }
    };

    match connected {
        Ok(transport) => transport_loop(transport, ch).await,
        Err(e) => {
            error!(url = %url, "failed to connect: {e}");
            emit_closed(&ch, CloseReason::ConnectFailed(e.to_string())).await;
        }
    }
}

/// Multiplex outgoing frames, shutdown and incoming frames until the
/// connection ends for any reason.
async fn transport_loop(mut transport: impl Transport, mut ch: TaskChannels) {
    if !ch.phase.advance(ConnectionPhase::Online) {
        let _ = transport.close().await;
        return;
    }
    info!("connection online");
    if ch.signal_tx.send(ConnectionSignal::Opened).await.is_err() {
        debug!("signal receiver dropped before open");
        let _ = transport.close().await;
        ch.phase.advance(ConnectionPhase::Closed);
        return;
    }

    loop {
        tokio::select! {
            frame = ch.frame_rx.recv() => {
                match frame {
                    Some(frame) => {
                        debug!(len = frame.len(), "sending frame");
                        if let Err(e) = transport.send(frame).await {
                            error!("transport send error: {e}");
                            emit_closed(&ch, CloseReason::TransportError(e.to_string())).await;
                            break;
                        }
                    }
                    // Handle dropped.
                    None => {
                        debug!("frame channel closed, shutting down connection");
                        let _ = transport.close().await;
                        emit_closed(&ch, CloseReason::LocalShutdown).await;
                        break;
                    }
                }
            }

            _ = &mut ch.shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_closed(&ch, CloseReason::LocalShutdown).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        if ch.signal_tx.send(ConnectionSignal::Message(text)).await.is_err() {
                            debug!("signal receiver dropped, closing connection");
                            let _ = transport.close().await;
                            ch.phase.advance(ConnectionPhase::Closed);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_closed(&ch, CloseReason::TransportError(e.to_string())).await;
                        break;
                    }
                    None => {
                        debug!("connection closed by server");
                        emit_closed(&ch, CloseReason::ServerClosed).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("connection task exited");
}

/// Mark the phase closed and deliver the final `Closed` signal.
async fn emit_closed(ch: &TaskChannels, reason: CloseReason) {
    ch.phase.advance(ConnectionPhase::Closed);
    if ch
        .signal_tx
        .send(ConnectionSignal::Closed(reason))
        .await
        .is_err()
    {
        debug!("signal receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    type Scripted = Option<std::result::Result<String, ClientError>>;

    #[test]
    fn close_reasons_read_as_sentences() {
        assert_eq!(CloseReason::ServerClosed.to_string(), "closed by server");
        assert_eq!(
            CloseReason::ConnectFailed("refused".into()).to_string(),
            "connect failed: refused"
        );
        let reason: &dyn std::error::Error = &CloseReason::TransportError("reset".into());
        assert_eq!(reason.to_string(), "transport error: reset");
    }

    /// Records sent frames and replays scripted incoming ones.
    struct MockTransport {
        incoming: VecDeque<Scripted>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(incoming: Vec<Scripted>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: String) -> std::result::Result<(), ClientError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                // Script exhausted: stay open until shutdown.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Connector that fails, or never finishes.
    enum StubConnector {
        Fails,
        Hangs,
    }

    #[async_trait]
    impl Connector for StubConnector {
        type Transport = MockTransport;

        async fn connect(&self, _url: &str) -> std::result::Result<MockTransport, ClientError> {
            match self {
                Self::Fails => Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))),
                Self::Hangs => std::future::pending().await,
            }
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::default()
    }

    #[test]
    fn phase_cell_never_leaves_closed() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), ConnectionPhase::Idle);
        assert!(cell.advance(ConnectionPhase::Connecting));
        assert!(cell.advance(ConnectionPhase::Closed));
        assert!(!cell.advance(ConnectionPhase::Connecting));
        assert!(!cell.advance(ConnectionPhase::Online));
        assert_eq!(cell.get(), ConnectionPhase::Closed);
    }

    #[test]
    fn phase_u8_round_trip() {
        for phase in [
            ConnectionPhase::Idle,
            ConnectionPhase::Connecting,
            ConnectionPhase::Online,
            ConnectionPhase::Closed,
        ] {
            assert_eq!(ConnectionPhase::from_u8(phase.to_u8()), phase);
        }
    }

    #[tokio::test]
    async fn attach_emits_opened_first() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut handle, mut signals) = attach(transport, &config());

        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);
        assert!(handle.is_online());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn messages_arrive_in_order_then_closed_last() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("one".into())),
            Some(Ok("two".into())),
            None,
        ]);
        let (handle, mut signals) = attach(transport, &config());

        let mut received = Vec::new();
        while let Some(signal) = signals.recv().await {
            received.push(signal);
        }
        assert_eq!(
            received,
            vec![
                ConnectionSignal::Opened,
                ConnectionSignal::Message("one".into()),
                ConnectionSignal::Message("two".into()),
                ConnectionSignal::Closed(CloseReason::ServerClosed),
            ]
        );
        assert_eq!(handle.phase(), ConnectionPhase::Closed);
        assert!(matches!(
            handle.send("late".into()),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn send_reaches_transport() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut handle, mut signals) = attach(transport, &config());
        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);

        handle.send("frame-1".into()).unwrap();
        handle.send("frame-2".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*sent.lock().unwrap(), vec!["frame-1", "frame-2"]);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn receive_error_closes_with_transport_error() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            ClientError::TransportReceive("reset by peer".into()),
        ))]);
        let (_handle, mut signals) = attach(transport, &config());

        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);
        match signals.recv().await.unwrap() {
            ConnectionSignal::Closed(CloseReason::TransportError(e)) => {
                assert!(e.contains("reset by peer"));
            }
            other => panic!("expected transport error close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_connect_closes_without_opening() {
        let (handle, mut signals) = start(
            Arc::new(StubConnector::Fails),
            "ws://127.0.0.1:1/ws/1".into(),
            &config(),
        );

        match signals.recv().await.unwrap() {
            ConnectionSignal::Closed(CloseReason::ConnectFailed(e)) => {
                assert!(e.contains("refused"));
            }
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
        assert!(signals.recv().await.is_none());
        assert_eq!(handle.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn phase_is_connecting_until_transport_is_up() {
        let (mut handle, mut signals) = start(
            Arc::new(StubConnector::Hangs),
            "ws://192.0.2.1:1/ws/1".into(),
            &config(),
        );
        assert_eq!(handle.phase(), ConnectionPhase::Connecting);

        handle.shutdown().await;
        assert_eq!(
            signals.recv().await.unwrap(),
            ConnectionSignal::Closed(CloseReason::LocalShutdown)
        );
        assert_eq!(handle.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_emits_closed() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut handle, mut signals) = attach(transport, &config());
        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);

        handle.shutdown().await;
        handle.shutdown().await;

        assert_eq!(
            signals.recv().await.unwrap(),
            ConnectionSignal::Closed(CloseReason::LocalShutdown)
        );
        assert!(closed.load(Ordering::Relaxed));
        assert!(matches!(
            handle.send("x".into()),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let cfg = ConnectionConfig {
            signal_channel_capacity: 0,
            shutdown_timeout: Duration::from_millis(50),
        };
        let (mut handle, mut signals) = attach(transport, &cfg);
        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn slow_consumer_loses_no_frames() {
        let mut incoming: Vec<Scripted> = (0..20).map(|i| Some(Ok(format!("f{i}")))).collect();
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);
        let cfg = ConnectionConfig {
            signal_channel_capacity: 1,
            ..ConnectionConfig::default()
        };
        let (_handle, mut signals) = attach(transport, &cfg);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut frames = 0;
        while let Some(signal) = signals.recv().await {
            if matches!(signal, ConnectionSignal::Message(_)) {
                frames += 1;
            }
        }
        assert_eq!(frames, 20);
    }

    /// Transport whose `close()` never finishes.
    struct HangingCloseTransport {
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _frame: String) -> std::result::Result<(), ClientError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingCloseTransport {
            dropped: Arc::clone(&dropped),
        };
        let cfg = ConnectionConfig {
            shutdown_timeout: Duration::from_millis(20),
            ..ConnectionConfig::default()
        };
        let (mut handle, mut signals) = attach(transport, &cfg);
        assert_eq!(signals.recv().await.unwrap(), ConnectionSignal::Opened);

        handle.shutdown().await;

        assert!(dropped.load(Ordering::Acquire));
        assert_eq!(handle.phase(), ConnectionPhase::Closed);
    }
}

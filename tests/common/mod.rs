#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for EDU PARTY client integration tests.
//!
//! Provides a channel-driven [`MockTransport`] with its [`MockServer`]
//! controller, a [`MockConnector`], a [`RecordingView`], and helpers that
//! build server frames the way the game server writes them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use edu_party_client::connection::ConnectionPhase;
use edu_party_client::{ClientError, Connector, PlayerEntry, Screen, Transport, View};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

/// What the mock server does next.
#[derive(Debug)]
pub enum Incoming {
    Frame(String),
    Error(String),
    HangUp,
}

/// A channel-driven mock transport for integration testing.
///
/// Frames pushed through the paired [`MockServer`] are returned by `recv()`
/// in order. Once the server handle is dropped and the queue is empty,
/// `recv()` hangs so the connection stays up until shutdown.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// Test-side controller for a [`MockTransport`].
#[derive(Clone)]
pub struct MockServer {
    tx: mpsc::UnboundedSender<Incoming>,
    /// Frames the client wrote, in order.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

/// Create a connected transport/server pair.
pub fn mock_pair() -> (MockTransport, MockServer) {
    let (tx, incoming) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        incoming,
        sent: Arc::clone(&sent),
        closed: Arc::clone(&closed),
    };
    (transport, MockServer { tx, sent, closed })
}

impl MockServer {
    /// Queue one text frame for the client.
    pub fn push(&self, frame: impl Into<String>) {
        self.tx.send(Incoming::Frame(frame.into())).unwrap();
    }

    /// Queue a receive error.
    pub fn fail(&self, message: &str) {
        self.tx.send(Incoming::Error(message.into())).unwrap();
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.tx.send(Incoming::HangUp).unwrap();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Frames written so far, parsed as JSON.
    pub fn sent_values(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    /// Wait until at least `count` frames have been written.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.sent.lock().unwrap().len() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} sent frame(s)"));
        self.sent_values()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), ClientError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        match self.incoming.recv().await {
            Some(Incoming::Frame(frame)) => Some(Ok(frame)),
            Some(Incoming::Error(message)) => Some(Err(ClientError::TransportReceive(message))),
            Some(Incoming::HangUp) => None,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Connector that hands out one prepared [`MockTransport`].
///
/// A second connect, or a connector built with [`MockConnector::refusing`],
/// fails with a connection-refused I/O error.
pub struct MockConnector {
    transport: StdMutex<Option<MockTransport>>,
    /// Every URL a connection was attempted to.
    pub urls: Arc<StdMutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport: StdMutex::new(Some(transport)),
            urls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn refusing() -> Self {
        Self {
            transport: StdMutex::new(None),
            urls: Arc::new(StdMutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str) -> Result<MockTransport, ClientError> {
        self.urls.lock().unwrap().push(url.to_owned());
        self.transport.lock().unwrap().take().ok_or_else(|| {
            ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

// ── RecordingView ───────────────────────────────────────────────────

/// One call the session made on the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    Screen(Screen),
    Players(Vec<PlayerEntry>),
    Round(u32, String),
    Feedback(String),
    Modal(String, String),
    RequireRestart,
    Phase(ConnectionPhase),
    LobbyCode(String),
    HostControls(bool),
    Winner(String),
    Notice(String),
    ClearInput,
    DismissModal,
    RoundEnded(Option<u32>),
    LogicCheck(u32, u32),
}

/// View that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub calls: Vec<ViewCall>,
}

impl RecordingView {
    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&ViewCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    pub fn restarts(&self) -> usize {
        self.count(|c| matches!(c, ViewCall::RequireRestart))
    }

    pub fn modals(&self) -> usize {
        self.count(|c| matches!(c, ViewCall::Modal(..)))
    }

    pub fn last_screen(&self) -> Option<Screen> {
        self.calls.iter().rev().find_map(|c| match c {
            ViewCall::Screen(screen) => Some(*screen),
            _ => None,
        })
    }

    pub fn last_players(&self) -> Option<&[PlayerEntry]> {
        self.calls.iter().rev().find_map(|c| match c {
            ViewCall::Players(players) => Some(players.as_slice()),
            _ => None,
        })
    }

    pub fn notices(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ViewCall::Notice(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl View for RecordingView {
    fn show_screen(&mut self, screen: Screen) {
        self.calls.push(ViewCall::Screen(screen));
    }

    fn render_player_list(&mut self, players: &[PlayerEntry]) {
        self.calls.push(ViewCall::Players(players.to_vec()));
    }

    fn render_round(&mut self, round: u32, instruction: &str) {
        self.calls.push(ViewCall::Round(round, instruction.into()));
    }

    fn render_feedback(&mut self, text: &str) {
        self.calls.push(ViewCall::Feedback(text.into()));
    }

    fn show_modal(&mut self, title: &str, body: &str) {
        self.calls.push(ViewCall::Modal(title.into(), body.into()));
    }

    fn require_restart(&mut self) {
        self.calls.push(ViewCall::RequireRestart);
    }

    fn render_connection_phase(&mut self, phase: ConnectionPhase) {
        self.calls.push(ViewCall::Phase(phase));
    }

    fn render_lobby_code(&mut self, code: &str) {
        self.calls.push(ViewCall::LobbyCode(code.into()));
    }

    fn set_host_controls(&mut self, visible: bool) {
        self.calls.push(ViewCall::HostControls(visible));
    }

    fn render_winner(&mut self, winner: &str) {
        self.calls.push(ViewCall::Winner(winner.into()));
    }

    fn show_notice(&mut self, message: &str) {
        self.calls.push(ViewCall::Notice(message.into()));
    }

    fn clear_input(&mut self) {
        self.calls.push(ViewCall::ClearInput);
    }

    fn dismiss_modal(&mut self) {
        self.calls.push(ViewCall::DismissModal);
    }

    fn round_ended(&mut self, round: Option<u32>) {
        self.calls.push(ViewCall::RoundEnded(round));
    }

    fn render_logic_check(&mut self, alive_count: u32, eliminated_count: u32) {
        self.calls
            .push(ViewCall::LogicCheck(alive_count, eliminated_count));
    }
}

// ── Server frames ───────────────────────────────────────────────────
//
// Written with `json!`, independent of the crate's serde types.

pub fn lobby_created_json(code: &str) -> String {
    json!({ "type": "LOBBY_CREATED", "code": code }).to_string()
}

pub fn lobby_joined_json(code: &str) -> String {
    json!({ "type": "LOBBY_JOINED", "code": code }).to_string()
}

/// `PLAYER_LIST` with `(username, is_host)` rows and no ids.
pub fn player_list_json(players: &[(&str, bool)]) -> String {
    let players: Vec<Value> = players
        .iter()
        .map(|(username, is_host)| json!({ "username": username, "is_host": is_host }))
        .collect();
    json!({ "type": "PLAYER_LIST", "players": players }).to_string()
}

/// `PLAYER_LIST` with `(username, is_host, id)` rows.
pub fn player_list_with_ids_json(players: &[(&str, bool, u64)]) -> String {
    let players: Vec<Value> = players
        .iter()
        .map(|(username, is_host, id)| {
            json!({ "username": username, "is_host": is_host, "id": id })
        })
        .collect();
    json!({ "type": "PLAYER_LIST", "players": players }).to_string()
}

pub fn game_start_json() -> String {
    json!({ "type": "GAME_START" }).to_string()
}

pub fn round_start_json(round: u32, instruction: &str) -> String {
    json!({ "type": "ROUND_START", "round": round, "instruction": instruction }).to_string()
}

pub fn gamestate_json(msg: &str) -> String {
    json!({ "type": "gamestate", "msg": msg }).to_string()
}

pub fn round_end_json() -> String {
    json!({ "type": "ROUND_END" }).to_string()
}

pub fn logic_check_json(alive_count: u32, eliminated_count: u32) -> String {
    json!({
        "type": "LOGIC_CHECK",
        "alive_count": alive_count,
        "eliminated_count": eliminated_count,
    })
    .to_string()
}

pub fn eliminated_json() -> String {
    json!({ "type": "ELIMINATED" }).to_string()
}

pub fn game_over_json(winner: &str) -> String {
    json!({ "type": "GAME_OVER", "winner": winner }).to_string()
}

pub fn error_json(msg: &str) -> String {
    json!({ "type": "ERROR", "msg": msg }).to_string()
}

//! Client-side session state machine.
//!
//! [`Session`] is a plain value: it owns the whole client-side picture of the
//! game and is driven by exactly one owner (normally
//! [`PartyClient`](crate::client::PartyClient)). It never talks to the network
//! itself. Intents return the [`Command`] to send; signals and decoded events
//! update state and push the result into a [`View`].
//!
//! ```text
//! LoggedOut ─login─▶ Connecting ─Opened─▶ Menu ─LOBBY_*─▶ Lobby ─GAME_START─▶ InRound
//!                                                                               │
//!                                                      ELIMINATED ◀─────────────┤
//!                                                      GAME_OVER  ◀─────────────┘
//! any state ─Closed─▶ Closed
//! ```
//!
//! Eliminated, Finished and Closed are terminal: every later event is dropped.
//!
//! # Optimistic state
//!
//! Two things are assumed before the server confirms them: the host flag
//! (set when CREATE is sent) and the cleared answer field (cleared when
//! GAME_INPUT is sent). The host flag is an [`Optimistic`] value. When a
//! roster entry for this client arrives, its `is_host` replaces the assumption.

use tracing::{debug, warn};

use crate::connection::{CloseReason, ConnectionPhase};
use crate::endpoint::ClientId;
use crate::error::{ClientError, InputError, Result};
use crate::protocol::{Command, PlayerEntry, ServerEvent};
use crate::view::{Screen, View, CONNECTION_LOST_NOTICE, ELIMINATED_NOTICE};

// ── State types ─────────────────────────────────────────────────────

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Connecting,
    Menu,
    Lobby,
    InRound,
    Eliminated,
    Finished,
    Closed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::LoggedOut => "LoggedOut",
            Self::Connecting => "Connecting",
            Self::Menu => "Menu",
            Self::Lobby => "Lobby",
            Self::InRound => "InRound",
            Self::Eliminated => "Eliminated",
            Self::Finished => "Finished",
            Self::Closed => "Closed",
        }
    }

    /// No transitions leave a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Eliminated | Self::Finished | Self::Closed)
    }
}

/// Who this client is for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    client_id: ClientId,
    username: String,
}

impl ClientIdentity {
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A value assumed locally and later confirmed (or overridden) by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimistic<T> {
    value: T,
    confirmed: bool,
}

impl<T: PartialEq> Optimistic<T> {
    /// A local assumption the server has not confirmed yet.
    pub fn assumed(value: T) -> Self {
        Self {
            value,
            confirmed: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Replace the value with a fresh local assumption.
    pub fn assume(&mut self, value: T) {
        self.value = value;
        self.confirmed = false;
    }

    /// Apply the server's value. Returns `true` if it differed from ours.
    pub fn confirm(&mut self, value: T) -> bool {
        let changed = self.value != value;
        self.value = value;
        self.confirmed = true;
        changed
    }
}

/// The lobby this client belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lobby {
    code: String,
    is_host: Optimistic<bool>,
    players: Vec<PlayerEntry>,
}

impl Lobby {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_host(&self) -> bool {
        *self.is_host.get()
    }

    /// Whether the host flag has been confirmed by a roster entry.
    pub fn is_host_confirmed(&self) -> bool {
        self.is_host.is_confirmed()
    }

    pub fn players(&self) -> &[PlayerEntry] {
        &self.players
    }
}

/// The round currently being played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    number: u32,
    instruction: String,
}

impl Round {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// Elimination summary broadcast after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicCheck {
    pub alive_count: u32,
    pub eliminated_count: u32,
}

/// How the game ended for this client. Never leaves a terminal variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    None,
    Eliminated,
    Finished {
        winner: String,
    },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// The client-side session.
#[derive(Debug, Clone)]
pub struct Session {
    client_id: ClientId,
    identity: Option<ClientIdentity>,
    state: SessionState,
    host_intent: Optimistic<bool>,
    lobby: Option<Lobby>,
    pending_roster: Option<Vec<PlayerEntry>>,
    round: Option<Round>,
    feedback: Option<String>,
    logic_check: Option<LogicCheck>,
    announcement_open: bool,
    outcome: Outcome,
    close_reason: Option<CloseReason>,
    restart_requested: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A logged-out session with a freshly drawn client id.
    pub fn new() -> Self {
        Self::with_client_id(ClientId::random())
    }

    /// A logged-out session with a fixed client id.
    pub fn with_client_id(client_id: ClientId) -> Self {
        Self {
            client_id,
            identity: None,
            state: SessionState::LoggedOut,
            host_intent: Optimistic::assumed(false),
            lobby: None,
            pending_roster: None,
            round: None,
            feedback: None,
            logic_check: None,
            announcement_open: false,
            outcome: Outcome::None,
            close_reason: None,
            restart_requested: false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn lobby(&self) -> Option<&Lobby> {
        self.lobby.as_ref()
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn logic_check(&self) -> Option<LogicCheck> {
        self.logic_check
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Why the connection closed, once it has.
    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// `true` while a round announcement waits to be dismissed.
    pub fn is_announcement_open(&self) -> bool {
        self.announcement_open
    }

    /// `true` once the view has been told to restart the client.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Log in as `username`. On success the session is `Connecting` and the
    /// caller should open the connection for [`client_id`](Self::client_id).
    ///
    /// # Errors
    ///
    /// - [`InputError::EmptyUsername`] for a blank name (a notice is shown)
    /// - [`ClientError::InvalidState`] if already logged in
    pub fn login(&mut self, username: &str, view: &mut impl View) -> Result<&ClientIdentity> {
        if self.state != SessionState::LoggedOut {
            return Err(ClientError::InvalidState(self.state.name()));
        }
        if username.trim().is_empty() {
            return Err(self.reject(InputError::EmptyUsername, view));
        }

        debug!(client_id = %self.client_id, "logging in");
        self.state = SessionState::Connecting;
        view.render_connection_phase(ConnectionPhase::Connecting);

        let identity = ClientIdentity {
            client_id: self.client_id,
            username: username.to_owned(),
        };
        Ok(&*self.identity.insert(identity))
    }

    /// Ask the server for a new lobby. Assumes host status until told otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the session is not logged in or already over.
    pub fn create_lobby(&mut self) -> Result<Command> {
        let username = self.active_identity()?.username.clone();
        self.host_intent.assume(true);
        Ok(Command::Create { username })
    }

    /// Ask to join the lobby with `code`.
    ///
    /// # Errors
    ///
    /// - [`InputError::EmptyLobbyCode`] for a blank code (a notice is shown)
    /// - fails if the session is not logged in or already over
    pub fn join_lobby(&mut self, code: &str, view: &mut impl View) -> Result<Command> {
        let username = self.active_identity()?.username.clone();
        let code = code.trim();
        if code.is_empty() {
            return Err(self.reject(InputError::EmptyLobbyCode, view));
        }
        self.host_intent.assume(false);
        Ok(Command::Join {
            code: code.to_owned(),
            username,
        })
    }

    /// Ask the server to start the game. Only the host may, but the server
    /// is the one that checks.
    ///
    /// # Errors
    ///
    /// Fails if the session is not logged in or already over.
    pub fn start_game(&mut self) -> Result<Command> {
        self.active_identity()?;
        Ok(Command::StartGame)
    }

    /// Submit an answer. The answer field is cleared right away.
    ///
    /// # Errors
    ///
    /// - [`InputError::AnnouncementPending`] while a round announcement is up
    /// - fails if the session is not logged in or already over
    pub fn submit_input(&mut self, input: &str, view: &mut impl View) -> Result<Command> {
        self.active_identity()?;
        if self.announcement_open {
            return Err(InputError::AnnouncementPending.into());
        }
        view.clear_input();
        Ok(Command::GameInput {
            input: input.to_owned(),
        })
    }

    /// Dismiss the round announcement. Sends nothing.
    pub fn dismiss_announcement(&mut self, view: &mut impl View) {
        if self.announcement_open {
            self.announcement_open = false;
            view.dismiss_modal();
        }
    }

    // ── Connection signals ──────────────────────────────────────────

    /// The transport is up.
    pub fn on_opened(&mut self, view: &mut impl View) {
        if self.state != SessionState::Connecting {
            warn!(state = self.state.name(), "ignoring Opened outside Connecting");
            return;
        }
        self.state = SessionState::Menu;
        view.render_connection_phase(ConnectionPhase::Online);
        view.show_screen(Screen::Menu);
    }

    /// The connection is gone. Fatal for the session.
    pub fn on_closed(&mut self, reason: &CloseReason, view: &mut impl View) {
        if self.state == SessionState::Closed {
            debug!(%reason, "ignoring repeated Closed");
            return;
        }

        warn!(%reason, state = self.state.name(), "connection closed");
        self.state = SessionState::Closed;
        self.close_reason = Some(reason.clone());
        self.announcement_open = false;
        view.render_connection_phase(ConnectionPhase::Closed);
        if !self.restart_requested {
            view.show_notice(CONNECTION_LOST_NOTICE);
        }
        self.request_restart(view);
    }

    // ── Server events ───────────────────────────────────────────────

    /// Apply one decoded server event.
    pub fn apply_event(&mut self, event: ServerEvent, view: &mut impl View) {
        if self.state.is_terminal() {
            debug!(
                event = event.name(),
                state = self.state.name(),
                "dropping event after session end"
            );
            return;
        }

        match event {
            ServerEvent::LobbyCreated { code } | ServerEvent::LobbyJoined { code } => {
                self.enter_lobby(code, view);
            }
            ServerEvent::PlayerList { players } => self.update_roster(players, view),
            ServerEvent::GameStart => self.start_round_phase(view),
            ServerEvent::RoundStart { round, instruction } => {
                self.begin_round(round.get(), instruction, view);
            }
            ServerEvent::GameState { msg } => {
                if self.expect_in_round("gamestate") {
                    view.render_feedback(&msg);
                    self.feedback = Some(msg);
                }
            }
            ServerEvent::RoundEnd => {
                if self.expect_in_round("ROUND_END") {
                    view.round_ended(self.round.as_ref().map(Round::number));
                }
            }
            ServerEvent::LogicCheck {
                alive_count,
                eliminated_count,
            } => {
                if self.expect_in_round("LOGIC_CHECK") {
                    self.logic_check = Some(LogicCheck {
                        alive_count,
                        eliminated_count,
                    });
                    view.render_logic_check(alive_count, eliminated_count);
                }
            }
            ServerEvent::Eliminated => {
                if self.expect_in_round("ELIMINATED") {
                    self.finish(SessionState::Eliminated, Outcome::Eliminated);
                    view.show_notice(ELIMINATED_NOTICE);
                    self.request_restart(view);
                }
            }
            ServerEvent::GameOver { winner, .. } => {
                if self.expect_in_round("GAME_OVER") {
                    view.show_screen(Screen::Result);
                    view.render_winner(&winner);
                    self.finish(SessionState::Finished, Outcome::Finished { winner });
                }
            }
            ServerEvent::Error { msg } => {
                warn!(state = self.state.name(), "server error: {msg}");
                view.show_notice(&msg);
            }
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    fn enter_lobby(&mut self, code: String, view: &mut impl View) {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Menu | SessionState::Lobby
        ) {
            warn!(state = self.state.name(), "ignoring lobby acknowledgment");
            return;
        }
        if self.lobby.as_ref().is_some_and(|lobby| lobby.code == code) {
            debug!(code = %code, "ignoring repeated lobby acknowledgment");
            return;
        }

        debug!(code = %code, host = *self.host_intent.get(), "entered lobby");
        let mut lobby = Lobby {
            code,
            is_host: self.host_intent.clone(),
            players: self.pending_roster.take().unwrap_or_default(),
        };
        self.reconcile_host(&mut lobby);

        self.state = SessionState::Lobby;
        view.render_lobby_code(&lobby.code);
        view.show_screen(Screen::Lobby);
        view.set_host_controls(lobby.is_host());
        if !lobby.players.is_empty() {
            view.render_player_list(&lobby.players);
        }
        self.lobby = Some(lobby);
    }

    fn update_roster(&mut self, players: Vec<PlayerEntry>, view: &mut impl View) {
        match self.state {
            SessionState::Lobby | SessionState::InRound => {}
            SessionState::Connecting | SessionState::Menu => {
                debug!(
                    count = players.len(),
                    "buffering roster until the lobby is acknowledged"
                );
                self.pending_roster = Some(players);
                return;
            }
            state => {
                warn!(state = state.name(), "dropping PLAYER_LIST");
                return;
            }
        }

        let Some(mut lobby) = self.lobby.take() else {
            warn!("dropping PLAYER_LIST without a lobby");
            return;
        };
        lobby.players = players;
        let host_changed = self.reconcile_host(&mut lobby);
        view.render_player_list(&lobby.players);
        if host_changed {
            view.set_host_controls(lobby.is_host());
        }
        self.lobby = Some(lobby);
    }

    /// Let the roster's entry for this client override the assumed host flag.
    fn reconcile_host(&self, lobby: &mut Lobby) -> bool {
        let Some(identity) = &self.identity else {
            return false;
        };

        let by_id = lobby
            .players
            .iter()
            .find(|p| p.id == Some(identity.client_id.get()));
        let own = by_id.or_else(|| {
            let mut named = lobby
                .players
                .iter()
                .filter(|p| p.username == identity.username);
            match (named.next(), named.next()) {
                (Some(entry), None) => Some(entry),
                _ => None,
            }
        });

        match own.map(|entry| entry.is_host) {
            Some(server_says) => {
                let changed = lobby.is_host.confirm(server_says);
                if changed {
                    debug!(is_host = server_says, "server overrode host flag");
                }
                changed
            }
            None => false,
        }
    }

    fn start_round_phase(&mut self, view: &mut impl View) {
        if self.state != SessionState::Lobby {
            warn!(state = self.state.name(), "ignoring GAME_START outside Lobby");
            return;
        }
        self.state = SessionState::InRound;
        view.show_screen(Screen::Game);
    }

    fn begin_round(&mut self, number: u32, instruction: String, view: &mut impl View) {
        if !self.expect_in_round("ROUND_START") {
            return;
        }
        view.render_round(number, &instruction);
        if self.feedback.take().is_some() {
            view.render_feedback("");
        }
        view.show_modal(&format!("Round {number}"), &instruction);
        self.announcement_open = true;
        self.round = Some(Round {
            number,
            instruction,
        });
    }

    fn finish(&mut self, state: SessionState, outcome: Outcome) {
        debug!(state = state.name(), "session finished");
        self.state = state;
        self.outcome = outcome;
        self.announcement_open = false;
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn expect_in_round(&self, event: &'static str) -> bool {
        if self.state == SessionState::InRound {
            true
        } else {
            warn!(event, state = self.state.name(), "dropping event outside a round");
            false
        }
    }

    fn active_identity(&self) -> Result<&ClientIdentity> {
        match self.state {
            SessionState::Closed => Err(ClientError::ConnectionLost(
                self.close_reason
                    .as_ref()
                    .map_or_else(|| "connection closed".to_owned(), ToString::to_string),
            )),
            SessionState::Eliminated | SessionState::Finished => Err(ClientError::SessionOver),
            _ => self.identity.as_ref().ok_or(ClientError::NotLoggedIn),
        }
    }

    fn reject(&self, error: InputError, view: &mut impl View) -> ClientError {
        view.show_notice(&error.to_string());
        error.into()
    }

    fn request_restart(&mut self, view: &mut impl View) {
        if !self.restart_requested {
            self.restart_requested = true;
            view.require_restart();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    /// View that counts the calls the unit tests care about.
    #[derive(Default)]
    struct CountingView {
        modals: usize,
        restarts: usize,
        notices: Vec<String>,
        host_controls: Vec<bool>,
    }

    impl View for CountingView {
        fn show_screen(&mut self, _screen: Screen) {}
        fn render_player_list(&mut self, _players: &[PlayerEntry]) {}
        fn render_round(&mut self, _round: u32, _instruction: &str) {}
        fn render_feedback(&mut self, _text: &str) {}
        fn show_modal(&mut self, _title: &str, _body: &str) {
            self.modals += 1;
        }
        fn require_restart(&mut self) {
            self.restarts += 1;
        }
        fn show_notice(&mut self, message: &str) {
            self.notices.push(message.to_owned());
        }
        fn set_host_controls(&mut self, visible: bool) {
            self.host_controls.push(visible);
        }
    }

    fn online(view: &mut CountingView) -> Session {
        let mut session = Session::with_client_id(ClientId::new(11));
        session.login("Ada", view).unwrap();
        session.on_opened(view);
        session
    }

    #[test]
    fn optimistic_confirm_reports_change() {
        let mut flag = Optimistic::assumed(true);
        assert!(!flag.is_confirmed());
        assert!(!flag.confirm(true));
        assert!(flag.is_confirmed());
        assert!(flag.confirm(false));
        assert!(!*flag.get());
        flag.assume(true);
        assert!(!flag.is_confirmed());
    }

    #[test]
    fn login_twice_is_invalid_state() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        let err = session.login("Bob", &mut view).unwrap_err();
        assert!(matches!(err, ClientError::InvalidState("Menu")));
    }

    #[test]
    fn blank_username_shows_notice_without_state_change() {
        let mut view = CountingView::default();
        let mut session = Session::new();
        let err = session.login("   ", &mut view).unwrap_err();
        assert!(matches!(err, ClientError::Input(InputError::EmptyUsername)));
        assert_eq!(session.state(), SessionState::LoggedOut);
        assert!(session.identity().is_none());
        assert_eq!(view.notices, vec!["please enter a name"]);
    }

    #[test]
    fn intents_before_login_are_refused() {
        let mut session = Session::new();
        assert!(matches!(
            session.create_lobby(),
            Err(ClientError::NotLoggedIn)
        ));
        assert!(matches!(session.start_game(), Err(ClientError::NotLoggedIn)));
    }

    #[test]
    fn join_trims_code_and_clears_host_assumption() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        session.create_lobby().unwrap();
        let cmd = session.join_lobby(" 4821 ", &mut view).unwrap();
        assert_eq!(
            cmd,
            Command::Join {
                code: "4821".into(),
                username: "Ada".into()
            }
        );
        session.apply_event(ServerEvent::LobbyJoined { code: "4821".into() }, &mut view);
        assert!(!session.lobby().unwrap().is_host());
        assert_eq!(view.host_controls, vec![false]);
    }

    #[test]
    fn roster_matched_by_id_overrides_host_flag() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        session.create_lobby().unwrap();
        session.apply_event(ServerEvent::LobbyCreated { code: "1".into() }, &mut view);

        let players = vec![
            PlayerEntry::new("Host", true).with_id(99),
            PlayerEntry::new("Ada", false).with_id(11),
        ];
        session.apply_event(ServerEvent::PlayerList { players }, &mut view);

        let lobby = session.lobby().unwrap();
        assert!(!lobby.is_host());
        assert!(lobby.is_host_confirmed());
        assert_eq!(view.host_controls, vec![true, false]);
    }

    #[test]
    fn ambiguous_username_leaves_assumption() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        session.create_lobby().unwrap();
        session.apply_event(ServerEvent::LobbyCreated { code: "1".into() }, &mut view);

        let players = vec![PlayerEntry::new("Ada", false), PlayerEntry::new("Ada", false)];
        session.apply_event(ServerEvent::PlayerList { players }, &mut view);

        let lobby = session.lobby().unwrap();
        assert!(lobby.is_host());
        assert!(!lobby.is_host_confirmed());
    }

    #[test]
    fn restart_is_requested_once_after_elimination_and_close() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        session.apply_event(ServerEvent::LobbyJoined { code: "1".into() }, &mut view);
        session.apply_event(ServerEvent::GameStart, &mut view);
        session.apply_event(ServerEvent::Eliminated, &mut view);
        session.on_closed(&CloseReason::ServerClosed, &mut view);

        assert_eq!(view.restarts, 1);
        assert_eq!(view.notices, vec![ELIMINATED_NOTICE]);
        assert_eq!(session.outcome(), &Outcome::Eliminated);
    }

    #[test]
    fn submit_is_blocked_until_announcement_dismissed() {
        let mut view = CountingView::default();
        let mut session = online(&mut view);
        session.apply_event(ServerEvent::LobbyJoined { code: "1".into() }, &mut view);
        session.apply_event(ServerEvent::GameStart, &mut view);
        session.apply_event(
            ServerEvent::RoundStart {
                round: std::num::NonZeroU32::MIN,
                instruction: "5 + 5 = ?".into(),
            },
            &mut view,
        );

        assert!(matches!(
            session.submit_input("10", &mut view),
            Err(ClientError::Input(InputError::AnnouncementPending))
        ));
        session.dismiss_announcement(&mut view);
        assert_eq!(
            session.submit_input("10", &mut view).unwrap(),
            Command::GameInput { input: "10".into() }
        );
        assert_eq!(view.modals, 1);
    }
}

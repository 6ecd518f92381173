//! Presentation contract the session pushes state into.
//!
//! A [`View`] holds no protocol logic and is never queried. The six required
//! methods are what the session needs to be usable; the remaining hooks have
//! no-op defaults so a minimal view can ignore them.

use crate::connection::ConnectionPhase;
use crate::protocol::PlayerEntry;

/// Notice shown when the server eliminates this player.
pub const ELIMINATED_NOTICE: &str = "YOU DIED! Game Over.";

/// Notice shown when the connection is lost.
pub const CONNECTION_LOST_NOTICE: &str = "Connection Lost!";

/// Top-level screens of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Menu,
    Lobby,
    Game,
    Result,
}

/// Rendering side of the client.
pub trait View {
    /// Switch to `screen`, hiding every other one.
    fn show_screen(&mut self, screen: Screen);

    /// Replace the whole roster. Hosts are marked by `is_host`.
    fn render_player_list(&mut self, players: &[PlayerEntry]);

    /// Update the round header.
    fn render_round(&mut self, round: u32, instruction: &str);

    /// Replace the feedback line.
    fn render_feedback(&mut self, text: &str);

    /// Raise a modal announcement. It stays up until the user dismisses it.
    fn show_modal(&mut self, title: &str, body: &str);

    /// The session is over for good; the user must restart the client.
    fn require_restart(&mut self);

    /// Connection status badge.
    fn render_connection_phase(&mut self, _phase: ConnectionPhase) {}

    fn render_lobby_code(&mut self, _code: &str) {}

    /// Show or hide the host-only start controls.
    fn set_host_controls(&mut self, _visible: bool) {}

    fn render_winner(&mut self, _winner: &str) {}

    /// Blocking notice, e.g. for rejected input or a server error.
    fn show_notice(&mut self, _message: &str) {}

    /// Empty the answer field.
    fn clear_input(&mut self) {}

    /// Take down the modal and put focus back on the answer field.
    fn dismiss_modal(&mut self) {}

    fn round_ended(&mut self, _round: Option<u32>) {}

    fn render_logic_check(&mut self, _alive_count: u32, _eliminated_count: u32) {}
}

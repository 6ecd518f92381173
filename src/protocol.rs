//! Wire-compatible message types for the EDU PARTY game server.
//!
//! Frames are flat JSON objects. Outgoing commands carry a `command`
//! discriminator, incoming events carry a `type` discriminator. Field names
//! match the server exactly, including the lowercase `gamestate` event.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

// ── Structs ─────────────────────────────────────────────────────────

/// One row of the lobby roster as broadcast in `PLAYER_LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub username: String,
    pub is_host: bool,
    /// The player's client id, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl PlayerEntry {
    /// Create a roster entry without a client id.
    pub fn new(username: impl Into<String>, is_host: bool) -> Self {
        Self {
            username: username.into(),
            is_host,
            id: None,
        }
    }

    /// Attach the player's client id.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Commands sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    /// Create a new lobby; the sender becomes its host.
    #[serde(rename = "CREATE")]
    Create { username: String },
    /// Join an existing lobby by code.
    #[serde(rename = "JOIN")]
    Join { code: String, username: String },
    /// Ask the server to start the game (host only, server-validated).
    #[serde(rename = "START_GAME")]
    StartGame,
    /// Answer for the current round. May be empty.
    #[serde(rename = "GAME_INPUT")]
    GameInput { input: String },
}

impl Command {
    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "CREATE",
            Self::Join { .. } => "JOIN",
            Self::StartGame => "START_GAME",
            Self::GameInput { .. } => "GAME_INPUT",
        }
    }
}

/// Events sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A lobby was created for us.
    #[serde(rename = "LOBBY_CREATED")]
    LobbyCreated { code: String },
    /// We joined an existing lobby.
    #[serde(rename = "LOBBY_JOINED")]
    LobbyJoined { code: String },
    /// Full lobby roster. Replaces any previous roster.
    #[serde(rename = "PLAYER_LIST")]
    PlayerList { players: Vec<PlayerEntry> },
    /// The host started the game.
    #[serde(rename = "GAME_START")]
    GameStart,
    /// A new round begins. Rounds are numbered from 1.
    #[serde(rename = "ROUND_START")]
    RoundStart {
        round: NonZeroU32,
        instruction: String,
    },
    /// Feedback on our latest input ("Correct!", "Wrong!").
    #[serde(rename = "gamestate")]
    GameState { msg: String },
    /// The current round's timer ran out.
    #[serde(rename = "ROUND_END")]
    RoundEnd,
    /// Elimination summary after a round.
    #[serde(rename = "LOGIC_CHECK")]
    LogicCheck {
        alive_count: u32,
        eliminated_count: u32,
    },
    /// We were eliminated.
    #[serde(rename = "ELIMINATED")]
    Eliminated,
    /// The game ended.
    #[serde(rename = "GAME_OVER")]
    GameOver {
        winner: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner_id: Option<u64>,
    },
    /// The server rejected a request (e.g. unknown lobby code).
    #[serde(rename = "ERROR")]
    Error { msg: String },
}

impl ServerEvent {
    /// Every `type` discriminator this client understands.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "LOBBY_CREATED",
        "LOBBY_JOINED",
        "PLAYER_LIST",
        "GAME_START",
        "ROUND_START",
        "gamestate",
        "ROUND_END",
        "LOGIC_CHECK",
        "ELIMINATED",
        "GAME_OVER",
        "ERROR",
    ];

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LobbyCreated { .. } => "LOBBY_CREATED",
            Self::LobbyJoined { .. } => "LOBBY_JOINED",
            Self::PlayerList { .. } => "PLAYER_LIST",
            Self::GameStart => "GAME_START",
            Self::RoundStart { .. } => "ROUND_START",
            Self::GameState { .. } => "gamestate",
            Self::RoundEnd => "ROUND_END",
            Self::LogicCheck { .. } => "LOGIC_CHECK",
            Self::Eliminated => "ELIMINATED",
            Self::GameOver { .. } => "GAME_OVER",
            Self::Error { .. } => "ERROR",
        }
    }

    /// Returns `true` if `type_name` is a discriminator this client decodes.
    pub fn is_known_type(type_name: &str) -> bool {
        Self::KNOWN_TYPES.contains(&type_name)
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

    #[test]
    fn command_names_match_serialized_tag() {
        let commands = [
            Command::Create {
                username: "a".into(),
            },
            Command::Join {
                code: "1234".into(),
                username: "a".into(),
            },
            Command::StartGame,
            Command::GameInput { input: "".into() },
        ];
        for cmd in commands {
            let value = serde_json::to_value(&cmd).unwrap();
            assert_eq!(value["command"], cmd.name());
        }
    }

    #[test]
    fn known_types_cover_every_event_name() {
        let events = [
            ServerEvent::LobbyCreated { code: "1".into() },
            ServerEvent::LobbyJoined { code: "1".into() },
            ServerEvent::PlayerList { players: vec![] },
            ServerEvent::GameStart,
            ServerEvent::RoundStart {
                round: NonZeroU32::MIN,
                instruction: "x".into(),
            },
            ServerEvent::GameState { msg: "x".into() },
            ServerEvent::RoundEnd,
            ServerEvent::LogicCheck {
                alive_count: 1,
                eliminated_count: 1,
            },
            ServerEvent::Eliminated,
            ServerEvent::GameOver {
                winner: "x".into(),
                winner_id: None,
            },
            ServerEvent::Error { msg: "x".into() },
        ];
        assert_eq!(events.len(), ServerEvent::KNOWN_TYPES.len());
        for event in events {
            assert!(ServerEvent::is_known_type(event.name()));
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }

    #[test]
    fn player_entry_omits_missing_id() {
        let json = serde_json::to_string(&PlayerEntry::new("A", true)).unwrap();
        assert_eq!(json, r#"{"username":"A","is_host":true}"#);
    }
}

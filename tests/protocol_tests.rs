#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire format tests for the EDU PARTY client.
//!
//! Commands are checked against an independent `serde_json::Value` decoder,
//! events against JSON fixtures shaped like real server output.

mod common;

use std::num::NonZeroU32;

use edu_party_client::codec::{self, DecodeError};
use edu_party_client::protocol::{Command, PlayerEntry, ServerEvent};
use serde_json::{json, Value};

use common::{
    error_json, game_over_json, gamestate_json, logic_check_json, player_list_json,
    player_list_with_ids_json, round_start_json,
};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Decode a command frame without going through the crate's serde types.
fn harness_decode(frame: &str) -> Command {
    let value: Value = serde_json::from_str(frame).expect("frame is JSON");
    let field = |name: &str| -> String {
        value[name]
            .as_str()
            .unwrap_or_else(|| panic!("missing string field {name} in {frame}"))
            .to_owned()
    };
    match value["command"].as_str().expect("command discriminator") {
        "CREATE" => Command::Create {
            username: field("username"),
        },
        "JOIN" => Command::Join {
            code: field("code"),
            username: field("username"),
        },
        "START_GAME" => Command::StartGame,
        "GAME_INPUT" => Command::GameInput {
            input: field("input"),
        },
        other => panic!("unexpected command {other}"),
    }
}

fn assert_encodes_to_itself(command: Command) {
    let frame = codec::encode(&command).expect("encode");
    assert_eq!(harness_decode(&frame), command, "frame: {frame}");
}

// ════════════════════════════════════════════════════════════════════
// Command encoding
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_command_round_trips_through_independent_decoder() {
    let commands = [
        Command::Create {
            username: "Ada".into(),
        },
        Command::Create {
            username: "Zoë \"the\" Great".into(),
        },
        Command::Join {
            code: "4821".into(),
            username: "Bob".into(),
        },
        Command::StartGame,
        Command::GameInput {
            input: "10".into(),
        },
        Command::GameInput {
            input: String::new(),
        },
    ];
    for command in commands {
        assert_encodes_to_itself(command);
    }
}

#[test]
fn create_frame_is_flat() {
    let frame = codec::encode(&Command::Create {
        username: "Ada".into(),
    })
    .unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value, json!({ "command": "CREATE", "username": "Ada" }));
}

#[test]
fn join_frame_carries_code_and_username() {
    let frame = codec::encode(&Command::Join {
        code: "AB12".into(),
        username: "Bob".into(),
    })
    .unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(
        value,
        json!({ "command": "JOIN", "code": "AB12", "username": "Bob" })
    );
}

#[test]
fn start_game_frame_has_only_the_discriminator() {
    let frame = codec::encode(&Command::StartGame).unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value, json!({ "command": "START_GAME" }));
}

#[test]
fn empty_game_input_is_still_sent() {
    let frame = codec::encode(&Command::GameInput {
        input: String::new(),
    })
    .unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value, json!({ "command": "GAME_INPUT", "input": "" }));
}

// ════════════════════════════════════════════════════════════════════
// Server JSON fixture tests
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_lobby_created() {
    let event = codec::decode(r#"{"type":"LOBBY_CREATED","code":"4821"}"#).unwrap();
    assert_eq!(
        event,
        ServerEvent::LobbyCreated {
            code: "4821".into()
        }
    );
}

#[test]
fn fixture_lobby_joined() {
    let event = codec::decode(r#"{"type":"LOBBY_JOINED","code":"4821"}"#).unwrap();
    assert_eq!(
        event,
        ServerEvent::LobbyJoined {
            code: "4821".into()
        }
    );
}

#[test]
fn fixture_player_list_keeps_order() {
    let event = codec::decode(&player_list_json(&[("A", true), ("B", false)])).unwrap();
    let ServerEvent::PlayerList { players } = event else {
        panic!("expected PlayerList, got {event:?}");
    };
    assert_eq!(
        players,
        vec![PlayerEntry::new("A", true), PlayerEntry::new("B", false)]
    );
}

#[test]
fn fixture_player_list_with_ids() {
    let event = codec::decode(&player_list_with_ids_json(&[("Ada", true, 42)])).unwrap();
    assert_eq!(
        event,
        ServerEvent::PlayerList {
            players: vec![PlayerEntry::new("Ada", true).with_id(42)]
        }
    );
}

#[test]
fn fixture_empty_player_list() {
    let event = codec::decode(r#"{"type":"PLAYER_LIST","players":[]}"#).unwrap();
    assert_eq!(event, ServerEvent::PlayerList { players: vec![] });
}

#[test]
fn fixture_game_start() {
    let event = codec::decode(r#"{"type":"GAME_START"}"#).unwrap();
    assert_eq!(event, ServerEvent::GameStart);
}

#[test]
fn fixture_round_start() {
    let event = codec::decode(&round_start_json(3, "Jump!")).unwrap();
    assert_eq!(
        event,
        ServerEvent::RoundStart {
            round: NonZeroU32::new(3).unwrap(),
            instruction: "Jump!".into()
        }
    );
}

#[test]
fn fixture_gamestate_is_lowercase() {
    let event = codec::decode(&gamestate_json("Correct!")).unwrap();
    assert_eq!(
        event,
        ServerEvent::GameState {
            msg: "Correct!".into()
        }
    );
    assert!(matches!(
        codec::decode(r#"{"type":"GAMESTATE","msg":"Correct!"}"#),
        Err(DecodeError::UnknownType(Some(kind))) if kind == "GAMESTATE"
    ));
}

#[test]
fn fixture_round_end_and_logic_check() {
    assert_eq!(
        codec::decode(r#"{"type":"ROUND_END"}"#).unwrap(),
        ServerEvent::RoundEnd
    );
    assert_eq!(
        codec::decode(&logic_check_json(3, 2)).unwrap(),
        ServerEvent::LogicCheck {
            alive_count: 3,
            eliminated_count: 2
        }
    );
}

#[test]
fn fixture_eliminated() {
    assert_eq!(
        codec::decode(r#"{"type":"ELIMINATED"}"#).unwrap(),
        ServerEvent::Eliminated
    );
}

#[test]
fn fixture_game_over_with_and_without_winner_id() {
    assert_eq!(
        codec::decode(&game_over_json("Ada")).unwrap(),
        ServerEvent::GameOver {
            winner: "Ada".into(),
            winner_id: None
        }
    );
    assert_eq!(
        codec::decode(r#"{"type":"GAME_OVER","winner":"No one","winner_id":null}"#).unwrap(),
        ServerEvent::GameOver {
            winner: "No one".into(),
            winner_id: None
        }
    );
    assert_eq!(
        codec::decode(r#"{"type":"GAME_OVER","winner":"Ada","winner_id":77}"#).unwrap(),
        ServerEvent::GameOver {
            winner: "Ada".into(),
            winner_id: Some(77)
        }
    );
}

#[test]
fn fixture_error() {
    assert_eq!(
        codec::decode(&error_json("Lobby not found")).unwrap(),
        ServerEvent::Error {
            msg: "Lobby not found".into()
        }
    );
}

#[test]
fn extra_fields_are_ignored() {
    let event =
        codec::decode(r#"{"type":"LOBBY_CREATED","code":"1","server_time":12345}"#).unwrap();
    assert_eq!(event, ServerEvent::LobbyCreated { code: "1".into() });
}

// ════════════════════════════════════════════════════════════════════
// Decode failures
// ════════════════════════════════════════════════════════════════════

#[test]
fn unknown_event_type_is_reported_not_fatal() {
    let err = codec::decode(r#"{"type":"UNKNOWN_EVENT","x":1}"#).unwrap_err();
    assert_eq!(err, DecodeError::UnknownType(Some("UNKNOWN_EVENT".into())));
}

#[test]
fn missing_type_is_unknown_type() {
    let err = codec::decode(r#"{"code":"4821"}"#).unwrap_err();
    assert_eq!(err, DecodeError::UnknownType(None));
    assert_eq!(err.to_string(), "unknown event type: <missing>");
}

#[test]
fn non_string_type_is_unknown_type() {
    let err = codec::decode(r#"{"type":7}"#).unwrap_err();
    assert_eq!(err, DecodeError::UnknownType(Some("7".into())));
}

#[test]
fn invalid_json_is_malformed() {
    for frame in ["", "not json", "{\"type\":", "[1,2,3]", "\"LOBBY_CREATED\"", "null"] {
        assert!(
            matches!(codec::decode(frame), Err(DecodeError::Malformed(_))),
            "frame {frame:?} should be malformed"
        );
    }
}

#[test]
fn known_type_with_missing_fields_is_malformed() {
    let cases = [
        r#"{"type":"LOBBY_CREATED"}"#,
        r#"{"type":"PLAYER_LIST"}"#,
        r#"{"type":"PLAYER_LIST","players":[{"username":"A"}]}"#,
        r#"{"type":"ROUND_START","round":1}"#,
        r#"{"type":"gamestate"}"#,
        r#"{"type":"GAME_OVER"}"#,
    ];
    for frame in cases {
        assert!(
            matches!(codec::decode(frame), Err(DecodeError::Malformed(_))),
            "frame {frame} should be malformed"
        );
    }
}

#[test]
fn round_zero_is_malformed() {
    let frame = r#"{"type":"ROUND_START","round":0,"instruction":"Jump!"}"#;
    assert!(matches!(
        codec::decode(frame),
        Err(DecodeError::Malformed(_))
    ));
    assert!(codec::decode(&round_start_json(1, "Jump!")).is_ok());
}

#[test]
fn known_type_with_wrong_field_types_is_malformed() {
    let cases = [
        r#"{"type":"ROUND_START","round":"three","instruction":"Jump!"}"#,
        r#"{"type":"ROUND_START","round":-1,"instruction":"Jump!"}"#,
        r#"{"type":"LOBBY_JOINED","code":4821}"#,
        r#"{"type":"PLAYER_LIST","players":{"username":"A","is_host":true}}"#,
    ];
    for frame in cases {
        assert!(
            matches!(codec::decode(frame), Err(DecodeError::Malformed(_))),
            "frame {frame} should be malformed"
        );
    }
}

#[test]
fn every_known_type_has_a_variant() {
    for kind in ServerEvent::KNOWN_TYPES {
        assert!(ServerEvent::is_known_type(kind));
        // A bare frame is either a unit event or malformed; never unknown.
        let frame = json!({ "type": kind }).to_string();
        assert!(
            !matches!(codec::decode(&frame), Err(DecodeError::UnknownType(_))),
            "{kind} reported as unknown"
        );
    }
}

//! # Terminal Lobby Example
//!
//! Plays EDU PARTY from a terminal:
//!
//! 1. Log in and connect to the game server over WebSocket
//! 2. Create a lobby or join one by code
//! 3. Start the game (host) and answer each round
//! 4. Restart or quit once the session ends
//!
//! Commands are typed one per line:
//!
//! | Input          | Effect                               |
//! |----------------|--------------------------------------|
//! | `/login NAME`  | log in as NAME and connect           |
//! | `/create`      | create a lobby                       |
//! | `/join CODE`   | join the lobby with CODE             |
//! | `/start`       | start the game (host only)           |
//! | `/ok`          | dismiss the round announcement       |
//! | `/restart`     | start over with a fresh session      |
//! | `/quit`        | leave                                |
//! | anything else  | submit it as the answer              |
//!
//! ## Running
//!
//! ```sh
//! # Start the game server on localhost:8000, then:
//! cargo run --example terminal_lobby
//!
//! # Override the server:
//! EDU_PARTY_URL=wss://party.example.com cargo run --example terminal_lobby
//! ```

use edu_party_client::connection::ConnectionPhase;
use edu_party_client::{ClientConfig, Endpoint, PartyClient, PlayerEntry, Screen, View};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server when `EDU_PARTY_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000";

// ── View ────────────────────────────────────────────────────────────

/// Prints everything the session pushes.
struct TerminalView;

impl View for TerminalView {
    fn show_screen(&mut self, screen: Screen) {
        let hint = match screen {
            Screen::Login => "type /login NAME",
            Screen::Menu => "type /create or /join CODE",
            Screen::Lobby => "waiting for players",
            Screen::Game => "game on",
            Screen::Result => "game over",
        };
        println!("== {screen:?} == ({hint})");
    }

    fn render_player_list(&mut self, players: &[PlayerEntry]) {
        println!("Players:");
        for player in players {
            let crown = if player.is_host { " (host)" } else { "" };
            println!("  - {}{crown}", player.username);
        }
    }

    fn render_round(&mut self, round: u32, instruction: &str) {
        println!("Round {round}: {instruction}");
    }

    fn render_feedback(&mut self, text: &str) {
        if !text.is_empty() {
            println!("> {text}");
        }
    }

    fn show_modal(&mut self, title: &str, body: &str) {
        println!("*** {title} ***\n    {body}\n    (type /ok to continue)");
    }

    fn require_restart(&mut self) {
        println!("Session over. Type /restart to play again or /quit to leave.");
    }

    fn render_connection_phase(&mut self, phase: ConnectionPhase) {
        println!("[{phase:?}]");
    }

    fn render_lobby_code(&mut self, code: &str) {
        println!("Lobby code: {code}");
    }

    fn set_host_controls(&mut self, visible: bool) {
        if visible {
            println!("You are the host. Type /start when everyone is in.");
        }
    }

    fn render_winner(&mut self, winner: &str) {
        println!("Winner: {winner}");
    }

    fn show_notice(&mut self, message: &str) {
        println!("!! {message}");
    }

    fn round_ended(&mut self, round: Option<u32>) {
        if let Some(round) = round {
            println!("Round {round} is over.");
        }
    }

    fn render_logic_check(&mut self, alive_count: u32, eliminated_count: u32) {
        println!("{alive_count} still standing, {eliminated_count} eliminated");
    }
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for frame-level output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("EDU_PARTY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let endpoint = Endpoint::parse(&url).ok_or_else(|| format!("invalid server URL: {url}"))?;
    tracing::info!("Using server {endpoint}");

    let mut client = PartyClient::websocket(ClientConfig::new(endpoint), TerminalView);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut connected = false;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            more = client.step(), if connected => {
                connected = more;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

                let result = match command {
                    "/login" => {
                        let result = client.login(arg);
                        connected |= result.is_ok();
                        result
                    }
                    "/create" => client.create_lobby(),
                    "/join" => client.join_lobby(arg),
                    "/start" => client.start_game(),
                    "/ok" => {
                        client.dismiss_announcement();
                        Ok(())
                    }
                    "/restart" => {
                        client.restart().await;
                        connected = false;
                        Ok(())
                    }
                    "/quit" => break,
                    _ => client.submit_input(line),
                };

                if let Err(e) = result {
                    tracing::warn!("{e}");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Goodbye!");
    Ok(())
}

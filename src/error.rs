//! Error types for the EDU PARTY client.

use thiserror::Error;

/// Rejected user input at the intent boundary.
///
/// These never change session state. The session shows a blocking notice
/// through the view and hands the error back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    /// Login was attempted with an empty (or whitespace-only) username.
    #[error("please enter a name")]
    EmptyUsername,

    /// A join was attempted without a lobby code.
    #[error("please enter a lobby code")]
    EmptyLobbyCode,

    /// Input was submitted while a round announcement is still on screen.
    #[error("dismiss the round announcement first")]
    AnnouncementPending,
}

/// Errors that can occur when using the EDU PARTY client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The user supplied invalid input.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize an outgoing command.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation needs an open connection, but there is none.
    #[error("not connected to server")]
    NotConnected,

    /// The operation needs a logged-in identity.
    #[error("not logged in")]
    NotLoggedIn,

    /// The intent is not valid in the current session state.
    #[error("operation not valid in session state {0}")]
    InvalidState(&'static str),

    /// The session reached a terminal outcome and accepts no more intents.
    #[error("session is over, restart the client")]
    SessionOver,

    /// The connection was lost. Fatal for the session.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn input_error_converts_into_client_error() {
        let err: ClientError = InputError::EmptyLobbyCode.into();
        assert!(matches!(
            err,
            ClientError::Input(InputError::EmptyLobbyCode)
        ));
        assert_eq!(err.to_string(), "please enter a lobby code");
    }

    #[test]
    fn invalid_state_names_the_state() {
        let err = ClientError::InvalidState("Lobby");
        assert_eq!(err.to_string(), "operation not valid in session state Lobby");
    }
}

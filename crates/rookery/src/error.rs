//! Unified error type for the Rookery chess server.

use rookery_protocol::ProtocolError;
use rookery_room::RoomError;
use rookery_session::SessionError;
use rookery_transport::TransportError;

/// Top-level error that wraps every sub-crate's error type.
///
/// The `#[from]` attribute on each variant auto-generates a `From` impl, so
/// `?` converts a sub-crate error automatically anywhere this is the return
/// type — the handler and server modules are the only callers that see this
/// directly.
#[derive(Debug, thiserror::Error)]
pub enum RookeryError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, unknown identity).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A startup configuration error — a malformed or inconsistent
    /// environment setting, rejected before the server binds.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rookery_protocol::RoomId;

    #[test]
    fn from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let rookery_err: RookeryError = err.into();
        assert!(matches!(rookery_err, RookeryError::Transport(_)));
        assert!(rookery_err.to_string().contains("gone"));
    }

    #[test]
    fn from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let rookery_err: RookeryError = err.into();
        assert!(matches!(rookery_err, RookeryError::Protocol(_)));
    }

    #[test]
    fn from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let rookery_err: RookeryError = err.into();
        assert!(matches!(rookery_err, RookeryError::Session(_)));
    }

    #[test]
    fn from_room_error() {
        let err = RoomError::NotFound(RoomId::new("ab12cd"));
        let rookery_err: RookeryError = err.into();
        assert!(matches!(rookery_err, RookeryError::Room(_)));
    }

    #[test]
    fn config_error_carries_its_message() {
        let err = RookeryError::Config("PORT must be a number".into());
        assert!(err.to_string().contains("PORT must be a number"));
    }
}

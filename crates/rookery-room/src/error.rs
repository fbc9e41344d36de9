//! Error types for the room layer.
//!
//! Every variant here maps onto exactly one [`ErrorCode`] through the
//! exhaustive match in [`RoomError::to_error_code`] — a new variant with no
//! arm in that match fails to compile, which is the enforcement mechanism
//! spec'd for every layer in this workspace.

use rookery_protocol::{ErrorCode, RoomId};
use rookery_rules::RulesError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("payload failed validation: {0}")]
    ValidationFailed(String),

    /// The caller has no session at all (e.g. `game:move` from an identity
    /// that was never admitted to any room).
    #[error("identity has no active session")]
    NotConnected,

    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Room creation or join rejected because the identity already holds a
    /// non-finished session elsewhere (data model invariant 2).
    #[error("identity already has a non-finished room")]
    AlreadyInRoom,

    #[error("room {0} is locked")]
    RoomLocked(RoomId),

    #[error("room {0} requires a password")]
    PasswordRequired(RoomId),

    #[error("incorrect password for room {0}")]
    PasswordIncorrect(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("room {0} is not accepting new players")]
    JoinNotAllowed(RoomId),

    #[error("room {0} is not accepting spectators")]
    SpectateNotAllowed(RoomId),

    #[error("identity is not a player of room {0}")]
    NotAPlayer(RoomId),

    #[error("it is not this player's turn")]
    NotYourTurn,

    #[error("room {0}'s game is not in progress")]
    GameNotInProgress(RoomId),

    /// Wraps the rules adapter's own error — `PromotionRequired` gets its
    /// own wire code, everything else here collapses to `invalid_move`.
    #[error("invalid move: {0}")]
    InvalidMove(#[from] RulesError),

    #[error("no draw offer is outstanding in room {0}")]
    NoDrawOffer(RoomId),

    #[error("cannot accept your own draw offer")]
    CannotAcceptOwnDraw,

    #[error("operation requires host privileges")]
    HostOnly,

    #[error("kick may only target a spectator, not a player")]
    CannotKickPlayer,

    /// The room actor's command channel is gone — from the caller's view
    /// this is indistinguishable from the room no longer existing.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// An invariant the state machine itself should have prevented was
    /// about to be violated. Per spec, this aborts the operation rather
    /// than silently applying it.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl RoomError {
    /// The stable wire error code a client sees for this failure.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            RoomError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            RoomError::NotConnected => ErrorCode::NotConnected,
            RoomError::NotFound(_) => ErrorCode::NotFound,
            RoomError::AlreadyInRoom => ErrorCode::AlreadyInRoom,
            RoomError::RoomLocked(_) => ErrorCode::RoomLocked,
            RoomError::PasswordRequired(_) => ErrorCode::PasswordRequired,
            RoomError::PasswordIncorrect(_) => ErrorCode::PasswordIncorrect,
            RoomError::RoomFull(_) => ErrorCode::RoomFull,
            RoomError::JoinNotAllowed(_) => ErrorCode::JoinNotAllowed,
            RoomError::SpectateNotAllowed(_) => ErrorCode::SpectateNotAllowed,
            RoomError::NotAPlayer(_) => ErrorCode::NotAPlayer,
            RoomError::NotYourTurn => ErrorCode::NotYourTurn,
            RoomError::GameNotInProgress(_) => ErrorCode::GameNotInProgress,
            RoomError::InvalidMove(rules_err) => match rules_err {
                RulesError::PromotionRequired => ErrorCode::PromotionRequired,
                RulesError::IllegalMove
                | RulesError::InvalidSquare(_)
                | RulesError::PromotionNotAllowed => ErrorCode::InvalidMove,
                RulesError::InvalidPosition(_) => ErrorCode::Internal,
            },
            RoomError::NoDrawOffer(_) => ErrorCode::NoDrawOffer,
            RoomError::CannotAcceptOwnDraw => ErrorCode::CannotAcceptOwnDraw,
            RoomError::HostOnly => ErrorCode::HostOnly,
            RoomError::CannotKickPlayer => ErrorCode::CannotKickPlayer,
            RoomError::Unavailable(_) => ErrorCode::NotFound,
            RoomError::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_required_gets_its_own_code() {
        let err = RoomError::InvalidMove(RulesError::PromotionRequired);
        assert_eq!(err.to_error_code(), ErrorCode::PromotionRequired);
    }

    #[test]
    fn illegal_move_collapses_to_invalid_move() {
        let err = RoomError::InvalidMove(RulesError::IllegalMove);
        assert_eq!(err.to_error_code(), ErrorCode::InvalidMove);
    }

    #[test]
    fn unavailable_reads_as_not_found_to_the_client() {
        let err = RoomError::Unavailable(RoomId::new("ab12cd"));
        assert_eq!(err.to_error_code(), ErrorCode::NotFound);
    }
}

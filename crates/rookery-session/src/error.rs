//! Error types for the session layer.

/// Errors that can occur during session registry operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token verification failed (bad signature, expired, wrong `type`
    /// claim, malformed). Per the Identity Resolver's demotion rule, a
    /// caller never surfaces this as a rejected connection — it's only
    /// used internally to decide to fall through to the guest/connection
    /// path.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given identity.
    #[error("no session for {0}")]
    NotFound(String),

    /// The identity already has a connected session. A stable identity
    /// participates in at most one room at a time (data model invariant 2);
    /// registering a second session while the first is still connected
    /// would violate it.
    #[error("{0} already has an active session")]
    AlreadyConnected(String),
}

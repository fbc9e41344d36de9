//! Stable identity: the three-way sum the Identity Resolver produces for
//! every connection before any room operation is allowed.
//!
//! `Authenticated` and `Guest` differ from `Connection` in exactly one way:
//! they survive a reconnect (the Session Registry is keyed by identity, not
//! by connection), because the same bearer token or the same client-persisted
//! guest id re-derives the identical value on the next handshake. A bare
//! connection handle cannot — once that socket closes, there is nothing left
//! to look the session up by.

use std::fmt;

use rookery_transport::ConnectionId;

/// A participant's stable identity, as resolved by the Identity Resolver.
///
/// Dispatch on the variant rather than null-checking a "logged in" flag —
/// every room operation that needs to tell players apart from each other
/// (admission, kick targets, draw-offer authorship) keys off this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A verified user id from a bearer token. Survives reconnect.
    Authenticated(String),
    /// An opaque, client-persisted guest id. Survives reconnect, but isn't
    /// backed by any account — just whatever the client remembers.
    Guest(String),
    /// No token and no guest id were presented; the connection handle
    /// itself is the identity. Cannot survive reconnect, since a new
    /// connection gets a new handle with nothing to tie it to the old one.
    Connection(ConnectionId),
}

impl Identity {
    /// `true` for identities that can be looked up again across a new
    /// connection (i.e. everything except a bare [`Identity::Connection`]).
    pub fn is_reconnectable(&self) -> bool {
        !matches!(self, Identity::Connection(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Authenticated(id) => write!(f, "user:{id}"),
            Identity::Guest(id) => write!(f, "guest:{id}"),
            Identity::Connection(id) => write!(f, "{id}"),
        }
    }
}

/// Parses the inverse of [`Display`](fmt::Display) — needed to turn a
/// `targetId` string off the wire (e.g. `room:kick`'s target) back into the
/// `Identity` it was rendered from.
impl std::str::FromStr for Identity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("user:") {
            Ok(Identity::Authenticated(id.to_string()))
        } else if let Some(id) = s.strip_prefix("guest:") {
            Ok(Identity::Guest(id.to_string()))
        } else if let Some(id) = s.strip_prefix("conn-") {
            id.parse::<u64>()
                .map(|n| Identity::Connection(ConnectionId::new(n)))
                .map_err(|_| ())
        } else {
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_and_guest_are_reconnectable() {
        assert!(Identity::Authenticated("u1".into()).is_reconnectable());
        assert!(Identity::Guest("g1".into()).is_reconnectable());
    }

    #[test]
    fn bare_connection_is_not_reconnectable() {
        assert!(!Identity::Connection(ConnectionId::new(1)).is_reconnectable());
    }

    #[test]
    fn distinct_identities_hash_and_compare_independently() {
        let a = Identity::Authenticated("same-id".into());
        let g = Identity::Guest("same-id".into());
        assert_ne!(a, g, "a user id and a guest id must never collide");
    }

    #[test]
    fn display_is_stable_and_namespaced() {
        assert_eq!(Identity::Authenticated("42".into()).to_string(), "user:42");
        assert_eq!(Identity::Guest("abc".into()).to_string(), "guest:abc");
    }

    #[test]
    fn from_str_is_the_inverse_of_display_for_every_variant() {
        let authenticated = Identity::Authenticated("42".into());
        let guest = Identity::Guest("abc".into());
        let connection = Identity::Connection(ConnectionId::new(7));

        assert_eq!(authenticated.to_string().parse::<Identity>().unwrap(), authenticated);
        assert_eq!(guest.to_string().parse::<Identity>().unwrap(), guest);
        assert_eq!(connection.to_string().parse::<Identity>().unwrap(), connection);
    }

    #[test]
    fn from_str_rejects_an_unrecognized_prefix() {
        assert!("nonsense".parse::<Identity>().is_err());
    }
}

//! The Identity Resolver: turns a handshake's token/guest id/connection
//! handle into a stable [`Identity`], per the resolution order fixed in
//! component 4.1 — token first, then guest id, then the bare connection.
//! A failed token never rejects the connection; it only demotes it to the
//! next path in the order.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use rookery_transport::ConnectionId;

use crate::{Identity, SessionError};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    token_type: String,
}

/// Validates a bearer token and returns the user id it carries.
///
/// A trait (rather than a concrete verifier baked into the resolver) so a
/// test harness can swap in a fake that accepts anything, without pulling
/// `jsonwebtoken` or a real secret into unit tests that don't care about
/// signature verification.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<String, SessionError>> + Send;
}

/// Verifies HS256-signed JSON Web Tokens against a shared secret.
///
/// Requires `exp` (checked by `jsonwebtoken` during decode) and a `type`
/// claim equal to `"access"` — refresh tokens and other token kinds the
/// identity service might issue are rejected here, not silently accepted.
pub struct JwtAuthenticator {
    secret: String,
}

impl JwtAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtAuthenticator {
            secret: secret.into(),
        }
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| SessionError::AuthFailed(e.to_string()))?;

        if data.claims.token_type != "access" {
            return Err(SessionError::AuthFailed(format!(
                "unexpected token type {:?}",
                data.claims.token_type
            )));
        }

        Ok(data.claims.sub)
    }
}

/// Resolves the stable identity for an incoming connection, per the
/// resolution order in component 4.1: token, then guest id, then the
/// connection handle itself.
pub struct IdentityResolver<A: Authenticator> {
    authenticator: A,
}

impl<A: Authenticator> IdentityResolver<A> {
    pub fn new(authenticator: A) -> Self {
        IdentityResolver { authenticator }
    }

    /// Resolves an identity. Never fails — an invalid or absent token
    /// demotes to the guest path, and an absent guest id demotes to the
    /// connection path, matching the "connection is never rejected on
    /// auth grounds" guarantee.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        guest_id: Option<&str>,
        connection_id: ConnectionId,
    ) -> Identity {
        if let Some(token) = token {
            match self.authenticator.authenticate(token).await {
                Ok(user_id) => return Identity::Authenticated(user_id),
                Err(err) => {
                    tracing::debug!(%err, "token verification failed, demoting identity");
                }
            }
        }

        if let Some(guest_id) = guest_id {
            return Identity::Guest(guest_id.to_string());
        }

        Identity::Connection(connection_id)
    }
}

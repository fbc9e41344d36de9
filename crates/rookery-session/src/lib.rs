//! Identity and session management for the Rookery chess room engine.
//!
//! This crate handles everything that happens before a room operation is
//! allowed to run:
//!
//! 1. **Identity resolution** — turning a handshake's token/guest id/bare
//!    connection into a stable [`Identity`] ([`IdentityResolver`],
//!    [`Authenticator`]).
//! 2. **Session tracking** — knowing which identity holds which role in
//!    which room, and whether it's currently connected ([`SessionRegistry`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← looks up sessions to know who's in which room
//!     ↕
//! Session Layer (this crate)  ← resolves identity, tracks room membership
//!     ↕
//! Protocol Layer (below)  ← provides RoomId, Role, Side
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod identity;
mod registry;
mod session;

pub use auth::{Authenticator, IdentityResolver, JwtAuthenticator};
pub use error::SessionError;
pub use identity::Identity;
pub use registry::SessionRegistry;
pub use session::Session;

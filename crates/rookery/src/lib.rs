//! # Rookery
//!
//! Real-time multiplayer chess room and session engine.
//!
//! Rookery hosts chess games over WebSocket, server-authoritative: a client
//! sends moves, the server validates them against the rules engine and
//! broadcasts the resulting state to everyone in the room. It also serves a
//! small HTTP surface (health, stats, the public room catalog) from the same
//! bound port.
//!
//! ```rust,no_run
//! use rookery::{Config, RookeryServer};
//!
//! # async fn run() -> Result<(), rookery::RookeryError> {
//! let config = Config::from_env()?;
//! let server = RookeryServer::bind(config).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod http;
mod server;

pub use config::Config;
pub use error::RookeryError;
pub use server::{AppAuthenticator, NullAuthenticator, RookeryServer, ServerState};

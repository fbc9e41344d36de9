//! Room lifecycle management for the Rookery chess room engine.
//!
//! Each room runs as an isolated Tokio task (actor model) with its own
//! chess game, membership, and a low-rate tick for flag-fall detection and
//! disconnect grace. The [`RoomStore`] creates and looks up rooms and owns
//! the session registry and public-catalog cache shared across all of them.

mod actor;
mod cache;
mod error;
mod game;
mod password;
mod room;
mod settings;
mod store;
mod validate;

pub use actor::{RoomCommand, RoomHandle};
pub use cache::{InMemoryRoomCache, RoomCache};
pub use error::RoomError;
pub use game::Game;
pub use room::{LeaveOutcome, Room};
pub use settings::Settings;
pub use store::RoomStore;

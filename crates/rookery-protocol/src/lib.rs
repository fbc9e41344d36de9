//! Wire protocol for the Rookery chess room engine.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Types** ([`Envelope`], [`ClientRequest`], [`ServerEvent`], etc.) —
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (player identity). It doesn't know about connections or rooms —
//! it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (player context)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

// `mod` declares a submodule. Rust looks for the code in either:
//   - `src/types.rs` (file), or
//   - `src/types/mod.rs` (directory with mod.rs)
// We use the file approach since each module is a single file.

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// `pub use` makes items from submodules available at the crate root.
// Users can write `use rookery_protocol::Envelope` instead of
// `use rookery_protocol::types::Envelope`. This is a cleaner public API.

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Ack, ChatMessage, ChatType, ClientRequest, Envelope, ErrorCode, GameStatus,
    GameView, MoveRecord, Payload, RestoredSession, Role, RoomId, RoomListEntry,
    RoomSettingsInput, RoomSettingsView, RoomState, RoomView, ServerEvent,
    TimeControl,
};
// Re-exported for ergonomic access alongside the rest of the wire vocabulary —
// `Side`/`Promotion` appear throughout `ClientRequest`/`ServerEvent` but are
// owned by the rules adapter, not duplicated here.
pub use rookery_rules::{Promotion, Side};

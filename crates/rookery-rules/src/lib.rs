//! Chess rules adapter.
//!
//! A thin, pure wrapper around [`shakmaty`] — the room state machine
//! never touches `shakmaty` types directly, it goes through [`Position`]
//! and the [`Side`]/[`Promotion`]/[`Outcome`] vocabulary defined here.
//!
//! This crate has no notion of rooms, sessions, clocks, or the wire
//! protocol. It answers exactly one question: "given this position and
//! this proposed move, is it legal, and what does the board look like
//! (and is the game over) afterwards?"

mod error;
mod position;
mod types;

pub use error::RulesError;
pub use position::{MoveApplied, Position};
pub use types::{DrawReason, Outcome, Promotion, Side};

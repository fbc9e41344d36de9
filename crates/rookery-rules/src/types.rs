//! Domain types the rest of the workspace sees from the rules adapter.
//!
//! Nothing here leaks `shakmaty`'s own types past this crate's boundary —
//! callers work in terms of [`Side`], [`Promotion`], and [`Outcome`], and
//! the position itself is always handed back as an opaque [`crate::Position`]
//! plus its FEN string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The side to move, or the side a move/result is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl From<Side> for shakmaty::Color {
    fn from(s: Side) -> Self {
        match s {
            Side::White => shakmaty::Color::White,
            Side::Black => shakmaty::Color::Black,
        }
    }
}

/// A promotion choice, restricted to the four pieces the wire schema allows.
///
/// Serializes as the single-letter wire form (`q`/`r`/`b`/`n`) directly,
/// since that's the only representation anything outside this crate ever
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Promotion {
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
}

impl Promotion {
    /// Parses the single-letter wire form (`q`, `r`, `b`, `n`; case-insensitive).
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.to_ascii_lowercase().as_str() {
            "q" => Some(Promotion::Queen),
            "r" => Some(Promotion::Rook),
            "b" => Some(Promotion::Bishop),
            "n" => Some(Promotion::Knight),
            _ => None,
        }
    }

    pub fn to_letter(self) -> char {
        match self {
            Promotion::Queen => 'q',
            Promotion::Rook => 'r',
            Promotion::Bishop => 'b',
            Promotion::Knight => 'n',
        }
    }
}

impl From<Promotion> for shakmaty::Role {
    fn from(p: Promotion) -> Self {
        match p {
            Promotion::Queen => shakmaty::Role::Queen,
            Promotion::Rook => shakmaty::Role::Rook,
            Promotion::Bishop => shakmaty::Role::Bishop,
            Promotion::Knight => shakmaty::Role::Knight,
        }
    }
}

impl fmt::Display for Promotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_letter())
    }
}

/// Why a game ended, as reported by the rules adapter. `move_outcome`
/// (see [`crate::Adapter::apply_move`]) yields this after a move is
/// applied; the caller (the room state machine) decides how it maps
/// onto `GameStatus` and `winner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The game continues; it is the returned `Side`'s turn.
    Ongoing,
    Checkmate { winner: Side },
    Stalemate,
    DrawByRule(DrawReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

//! The rules adapter itself: validates and applies moves, and reports on
//! the terminal status of a position.
//!
//! This is the only file in the workspace that imports `shakmaty` types
//! directly — everywhere else sees [`Side`], [`Promotion`], [`Outcome`],
//! and an opaque [`Position`] (serialized as FEN when it needs to travel
//! outside this process, e.g. to the optional external cache).

use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{Chess, EnPassantMode, Move as ShMove, Position as _, Square};

use crate::error::RulesError;
use crate::types::{DrawReason, Outcome, Promotion, Side};

/// A chess position, opaque to everything outside this crate.
#[derive(Debug, Clone)]
pub struct Position(Chess);

/// The result of successfully applying a move.
pub struct MoveApplied {
    pub position: Position,
    /// Standard Algebraic Notation for the move just played.
    pub san: String,
    /// Terminal status of the position *after* the move.
    pub outcome: Outcome,
}

impl Position {
    /// The standard starting position.
    pub fn new_game() -> Self {
        Position(Chess::default())
    }

    /// Re-hydrates a position from its FEN encoding (used when the room
    /// store's optional external cache restores a room after a restart).
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let setup: Fen = fen
            .parse()
            .map_err(|_| RulesError::InvalidPosition(fen.to_string()))?;
        let chess: Chess = setup
            .into_position(shakmaty::CastlingMode::Standard)
            .map_err(|_| RulesError::InvalidPosition(fen.to_string()))?;
        Ok(Position(chess))
    }

    /// FEN encoding of the current position.
    pub fn fen(&self) -> String {
        Fen::from_position(&self.0, EnPassantMode::Legal).to_string()
    }

    /// A reduced key (board + turn + castling + en-passant, no move
    /// counters) used by the caller to detect threefold repetition —
    /// that rule needs the whole game's history, which this crate
    /// deliberately doesn't keep, so it lives at the room layer.
    pub fn repetition_key(&self) -> String {
        let fen = self.fen();
        fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
    }

    pub fn turn(&self) -> Side {
        Side::from(self.0.turn())
    }

    /// Halfmove clock (plies since the last capture or pawn push).
    pub fn halfmove_clock(&self) -> u32 {
        self.0.halfmoves()
    }

    /// Validates and applies a move described by coordinate squares plus
    /// an optional promotion piece, matching the wire schema's
    /// `{from, to, promotion?}` shape.
    pub fn apply_move(
        &self,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<MoveApplied, RulesError> {
        let from = parse_square(from)?;
        let to = parse_square(to)?;
        let mv = find_legal_move(&self.0, from, to, promotion)?;

        let san = SanPlus::from_move(self.0.clone(), &mv).to_string();
        let next = self
            .0
            .clone()
            .play(mv)
            .map_err(|_| RulesError::IllegalMove)?;
        let outcome = classify(&next);

        Ok(MoveApplied {
            position: Position(next),
            san,
            outcome,
        })
    }
}

fn parse_square(s: &str) -> Result<Square, RulesError> {
    Square::from_str(s).map_err(|_| RulesError::InvalidSquare(s.to_string()))
}

fn find_legal_move(
    pos: &Chess,
    from: Square,
    to: Square,
    promotion: Option<Promotion>,
) -> Result<ShMove, RulesError> {
    let candidates: Vec<ShMove> = pos
        .legal_moves()
        .into_iter()
        .filter(|m| m.from() == Some(from) && m.to() == to)
        .collect();

    if candidates.is_empty() {
        return Err(RulesError::IllegalMove);
    }

    let is_promotion = candidates.iter().any(|m| m.promotion().is_some());
    if is_promotion {
        let Some(piece) = promotion else {
            return Err(RulesError::PromotionRequired);
        };
        candidates
            .into_iter()
            .find(|m| m.promotion() == Some(piece.into()))
            .ok_or(RulesError::IllegalMove)
    } else {
        if promotion.is_some() {
            return Err(RulesError::PromotionNotAllowed);
        }
        Ok(candidates.into_iter().next().expect("checked non-empty above"))
    }
}

fn classify(pos: &Chess) -> Outcome {
    if pos.is_checkmate() {
        Outcome::Checkmate {
            winner: Side::from(pos.turn()).opposite(),
        }
    } else if pos.is_stalemate() {
        Outcome::Stalemate
    } else if pos.is_insufficient_material() {
        Outcome::DrawByRule(DrawReason::InsufficientMaterial)
    } else if pos.halfmoves() >= 100 {
        Outcome::DrawByRule(DrawReason::FiftyMoveRule)
    } else {
        Outcome::Ongoing
    }
}

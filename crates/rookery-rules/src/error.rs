//! Errors raised by the rules adapter.
//!
//! Mirrors the rest of the workspace: one `thiserror` enum per crate,
//! scoped to exactly the failures this layer can produce.

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// The `from`/`to` pair (with the given promotion, if any) does not
    /// match any legal move in the current position.
    #[error("illegal move")]
    IllegalMove,

    /// A square string did not parse as `[a-h][1-8]`.
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// A pawn reached the back rank but no promotion piece was supplied.
    #[error("promotion required")]
    PromotionRequired,

    /// A promotion piece was supplied for a move that isn't a promotion.
    #[error("promotion not allowed on this move")]
    PromotionNotAllowed,

    /// The supplied FEN-like position string failed to parse.
    #[error("invalid position encoding: {0}")]
    InvalidPosition(String),
}

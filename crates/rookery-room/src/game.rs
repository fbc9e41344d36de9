//! The embedded game record (§3 `Game`) and the `move` operation's clock
//! and terminal-condition bookkeeping (§4.4, §4.5).
//!
//! This wraps [`rookery_rules::Position`] — legality and check/checkmate/
//! stalemate detection live there — with everything that needs move
//! history: the clocks, the move log, and threefold repetition (which
//! needs the whole game's history, deliberately not kept by the rules
//! adapter itself).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rookery_protocol::{GameStatus, GameView, MoveRecord, TimeControl};
use rookery_rules::{Outcome, Position, Promotion, Side};

use crate::error::RoomError;

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// A chess game embedded in a room, from admission to a terminal status.
pub struct Game {
    position: Position,
    moves: Vec<MoveRecord>,
    status: GameStatus,
    winner: Option<Side>,
    white_time: Option<i64>,
    black_time: Option<i64>,
    last_move_at: u64,
    started_at: u64,
    time_control: Option<TimeControl>,
    /// Repetition-key occurrence counts, for threefold detection — the
    /// rules adapter only ever sees one position at a time.
    repetitions: HashMap<String, u8>,
}

impl Game {
    /// Starts a new game at the standard position with the given clocks.
    pub fn new(time_control: Option<TimeControl>) -> Self {
        let now = now_ms();
        let initial_clock = time_control.map(|tc| tc.initial as i64 * 1000);
        let position = Position::new_game();
        let mut repetitions = HashMap::new();
        repetitions.insert(position.repetition_key(), 1);

        Game {
            position,
            moves: Vec::new(),
            status: GameStatus::Active,
            winner: None,
            white_time: initial_clock,
            black_time: initial_clock,
            last_move_at: now,
            started_at: now,
            time_control,
            repetitions,
        }
    }

    pub fn turn(&self) -> Side {
        self.position.turn()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, GameStatus::Active)
    }

    pub fn time_control(&self) -> Option<TimeControl> {
        self.time_control
    }

    pub fn moves_played(&self) -> usize {
        self.moves.len()
    }

    fn clock_mut(&mut self, side: Side) -> &mut i64 {
        match side {
            Side::White => self
                .white_time
                .as_mut()
                .expect("clock_mut called with no time control configured"),
            Side::Black => self
                .black_time
                .as_mut()
                .expect("clock_mut called with no time control configured"),
        }
    }

    /// §4.4 `move`, steps 1-3. The caller (the room) has already checked
    /// that the mover is a player whose color matches `turn` and that the
    /// game is active; this only handles what depends on chess rules and
    /// clock state.
    pub fn apply_move(
        &mut self,
        mover: Side,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<MoveRecord, RoomError> {
        let applied = self.position.apply_move(from, to, promotion)?;

        let now = now_ms();
        let mut timed_out = false;
        if let Some(tc) = self.time_control {
            let elapsed = now.saturating_sub(self.last_move_at) as i64;
            let clock = self.clock_mut(mover);
            *clock -= elapsed;
            if *clock <= 0 {
                timed_out = true;
            } else {
                *clock += tc.increment as i64 * 1000;
            }
        }

        self.position = applied.position;
        self.last_move_at = now;

        let record = MoveRecord {
            from: from.to_string(),
            to: to.to_string(),
            san: applied.san,
            position_after: self.position.fen(),
            timestamp: now,
            promotion,
        };
        self.moves.push(record.clone());

        if timed_out {
            // The move is still recorded, but the clock that ran out at
            // charge time takes priority over whatever the move itself
            // would otherwise have concluded.
            self.status = GameStatus::Timeout;
            self.winner = Some(mover.opposite());
            return Ok(record);
        }

        let key = self.position.repetition_key();
        let occurrences = self.repetitions.entry(key).or_insert(0);
        *occurrences += 1;
        if *occurrences >= 3 {
            self.status = GameStatus::Draw;
            self.winner = None;
            return Ok(record);
        }

        match applied.outcome {
            Outcome::Ongoing => {}
            Outcome::Checkmate { winner } => {
                self.status = GameStatus::Checkmate;
                self.winner = Some(winner);
            }
            Outcome::Stalemate => {
                self.status = GameStatus::Stalemate;
                self.winner = None;
            }
            Outcome::DrawByRule(_) => {
                self.status = GameStatus::Draw;
                self.winner = None;
            }
        }

        Ok(record)
    }

    pub fn resign(&mut self, resigning: Side) {
        self.status = GameStatus::Resigned;
        self.winner = Some(resigning.opposite());
    }

    pub fn accept_draw(&mut self) {
        self.status = GameStatus::Draw;
        self.winner = None;
    }

    pub fn abandon(&mut self, present_side: Side) {
        self.status = GameStatus::Abandoned;
        self.winner = Some(present_side);
    }

    /// The Game Clock active sweep (§4.5): checks the mover's clock against
    /// elapsed time without waiting for a move. Returns `true` if this call
    /// just transitioned the game to `timeout`.
    pub fn check_flag_fall(&mut self) -> bool {
        if !self.is_active() || self.time_control.is_none() {
            return false;
        }
        let mover = self.turn();
        let now = now_ms();
        let elapsed = now.saturating_sub(self.last_move_at) as i64;
        let clock = self.clock_mut(mover);
        let remaining = *clock - elapsed;
        if remaining <= 0 {
            *clock = remaining;
            self.status = GameStatus::Timeout;
            self.winner = Some(mover.opposite());
            true
        } else {
            false
        }
    }

    pub fn to_view(&self) -> GameView {
        GameView {
            position: self.position.fen(),
            turn: self.turn(),
            moves: self.moves.clone(),
            status: self.status,
            winner: self.winner,
            white_time: self.white_time,
            black_time: self.black_time,
            last_move_at: self.last_move_at,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_game_is_active_with_white_to_move() {
        let game = Game::new(None);
        assert!(game.is_active());
        assert_eq!(game.turn(), Side::White);
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn fools_mate_ends_in_checkmate() {
        let mut game = Game::new(None);
        game.apply_move(Side::White, "f2", "f3", None).unwrap();
        game.apply_move(Side::Black, "e7", "e5", None).unwrap();
        game.apply_move(Side::White, "g2", "g4", None).unwrap();
        game.apply_move(Side::Black, "d8", "h4", None).unwrap();

        assert_eq!(game.status(), GameStatus::Checkmate);
        assert_eq!(game.winner(), Some(Side::Black));
        assert_eq!(game.moves_played(), 4);
    }

    #[test]
    fn illegal_move_does_not_mutate_state() {
        let mut game = Game::new(None);
        let err = game.apply_move(Side::White, "e2", "e5", None);
        assert!(err.is_err());
        assert_eq!(game.moves_played(), 0);
        assert!(game.is_active());
    }

    #[test]
    fn clock_charge_adds_increment_on_acceptance() {
        let mut game = Game::new(Some(TimeControl {
            initial: 60,
            increment: 5,
        }));
        game.apply_move(Side::White, "e2", "e4", None).unwrap();
        let view = game.to_view();
        // elapsed is ~0ms in a synchronous test, so white's clock should be
        // close to 60000 + 5000, not less than the pre-move value.
        assert!(view.white_time.unwrap() > 60_000);
    }

    #[test]
    fn resign_sets_status_and_opposite_winner() {
        let mut game = Game::new(None);
        game.resign(Side::White);
        assert_eq!(game.status(), GameStatus::Resigned);
        assert_eq!(game.winner(), Some(Side::Black));
    }

    #[test]
    fn flag_fall_sweep_declares_timeout_for_the_mover() {
        let mut game = Game::new(Some(TimeControl {
            initial: 0,
            increment: 0,
        }));
        // initial=0 means the mover (white) is already out of time.
        assert!(game.check_flag_fall());
        assert_eq!(game.status(), GameStatus::Timeout);
        assert_eq!(game.winner(), Some(Side::Black));
    }

    #[test]
    fn flag_fall_sweep_is_a_noop_without_time_control() {
        let mut game = Game::new(None);
        assert!(!game.check_flag_fall());
        assert!(game.is_active());
    }
}

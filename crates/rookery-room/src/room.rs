//! The room state machine itself (§4.4): pure mutations over one room's
//! data, returning either a value the caller needs or a [`RoomError`]. This
//! module knows nothing about actors, channels, or the session registry —
//! that plumbing lives in [`crate::actor`]. Keeping the state machine pure
//! is what makes the universal invariants (§8) checkable directly against
//! a `Room` value in tests, with no Tokio runtime involved.

use std::collections::HashMap;

use rookery_protocol::{GameStatus, MoveRecord, Promotion, Role, RoomId, RoomListEntry, RoomState, RoomView, Side};
use rookery_session::Identity;

use crate::error::RoomError;
use crate::game::{now_ms, Game};
use crate::password::verify_password;
use crate::settings::Settings;

/// What happened as a result of [`Room::leave`] — the actor uses this to
/// decide which events to emit and whether the room itself should be torn
/// down.
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// The host left before an opponent was admitted — the room is gone.
    HostLeftBeforeStart,
    /// A player left mid-game — the game ends, `winner` is the other side.
    PlayerAbandoned { winner: Side },
    /// A spectator left — no effect on the game.
    SpectatorLeft,
}

/// One room's full state: membership, lifecycle, settings, and the
/// embedded game once admission has happened.
pub struct Room {
    pub room_id: RoomId,
    host_id: Identity,
    host_name: String,
    opponent_id: Option<Identity>,
    opponent_name: Option<String>,
    spectators: HashMap<Identity, String>,
    state: RoomState,
    created_at: u64,
    last_activity: u64,
    game: Option<Game>,
    settings: Settings,
    draw_offerer: Option<Identity>,
}

impl Room {
    pub fn new(room_id: RoomId, host_id: Identity, host_name: String, settings: Settings) -> Self {
        let now = now_ms();
        Room {
            room_id,
            host_id,
            host_name,
            opponent_id: None,
            opponent_name: None,
            spectators: HashMap::new(),
            state: RoomState::WaitingForPlayer,
            created_at: now,
            last_activity: now,
            game: None,
            settings,
            draw_offerer: None,
        }
    }

    fn touch(&mut self) {
        self.last_activity = now_ms();
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn player_count(&self) -> u8 {
        1 + self.opponent_id.is_some() as u8
    }

    pub fn spectator_count(&self) -> u32 {
        self.spectators.len() as u32
    }

    pub fn role_of(&self, identity: &Identity) -> Option<Role> {
        if identity == &self.host_id {
            Some(Role::Host)
        } else if self.opponent_id.as_ref() == Some(identity) {
            Some(Role::Opponent)
        } else if self.spectators.contains_key(identity) {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    pub fn color_of(&self, identity: &Identity) -> Option<Side> {
        match self.role_of(identity) {
            Some(Role::Host) => Some(Side::White),
            Some(Role::Opponent) => Some(Side::Black),
            _ => None,
        }
    }

    fn require_host(&self, identity: &Identity) -> Result<(), RoomError> {
        if identity == &self.host_id {
            Ok(())
        } else {
            Err(RoomError::HostOnly)
        }
    }

    /// Checks a join/spectate attempt against the lock/password (invariant
    /// shared by `join` and `spectate`).
    fn check_access(&self, password: Option<&str>) -> Result<(), RoomError> {
        if let Some(hash) = &self.settings.password_hash {
            match password {
                None => Err(RoomError::PasswordRequired(self.room_id.clone())),
                Some(supplied) if verify_password(supplied, hash) => Ok(()),
                Some(_) => Err(RoomError::PasswordIncorrect(self.room_id.clone())),
            }
        } else if self.settings.locked {
            Err(RoomError::RoomLocked(self.room_id.clone()))
        } else {
            Ok(())
        }
    }

    /// `join(identity, name, roomId, password?)` — admits the opponent,
    /// starts the game.
    pub fn join(
        &mut self,
        identity: Identity,
        name: String,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        if self.state != RoomState::WaitingForPlayer {
            return Err(RoomError::JoinNotAllowed(self.room_id.clone()));
        }
        if !self.settings.allow_join {
            return Err(RoomError::JoinNotAllowed(self.room_id.clone()));
        }
        if identity == self.host_id {
            return Err(RoomError::JoinNotAllowed(self.room_id.clone()));
        }
        self.check_access(password)?;

        self.opponent_id = Some(identity);
        self.opponent_name = Some(name);
        self.game = Some(Game::new(self.settings.time_control));
        self.state = RoomState::InProgress;
        self.touch();
        Ok(())
    }

    /// `spectate(identity, name, roomId, password?)` — idempotent for the
    /// same identity.
    pub fn spectate(
        &mut self,
        identity: Identity,
        name: String,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        if !self.settings.allow_spectators {
            return Err(RoomError::SpectateNotAllowed(self.room_id.clone()));
        }
        if !self.spectators.contains_key(&identity) {
            self.check_access(password)?;
        }
        self.spectators.insert(identity, name);
        self.touch();
        Ok(())
    }

    /// `leave(identity)` — behavior depends on the caller's current role.
    pub fn leave(&mut self, identity: &Identity) -> Result<LeaveOutcome, RoomError> {
        if identity == &self.host_id {
            if self.state == RoomState::WaitingForPlayer {
                self.state = RoomState::Finished;
                self.touch();
                return Ok(LeaveOutcome::HostLeftBeforeStart);
            }
            return self.abandon_for(Side::White);
        }
        if self.opponent_id.as_ref() == Some(identity) {
            return self.abandon_for(Side::Black);
        }
        if self.spectators.remove(identity).is_some() {
            self.touch();
            return Ok(LeaveOutcome::SpectatorLeft);
        }
        Err(RoomError::NotAPlayer(self.room_id.clone()))
    }

    fn abandon_for(&mut self, leaving_side: Side) -> Result<LeaveOutcome, RoomError> {
        let winner = leaving_side.opposite();
        if let Some(game) = &mut self.game {
            if game.is_active() {
                game.abandon(winner);
            }
        }
        self.draw_offerer = None;
        self.state = RoomState::Finished;
        self.touch();
        Ok(LeaveOutcome::PlayerAbandoned { winner })
    }

    /// `move(identity, roomId, from, to, promotion?)`.
    pub fn apply_move(
        &mut self,
        identity: &Identity,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<MoveRecord, RoomError> {
        let mover = self
            .color_of(identity)
            .filter(|_| matches!(self.role_of(identity), Some(Role::Host) | Some(Role::Opponent)))
            .ok_or_else(|| RoomError::NotAPlayer(self.room_id.clone()))?;

        if self.state != RoomState::InProgress {
            return Err(RoomError::GameNotInProgress(self.room_id.clone()));
        }
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| RoomError::GameNotInProgress(self.room_id.clone()))?;
        if !game.is_active() {
            return Err(RoomError::GameNotInProgress(self.room_id.clone()));
        }
        if game.turn() != mover {
            return Err(RoomError::NotYourTurn);
        }

        let record = game.apply_move(mover, from, to, promotion)?;
        self.draw_offerer = None;
        if !game.is_active() {
            self.state = RoomState::Finished;
        }
        self.touch();
        Ok(record)
    }

    pub fn resign(&mut self, identity: &Identity) -> Result<(), RoomError> {
        let resigning = self
            .color_of(identity)
            .ok_or_else(|| RoomError::NotAPlayer(self.room_id.clone()))?;
        if self.state != RoomState::InProgress {
            return Err(RoomError::GameNotInProgress(self.room_id.clone()));
        }
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| RoomError::GameNotInProgress(self.room_id.clone()))?;
        game.resign(resigning);
        self.draw_offerer = None;
        self.state = RoomState::Finished;
        self.touch();
        Ok(())
    }

    pub fn offer_draw(&mut self, identity: &Identity) -> Result<(), RoomError> {
        self.color_of(identity)
            .ok_or_else(|| RoomError::NotAPlayer(self.room_id.clone()))?;
        if self.state != RoomState::InProgress {
            return Err(RoomError::GameNotInProgress(self.room_id.clone()));
        }
        self.draw_offerer = Some(identity.clone());
        self.touch();
        Ok(())
    }

    pub fn accept_draw(&mut self, identity: &Identity) -> Result<(), RoomError> {
        self.color_of(identity)
            .ok_or_else(|| RoomError::NotAPlayer(self.room_id.clone()))?;
        match &self.draw_offerer {
            None => return Err(RoomError::NoDrawOffer(self.room_id.clone())),
            Some(offerer) if offerer == identity => {
                return Err(RoomError::CannotAcceptOwnDraw)
            }
            Some(_) => {}
        }
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| RoomError::GameNotInProgress(self.room_id.clone()))?;
        game.accept_draw();
        self.draw_offerer = None;
        self.state = RoomState::Finished;
        self.touch();
        Ok(())
    }

    pub fn decline_draw(&mut self, identity: &Identity) -> Result<(), RoomError> {
        self.color_of(identity)
            .ok_or_else(|| RoomError::NotAPlayer(self.room_id.clone()))?;
        if self.draw_offerer.is_none() {
            return Err(RoomError::NoDrawOffer(self.room_id.clone()));
        }
        self.draw_offerer = None;
        self.touch();
        Ok(())
    }

    pub fn draw_offerer(&self) -> Option<&Identity> {
        self.draw_offerer.as_ref()
    }

    /// `kickSpectator(identity, roomId, targetIdentity)`. Returns the
    /// target's display name for the event the actor emits.
    pub fn kick_spectator(
        &mut self,
        identity: &Identity,
        target: &Identity,
    ) -> Result<String, RoomError> {
        self.require_host(identity)?;
        if target == &self.host_id || self.opponent_id.as_ref() == Some(target) {
            return Err(RoomError::CannotKickPlayer);
        }
        let name = self
            .spectators
            .remove(target)
            .ok_or_else(|| RoomError::NotFound(self.room_id.clone()))?;
        self.touch();
        Ok(name)
    }

    /// `lockRoom(identity, roomId, locked, password?)`.
    pub fn lock_room(
        &mut self,
        identity: &Identity,
        locked: bool,
        password: Option<String>,
    ) -> Result<(), RoomError> {
        self.require_host(identity)?;
        if let Some(password) = password {
            self.settings.password_hash = Some(crate::password::hash_password(&password));
            self.settings.locked = true;
        } else {
            self.settings.locked = locked;
            if !locked {
                self.settings.password_hash = None;
            }
        }
        self.touch();
        Ok(())
    }

    /// `updateSettings(identity, roomId, partial)`. Returns whether the
    /// public catalog needs a refresh (`isPrivate`/`allowJoin` changed).
    pub fn update_settings(
        &mut self,
        identity: &Identity,
        partial: rookery_protocol::RoomSettingsInput,
    ) -> Result<bool, RoomError> {
        self.require_host(identity)?;
        let catalog_affected = partial.is_private.is_some() || partial.allow_join.is_some();
        self.settings.apply(partial)?;
        self.touch();
        Ok(catalog_affected)
    }

    /// The Game Clock active sweep (§4.5). Returns `true` if this call just
    /// ended the game on a flag-fall.
    pub fn check_flag_fall(&mut self) -> bool {
        let fired = match &mut self.game {
            Some(game) => game.check_flag_fall(),
            None => false,
        };
        if fired {
            self.draw_offerer = None;
            self.state = RoomState::Finished;
            self.touch();
        }
        fired
    }

    pub fn to_view(&self) -> RoomView {
        RoomView {
            room_id: self.room_id.clone(),
            host_id: self.host_id.to_string(),
            host_name: self.host_name.clone(),
            opponent_id: self.opponent_id.as_ref().map(Identity::to_string),
            opponent_name: self.opponent_name.clone(),
            spectators: self
                .spectators
                .iter()
                .map(|(id, name)| (id.to_string(), name.clone()))
                .collect(),
            state: self.state,
            created_at: self.created_at,
            last_activity: self.last_activity,
            game: self.game.as_ref().map(Game::to_view),
            settings: self.settings.to_view(),
        }
    }

    /// The public catalog's projection of this room, or `None` if it
    /// shouldn't be listed (`isPrivate` or join disallowed, §4.7).
    pub fn to_list_entry(&self) -> Option<RoomListEntry> {
        if self.settings.is_private || !self.settings.allow_join {
            return None;
        }
        Some(RoomListEntry {
            room_id: self.room_id.clone(),
            room_name: self.settings.room_name.clone(),
            host_name: self.host_name.clone(),
            state: self.state,
            player_count: self.player_count(),
            spectator_count: self.spectator_count(),
            time_control: self.settings.time_control,
            created_at: self.created_at,
            last_activity: self.last_activity,
        })
    }

    /// Garbage-collection eligibility (§3 lifecycle): finished rooms linger
    /// 30 minutes, never-admitted waiting rooms linger 60.
    pub fn is_collectible(&self, now: u64) -> bool {
        let idle_ms = now.saturating_sub(self.last_activity);
        match self.state {
            RoomState::Finished => idle_ms >= 30 * 60 * 1000,
            RoomState::WaitingForPlayer => idle_ms >= 60 * 60 * 1000,
            RoomState::InProgress => false,
        }
    }

    /// All identities currently participating in this room (for discarding
    /// their sessions on finish/deletion).
    pub fn participants(&self) -> Vec<Identity> {
        let mut ids = vec![self.host_id.clone()];
        if let Some(opponent) = &self.opponent_id {
            ids.push(opponent.clone());
        }
        ids.extend(self.spectators.keys().cloned());
        ids
    }
}

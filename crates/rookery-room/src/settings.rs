//! Internal room settings: the server-side superset of
//! [`RoomSettingsInput`]/[`RoomSettingsView`] that additionally holds the
//! password hash, never serialized directly to a client.

use rookery_protocol::{RoomSettingsInput, RoomSettingsView, TimeControl};

use crate::error::RoomError;
use crate::password::hash_password;
use crate::validate::validate_time_control;

#[derive(Debug, Clone)]
pub struct Settings {
    pub time_control: Option<TimeControl>,
    pub allow_spectators: bool,
    pub allow_join: bool,
    pub is_private: bool,
    pub room_name: Option<String>,
    /// Set by `room:lock{locked: true, password: None}` — a "pure" lock
    /// that blocks new joins without ever asking for a password.
    pub locked: bool,
    pub password_hash: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            time_control: None,
            allow_spectators: true,
            allow_join: true,
            is_private: false,
            room_name: None,
            locked: false,
            password_hash: None,
        }
    }
}

impl Settings {
    /// Builds settings for `room:create` from the client-supplied subset,
    /// defaulting anything absent.
    pub fn from_input(input: Option<RoomSettingsInput>) -> Result<Self, RoomError> {
        let mut settings = Settings::default();
        if let Some(input) = input {
            settings.apply(input)?;
        }
        Ok(settings)
    }

    /// Merges a partial settings update (`room:update-settings`) in place.
    /// Only fields present in `input` change.
    pub fn apply(&mut self, input: RoomSettingsInput) -> Result<(), RoomError> {
        if let Some(tc) = input.time_control {
            validate_time_control(&tc)?;
            self.time_control = Some(tc);
        }
        if let Some(allow_spectators) = input.allow_spectators {
            self.allow_spectators = allow_spectators;
        }
        if let Some(allow_join) = input.allow_join {
            self.allow_join = allow_join;
        }
        if let Some(is_private) = input.is_private {
            self.is_private = is_private;
        }
        if let Some(room_name) = input.room_name {
            self.room_name = Some(room_name);
        }
        if let Some(password) = input.password {
            self.password_hash = Some(hash_password(&password));
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked || self.password_hash.is_some()
    }

    pub fn to_view(&self) -> RoomSettingsView {
        RoomSettingsView {
            time_control: self.time_control,
            allow_spectators: self.allow_spectators,
            allow_join: self.allow_join,
            is_private: self.is_private,
            room_name: self.room_name.clone(),
            is_locked: self.is_locked(),
        }
    }
}

//! Wire Schema payload validation (§4.8) that doesn't belong to any single
//! operation: name/message length bounds and time control ranges. Coordinate
//! and promotion validation is delegated to the rules adapter itself, since
//! it already has to parse squares to apply a move.

use rookery_protocol::TimeControl;

use crate::error::RoomError;

const NAME_MIN: usize = 1;
const NAME_MAX: usize = 20;
const MESSAGE_MAX: usize = 500;
const TIME_CONTROL_INITIAL_RANGE: std::ops::RangeInclusive<u32> = 60..=3600;
const TIME_CONTROL_INCREMENT_RANGE: std::ops::RangeInclusive<u32> = 0..=60;

pub fn validate_name(name: &str) -> Result<(), RoomError> {
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(RoomError::ValidationFailed(format!(
            "name must be {NAME_MIN}-{NAME_MAX} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn validate_chat_message(message: &str) -> Result<(), RoomError> {
    let len = message.chars().count();
    if len == 0 || len > MESSAGE_MAX {
        return Err(RoomError::ValidationFailed(format!(
            "message must be 1-{MESSAGE_MAX} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn validate_time_control(tc: &TimeControl) -> Result<(), RoomError> {
    if !TIME_CONTROL_INITIAL_RANGE.contains(&tc.initial) {
        return Err(RoomError::ValidationFailed(format!(
            "timeControl.initial must be in {TIME_CONTROL_INITIAL_RANGE:?} seconds, got {}",
            tc.initial
        )));
    }
    if !TIME_CONTROL_INCREMENT_RANGE.contains(&tc.increment) {
        return Err(RoomError::ValidationFailed(format!(
            "timeControl.increment must be in {TIME_CONTROL_INCREMENT_RANGE:?} seconds, got {}",
            tc.increment
        )));
    }
    Ok(())
}

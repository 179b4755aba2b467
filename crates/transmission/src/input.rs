//! Rider key bindings.
//!
//! Raw key capture belongs to whatever front end hosts the client; it only
//! has to hand over an [`InputEvent`]. Bindings:
//!
//! | key              | command                    |
//! |------------------|----------------------------|
//! | `ArrowLeft`      | throttle -5                |
//! | `ArrowRight`     | throttle +5                |
//! | `c`              | toggle clutch              |
//! | `u` / `d`        | shift up / down            |
//! | `n`              | shift to neutral           |
//! | `0`..`9`         | throttle digit x 10        |
//! | `Shift` + `1`    | full throttle              |

use crate::Command;

pub const THROTTLE_STEP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub key: Key,
    pub shift: bool,
}

impl InputEvent {
    pub fn key(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// Translates a key press into a command. Throttle nudges are relative to
/// `current_throttle`; the state machine clamps the result.
pub fn command_for(event: InputEvent, current_throttle: f64) -> Option<Command> {
    match event.key {
        Key::ArrowLeft => Some(Command::SetThrottle(current_throttle - THROTTLE_STEP)),
        Key::ArrowRight => Some(Command::SetThrottle(current_throttle + THROTTLE_STEP)),
        Key::Char(c) => match c.to_ascii_lowercase() {
            'c' => Some(Command::ToggleClutch),
            'u' => Some(Command::ShiftUp),
            'd' => Some(Command::ShiftDown),
            'n' => Some(Command::ShiftToNeutral),
            '1' if event.shift => Some(Command::SetThrottle(100.0)),
            digit @ '0'..='9' => digit
                .to_digit(10)
                .map(|value| Command::SetThrottle(f64::from(value) * 10.0)),
            _ => None,
        },
    }
}

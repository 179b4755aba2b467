//! Clutch, gearbox and throttle transitions.
//!
//! Every rider intent goes through [`apply`], whatever produced it. The
//! function is pure: it takes the current [`ControlState`] by value and
//! returns the next one together with an optional [`Notice`] describing
//! what happened. Gear changes are interlocked on the clutch lever.

use std::str::FromStr;

use shared::{
    domain::{Gear, Notice},
    protocol::ControlInput,
};
use thiserror::Error;

pub mod input;

/// Clutch travel above which the lever counts as pulled in.
pub const CLUTCH_PRESSED_THRESHOLD: f64 = 0.8;
/// Minimum clutch travel for a gear change.
pub const SHIFT_CLUTCH_THRESHOLD: f64 = 0.8;
pub const THROTTLE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    pub gear: Gear,
    /// `0.0` is lever released (drive engaged), `1.0` fully pulled in.
    pub clutch_position: f64,
    pub throttle_position: f64,
}

impl ControlState {
    pub fn clutch_pressed(&self) -> bool {
        self.clutch_position > CLUTCH_PRESSED_THRESHOLD
    }

    pub fn can_shift(&self) -> bool {
        self.clutch_position >= SHIFT_CLUTCH_THRESHOLD
    }

    pub fn to_input(&self) -> ControlInput {
        ControlInput {
            throttle_position: self.throttle_position,
            clutch_position: self.clutch_position,
            gear: self.gear,
        }
    }
}

impl Default for ControlState {
    /// Parked: neutral, clutch pulled in, throttle closed.
    fn default() -> Self {
        Self {
            gear: Gear::NEUTRAL,
            clutch_position: 1.0,
            throttle_position: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetThrottle(f64),
    SetClutchPosition(f64),
    ToggleClutch,
    ShiftUp,
    ShiftDown,
    ShiftToNeutral,
    /// Direct placement without the clutch interlock. Only for reconciling
    /// with what the simulator reports, never for rider input.
    SetGear(i64),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown control command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Parses the argument-free commands by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toggle_clutch" => Ok(Command::ToggleClutch),
            "shift_up" => Ok(Command::ShiftUp),
            "shift_down" => Ok(Command::ShiftDown),
            "shift_to_neutral" | "neutral" => Ok(Command::ShiftToNeutral),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

pub fn apply(state: ControlState, command: Command) -> (ControlState, Option<Notice>) {
    match command {
        Command::SetThrottle(value) => (
            ControlState {
                throttle_position: clamp_or_floor(value, 0.0, THROTTLE_MAX),
                ..state
            },
            None,
        ),
        Command::SetClutchPosition(value) => (
            ControlState {
                clutch_position: clamp_or_floor(value, 0.0, 1.0),
                ..state
            },
            None,
        ),
        Command::ToggleClutch => toggle_clutch(state),
        Command::SetGear(value) => (
            ControlState {
                gear: Gear::clamped(value),
                ..state
            },
            None,
        ),
        Command::ShiftUp | Command::ShiftDown | Command::ShiftToNeutral if !state.can_shift() => {
            (state, Some(Notice::error("Press clutch to shift gears")))
        }
        Command::ShiftUp => match state.gear.next_up() {
            Some(gear) => (
                ControlState { gear, ..state },
                Some(Notice::info(shifted_to(gear))),
            ),
            None => (state, Some(Notice::warning("Already in top gear"))),
        },
        Command::ShiftDown => match state.gear.next_down() {
            Some(gear) => (
                ControlState { gear, ..state },
                Some(Notice::info(shifted_to(gear))),
            ),
            None => (state, Some(Notice::warning("Already in neutral"))),
        },
        Command::ShiftToNeutral => (
            ControlState {
                gear: Gear::NEUTRAL,
                ..state
            },
            Some(Notice::info(shifted_to(Gear::NEUTRAL))),
        ),
    }
}

fn toggle_clutch(state: ControlState) -> (ControlState, Option<Notice>) {
    if state.clutch_pressed() {
        (
            ControlState {
                clutch_position: 0.0,
                ..state
            },
            Some(Notice::info("Clutch ENGAGED")),
        )
    } else {
        (
            ControlState {
                clutch_position: 1.0,
                ..state
            },
            Some(Notice::warning("Clutch DISENGAGED")),
        )
    }
}

fn shifted_to(gear: Gear) -> String {
    if gear.is_neutral() {
        "Shifted to Neutral".to_string()
    } else {
        format!("Shifted to {} gear", gear.number())
    }
}

// NaN has no place on a lever; treat it as fully closed.
fn clamp_or_floor(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

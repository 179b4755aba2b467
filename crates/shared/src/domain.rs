use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long a status notice stays visible after it was created.
pub const NOTICE_TTL_MS: i64 = 3000;

/// Transmission gear, `0` is neutral and `6` is top gear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Gear(u8);

impl Gear {
    pub const NEUTRAL: Gear = Gear(0);
    pub const TOP: Gear = Gear(6);

    pub fn new(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|gear| *gear <= Self::TOP.0)
            .map(Gear)
    }

    /// Pins any integer onto the gearbox range.
    pub fn clamped(value: i64) -> Self {
        Gear(value.clamp(0, i64::from(Self::TOP.0)) as u8)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_neutral(self) -> bool {
        self == Self::NEUTRAL
    }

    pub fn is_top(self) -> bool {
        self == Self::TOP
    }

    pub fn next_up(self) -> Option<Self> {
        (!self.is_top()).then(|| Gear(self.0 + 1))
    }

    pub fn next_down(self) -> Option<Self> {
        (!self.is_neutral()).then(|| Gear(self.0 - 1))
    }
}

impl TryFrom<i64> for Gear {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Gear::new(value).ok_or_else(|| format!("gear {value} is outside 0..=6"))
    }
}

impl From<Gear> for i64 {
    fn from(value: Gear) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neutral() {
            f.write_str("N")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Feedback produced by a state transition, before it is stamped with a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }

    pub fn stamped(self, created_at: DateTime<Utc>) -> StatusNotice {
        StatusNotice {
            text: self.text,
            severity: self.severity,
            created_at,
        }
    }
}

/// A notice as held by the store. Expiry is computed by whoever reads it;
/// nothing clears it on a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotice {
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl StatusNotice {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_milliseconds() >= NOTICE_TTL_MS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub attempt: u32,
}

impl ConnectionState {
    pub fn disconnected(attempt: u32) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            attempt,
        }
    }

    pub fn connecting(attempt: u32) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            attempt,
        }
    }

    pub fn connected() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            attempt: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

//! Time-of-day arithmetic.
//!
//! Everything here works on minutes since midnight. There is no overnight
//! wraparound: a window always has `start <= end`, and the gap between two
//! times is their plain minute-of-day difference, so 23:55 and 00:05 are
//! 1430 minutes apart.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValidationError};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Minutes since midnight, 0..=1439.
///
/// Serialized as a zero-padded "HH:MM" string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const LAST_MINUTE: TimeOfDay = TimeOfDay(1439);

    /// Build from hour and minute, rejecting out-of-range parts.
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ParseError> {
        if hour > 23 {
            return Err(ParseError::HourOutOfRange(format!("{hour}:{minute:02}")));
        }
        if minute > 59 {
            return Err(ParseError::MinuteOutOfRange(format!("{hour}:{minute:02}")));
        }
        Ok(Self((hour * 60 + minute) as u16))
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, ParseError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(ParseError::MinuteOfDay(minutes));
        }
        Ok(Self(minutes as u16))
    }

    /// Truncates seconds.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u32 {
        self.0 as u32
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // Always in range by construction.
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// Absolute minute-of-day distance. Never wraps across midnight.
    pub fn gap(self, other: TimeOfDay) -> u32 {
        self.minutes().abs_diff(other.minutes())
    }

    /// Returns `None` when the sum would leave the current day.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<TimeOfDay> {
        let total = self.minutes().checked_add(minutes)?;
        Self::from_minutes(total).ok()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| ParseError::Format(s.to_string()))?;

        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
            return Err(ParseError::Format(s.to_string()));
        }

        let hour: u32 = h.parse().map_err(|_| ParseError::Format(s.to_string()))?;
        let minute: u32 = m.parse().map_err(|_| ParseError::Format(s.to_string()))?;
        if hour > 23 {
            return Err(ParseError::HourOutOfRange(s.to_string()));
        }
        if minute > 59 {
            return Err(ParseError::MinuteOutOfRange(s.to_string()));
        }
        Ok(Self((hour * 60 + minute) as u16))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Daily active range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Window {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, ValidationError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Checks `start <= end`. Deserialized windows skip the constructor, so
    /// the registry calls this again before accepting a schedule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start > self.end {
            return Err(ValidationError::InvertedWindow {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, t: TimeOfDay) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

impl Default for Window {
    /// 07:00-21:00.
    fn default() -> Self {
        Self {
            start: TimeOfDay(7 * 60),
            end: TimeOfDay(21 * 60),
        }
    }
}

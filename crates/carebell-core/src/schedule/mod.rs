//! Recurring schedule definitions.
//!
//! Two kinds of recurring event are supported:
//! - **Interval**: a repeating reminder inside a daily window (drink water
//!   every hour between 07:00 and 21:00 until the goal is met).
//! - **Dose**: fixed times of day at which a medicine is due.
//!
//! The [`ScheduleRegistry`] owns the set of schedules and checks them against
//! each other.

mod registry;
mod time;

pub use registry::{ConflictReport, NameWarning, ScheduleRegistry, DEFAULT_MIN_GAP_MINUTES};
pub use time::{TimeOfDay, Window, MINUTES_PER_DAY};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Most dose times a single schedule may carry.
pub const MAX_DOSE_TIMES: usize = 4;

/// Repeating reminder inside an active window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    #[serde(default = "default_interval_id")]
    pub id: String,
    #[serde(default)]
    pub window: Window,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Daily goal in millilitres.
    #[serde(default = "default_goal_amount")]
    pub goal_amount: u32,
}

fn default_interval_id() -> String {
    "water".into()
}
fn default_interval_minutes() -> u32 {
    60
}
fn default_goal_amount() -> u32 {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for IntervalSchedule {
    fn default() -> Self {
        Self {
            id: default_interval_id(),
            window: Window::default(),
            interval_minutes: default_interval_minutes(),
            enabled: true,
            goal_amount: default_goal_amount(),
        }
    }
}

impl IntervalSchedule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_minutes == 0 {
            return Err(ValidationError::ZeroInterval);
        }
        self.window.validate()
    }

    /// Amount still needed today; zero once the goal is met.
    pub fn remaining_to_goal(&self, today_total: u32) -> u32 {
        self.goal_amount.saturating_sub(today_total)
    }
}

/// Pill-count tracking for refill projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillTracking {
    pub total_quantity: u32,
    pub remaining_quantity: u32,
}

impl RefillTracking {
    pub fn new(total_quantity: u32) -> Self {
        Self {
            total_quantity,
            remaining_quantity: total_quantity,
        }
    }
}

/// Fixed-time recurring doses of one medicine.
///
/// `frequency` always equals the number of dose times; it is recomputed
/// whenever the times change and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDoseSchedule")]
pub struct DoseSchedule {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub instructions: String,
    dose_times: Vec<TimeOfDay>,
    frequency: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_ongoing: bool,
    pub critical: bool,
    pub refill: Option<RefillTracking>,
}

#[derive(Deserialize)]
struct RawDoseSchedule {
    id: String,
    name: String,
    #[serde(default)]
    dosage: String,
    #[serde(default)]
    instructions: String,
    dose_times: Vec<TimeOfDay>,
    start_date: NaiveDate,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    is_ongoing: bool,
    #[serde(default)]
    critical: bool,
    #[serde(default)]
    refill: Option<RefillTracking>,
}

impl From<RawDoseSchedule> for DoseSchedule {
    fn from(raw: RawDoseSchedule) -> Self {
        let mut schedule = Self {
            id: raw.id,
            name: raw.name,
            dosage: raw.dosage,
            instructions: raw.instructions,
            dose_times: Vec::new(),
            frequency: 0,
            start_date: raw.start_date,
            end_date: raw.end_date,
            is_ongoing: raw.is_ongoing,
            critical: raw.critical,
            refill: raw.refill,
        };
        schedule.assign_times(raw.dose_times);
        schedule
    }
}

impl DoseSchedule {
    /// Create an ongoing schedule. Rejects empty names, zero or more than
    /// four dose times, and duplicate times.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        dose_times: Vec<TimeOfDay>,
        start_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let mut schedule = Self {
            id: id.into(),
            name: name.into(),
            dosage: String::new(),
            instructions: String::new(),
            dose_times: Vec::new(),
            frequency: 0,
            start_date,
            end_date: None,
            is_ongoing: true,
            critical: false,
            refill: None,
        };
        schedule.set_dose_times(dose_times)?;
        schedule.validate_shape()?;
        Ok(schedule)
    }

    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = dosage.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self.is_ongoing = false;
        self
    }

    /// Make the schedule open-ended again.
    pub fn clear_end_date(mut self) -> Self {
        self.end_date = None;
        self.is_ongoing = true;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_refill(mut self, total_quantity: u32) -> Self {
        self.refill = Some(RefillTracking::new(total_quantity));
        self
    }

    pub fn dose_times(&self) -> &[TimeOfDay] {
        &self.dose_times
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Replace the dose times, keeping them sorted and `frequency` in sync.
    pub fn set_dose_times(&mut self, times: Vec<TimeOfDay>) -> Result<(), ValidationError> {
        if times.is_empty() || times.len() > MAX_DOSE_TIMES {
            return Err(ValidationError::DoseCount {
                schedule_id: self.id.clone(),
                count: times.len(),
            });
        }
        let mut sorted = times;
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ValidationError::DuplicateDoseTime {
                schedule_id: self.id.clone(),
                time: pair[0],
            });
        }
        self.assign_times(sorted);
        Ok(())
    }

    fn assign_times(&mut self, mut times: Vec<TimeOfDay>) {
        times.sort();
        self.frequency = times.len() as u32;
        self.dose_times = times;
    }

    /// Structural checks that do not depend on other schedules.
    pub fn validate_shape(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.dose_times.is_empty() || self.dose_times.len() > MAX_DOSE_TIMES {
            return Err(ValidationError::DoseCount {
                schedule_id: self.id.clone(),
                count: self.dose_times.len(),
            });
        }
        if let Some(pair) = self.dose_times.windows(2).find(|w| w[0] == w[1]) {
            return Err(ValidationError::DuplicateDoseTime {
                schedule_id: self.id.clone(),
                time: pair[0],
            });
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ValidationError::InvertedDates {
                    start: self.start_date,
                    end,
                });
            }
        }
        Ok(())
    }

    /// Whether doses are expected on `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        if self.is_ongoing {
            return true;
        }
        self.end_date.map_or(true, |end| date <= end)
    }

    pub fn has_dose_time(&self, time: TimeOfDay) -> bool {
        self.dose_times.binary_search(&time).is_ok()
    }
}

/// Any schedule the registry can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecurringSchedule {
    Interval(IntervalSchedule),
    Dose(DoseSchedule),
}

impl RecurringSchedule {
    pub fn id(&self) -> &str {
        match self {
            RecurringSchedule::Interval(s) => &s.id,
            RecurringSchedule::Dose(s) => &s.id,
        }
    }

    pub fn as_dose(&self) -> Option<&DoseSchedule> {
        match self {
            RecurringSchedule::Dose(s) => Some(s),
            RecurringSchedule::Interval(_) => None,
        }
    }

    pub fn as_interval(&self) -> Option<&IntervalSchedule> {
        match self {
            RecurringSchedule::Interval(s) => Some(s),
            RecurringSchedule::Dose(_) => None,
        }
    }
}

impl From<IntervalSchedule> for RecurringSchedule {
    fn from(value: IntervalSchedule) -> Self {
        RecurringSchedule::Interval(value)
    }
}

impl From<DoseSchedule> for RecurringSchedule {
    fn from(value: DoseSchedule) -> Self {
        RecurringSchedule::Dose(value)
    }
}

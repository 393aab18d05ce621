//! Dose slot due-ness.
//!
//! Dose schedules have no firing loop of their own. Their state is derived
//! on demand from the clock and the occurrence log, for display and for
//! counting implicit misses at analysis time.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::occurrence::{DoseKey, DoseRecord, DoseStatus, OccurrenceLog};
use crate::schedule::{DoseSchedule, TimeOfDay};

/// How long after its time an unrecorded dose counts as missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GracePeriod {
    /// Missed once the calendar day is over.
    #[default]
    EndOfDay,
    Minutes(u32),
}

impl GracePeriod {
    pub fn is_past(&self, date: NaiveDate, scheduled_time: TimeOfDay, now: NaiveDateTime) -> bool {
        match *self {
            GracePeriod::EndOfDay => now.date() > date,
            GracePeriod::Minutes(minutes) => {
                let slot = date.and_time(scheduled_time.to_naive_time());
                now > slot + Duration::minutes(minutes as i64)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DoseState {
    Upcoming,
    Due,
    Snoozed { until: TimeOfDay },
    Missed,
    Recorded { status: DoseStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseSlot {
    pub schedule_id: String,
    pub name: String,
    pub date: NaiveDate,
    pub scheduled_time: TimeOfDay,
    pub critical: bool,
    #[serde(flatten)]
    pub state: DoseState,
}

/// State of one slot given the record for it, if any. `Pending` records and
/// expired snoozes fall back to clock-derived state.
pub fn dose_state(
    date: NaiveDate,
    scheduled_time: TimeOfDay,
    record: Option<&DoseRecord>,
    now: NaiveDateTime,
    grace: GracePeriod,
) -> DoseState {
    if let Some(record) = record {
        match record.status {
            DoseStatus::Taken | DoseStatus::Skipped | DoseStatus::Missed => {
                return DoseState::Recorded {
                    status: record.status,
                };
            }
            DoseStatus::Snoozed => {
                if let Some(until) = record.snoozed_until {
                    let wake = date.and_time(until.to_naive_time());
                    if now < wake && !grace.is_past(date, scheduled_time, now) {
                        return DoseState::Snoozed { until };
                    }
                }
            }
            DoseStatus::Pending => {}
        }
    }

    let slot = date.and_time(scheduled_time.to_naive_time());
    if now < slot {
        DoseState::Upcoming
    } else if grace.is_past(date, scheduled_time, now) {
        DoseState::Missed
    } else {
        DoseState::Due
    }
}

/// Every slot of `schedule` on `date`, in time order. Empty when the
/// schedule is not active that day.
pub fn slots_for_day(
    schedule: &DoseSchedule,
    date: NaiveDate,
    log: &OccurrenceLog,
    now: NaiveDateTime,
    grace: GracePeriod,
) -> Vec<DoseSlot> {
    if !schedule.is_active_on(date) {
        return Vec::new();
    }
    schedule
        .dose_times()
        .iter()
        .map(|&scheduled_time| {
            let key = DoseKey {
                schedule_id: schedule.id.clone(),
                date,
                scheduled_time,
            };
            let record = log.find(&key).and_then(|o| o.dose_record());
            DoseSlot {
                schedule_id: schedule.id.clone(),
                name: schedule.name.clone(),
                date,
                scheduled_time,
                critical: schedule.critical,
                state: dose_state(date, scheduled_time, record, now, grace),
            }
        })
        .collect()
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::occurrence::DoseStatus;
use crate::schedule::{ConflictReport, TimeOfDay};

/// Every state change in the engine produces an Event.
/// Frontends subscribe to them; nothing inside the engine depends on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReminderFired {
        schedule_id: String,
        title: String,
        body: String,
        at: NaiveDateTime,
    },
    WaterLogged {
        schedule_id: String,
        ml: u32,
        today_total_ml: u32,
        at: NaiveDateTime,
    },
    DoseRecorded {
        schedule_id: String,
        date: NaiveDate,
        scheduled_time: TimeOfDay,
        status: DoseStatus,
        at: NaiveDateTime,
    },
    ScheduleAdded {
        schedule_id: String,
    },
    ScheduleUpdated {
        schedule_id: String,
    },
    ScheduleRemoved {
        schedule_id: String,
    },
    /// A medicine was saved despite advisory conflicts.
    ConflictDetected {
        schedule_id: String,
        conflicts: Vec<ConflictReport>,
    },
    SettingsChanged {
        schedule_id: String,
    },
}

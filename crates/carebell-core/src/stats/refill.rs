//! Refill projection
//!
//! Days of supply left are `remaining_quantity / frequency`, rounded down.
//! Schedules without refill tracking produce no projection.

use serde::{Deserialize, Serialize};

use crate::schedule::DoseSchedule;

pub const DEFAULT_WARNING_DAYS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefillStatus {
    /// Less than one day of supply
    Critical,
    /// Within the warning horizon
    Warning,
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillProjection {
    pub schedule_id: String,
    pub name: String,
    pub remaining_quantity: u32,
    pub days_left: u32,
    pub status: RefillStatus,
}

pub fn project_refill(schedule: &DoseSchedule, warning_days: u32) -> Option<RefillProjection> {
    let refill = schedule.refill.as_ref()?;
    let days_left = refill.remaining_quantity / schedule.frequency().max(1);
    let status = if days_left == 0 {
        RefillStatus::Critical
    } else if days_left <= warning_days {
        RefillStatus::Warning
    } else {
        RefillStatus::Ok
    };
    Some(RefillProjection {
        schedule_id: schedule.id.clone(),
        name: schedule.name.clone(),
        remaining_quantity: refill.remaining_quantity,
        days_left,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeOfDay;
    use chrono::NaiveDate;

    fn twice_daily() -> DoseSchedule {
        let times: Vec<TimeOfDay> = vec!["08:00".parse().unwrap(), "20:00".parse().unwrap()];
        DoseSchedule::new("m1", "Metformin", times, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap()
    }

    #[test]
    fn test_untracked_has_no_projection() {
        assert_eq!(project_refill(&twice_daily(), DEFAULT_WARNING_DAYS), None);
    }

    #[test]
    fn test_days_left_rounds_down() {
        let schedule = twice_daily().with_refill(60);
        let projection = project_refill(&schedule, DEFAULT_WARNING_DAYS).unwrap();
        assert_eq!(projection.days_left, 30);
        assert_eq!(projection.status, RefillStatus::Ok);

        let mut schedule = twice_daily().with_refill(60);
        schedule.refill.as_mut().unwrap().remaining_quantity = 11;
        let projection = project_refill(&schedule, DEFAULT_WARNING_DAYS).unwrap();
        assert_eq!(projection.days_left, 5);
        assert_eq!(projection.status, RefillStatus::Warning);
    }

    #[test]
    fn test_empty_supply_is_critical() {
        let mut schedule = twice_daily().with_refill(30);
        schedule.refill.as_mut().unwrap().remaining_quantity = 0;
        let projection = project_refill(&schedule, DEFAULT_WARNING_DAYS).unwrap();
        assert_eq!(projection.days_left, 0);
        assert_eq!(projection.status, RefillStatus::Critical);

        // One pill on a twice-daily schedule does not cover a day.
        schedule.refill.as_mut().unwrap().remaining_quantity = 1;
        let projection = project_refill(&schedule, DEFAULT_WARNING_DAYS).unwrap();
        assert_eq!(projection.days_left, 0);
        assert_eq!(projection.status, RefillStatus::Critical);

        schedule.refill.as_mut().unwrap().remaining_quantity = 2;
        let projection = project_refill(&schedule, DEFAULT_WARNING_DAYS).unwrap();
        assert_eq!(projection.days_left, 1);
        assert_eq!(projection.status, RefillStatus::Warning);
    }
}

//! Schedule registry and conflict detection.
//!
//! Holds every recurring schedule and checks dose times across schedules.
//! Only problems inside a single schedule (duplicate or too-close times,
//! bad shape) are hard errors; proximity to another schedule and name
//! collisions are advisory reports the caller can confirm or reject.

use serde::{Deserialize, Serialize};

use super::{DoseSchedule, IntervalSchedule, RecurringSchedule, TimeOfDay};
use crate::error::ValidationError;

pub const DEFAULT_MIN_GAP_MINUTES: u32 = 15;

/// Two dose times of different schedules closer than the minimum gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// The candidate time that triggered the report.
    pub offending_time: TimeOfDay,
    /// Id of the schedule being checked, when it already has one.
    pub schedule_id: Option<String>,
    pub conflicting_schedule_id: String,
    pub conflicting_name: String,
    pub conflicting_time: TimeOfDay,
    pub gap_minutes: u32,
}

/// Another schedule already uses this display name (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameWarning {
    pub name: String,
    pub existing_schedule_id: String,
}

#[derive(Debug, Clone)]
pub struct ScheduleRegistry {
    schedules: Vec<RecurringSchedule>,
    min_gap_minutes: u32,
}

impl Default for ScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self {
            schedules: Vec::new(),
            min_gap_minutes: DEFAULT_MIN_GAP_MINUTES,
        }
    }

    pub fn with_min_gap(mut self, minutes: u32) -> Self {
        self.min_gap_minutes = minutes;
        self
    }

    pub fn min_gap_minutes(&self) -> u32 {
        self.min_gap_minutes
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn list(&self) -> &[RecurringSchedule] {
        &self.schedules
    }

    pub fn get(&self, id: &str) -> Option<&RecurringSchedule> {
        self.schedules.iter().find(|s| s.id() == id)
    }

    pub fn dose(&self, id: &str) -> Option<&DoseSchedule> {
        self.get(id).and_then(RecurringSchedule::as_dose)
    }

    pub fn interval(&self, id: &str) -> Option<&IntervalSchedule> {
        self.get(id).and_then(RecurringSchedule::as_interval)
    }

    pub fn doses(&self) -> impl Iterator<Item = &DoseSchedule> {
        self.schedules.iter().filter_map(RecurringSchedule::as_dose)
    }

    pub fn intervals(&self) -> impl Iterator<Item = &IntervalSchedule> {
        self.schedules.iter().filter_map(RecurringSchedule::as_interval)
    }

    /// Compare each candidate time against every dose time of every other
    /// dose schedule. `excluding_id` is the schedule being edited, which is
    /// never checked against itself.
    pub fn check_conflicts(
        &self,
        candidate_dose_times: &[TimeOfDay],
        excluding_id: Option<&str>,
    ) -> Vec<ConflictReport> {
        let mut reports = Vec::new();
        for &offending_time in candidate_dose_times {
            for other in self.doses() {
                if Some(other.id.as_str()) == excluding_id {
                    continue;
                }
                for &conflicting_time in other.dose_times() {
                    let gap = offending_time.gap(conflicting_time);
                    if gap < self.min_gap_minutes {
                        reports.push(ConflictReport {
                            offending_time,
                            schedule_id: excluding_id.map(str::to_string),
                            conflicting_schedule_id: other.id.clone(),
                            conflicting_name: other.name.clone(),
                            conflicting_time,
                            gap_minutes: gap,
                        });
                    }
                }
            }
        }
        reports
    }

    /// Conflicts for a whole schedule, excluding its own id.
    pub fn conflicts_for(&self, schedule: &DoseSchedule) -> Vec<ConflictReport> {
        self.check_conflicts(schedule.dose_times(), Some(&schedule.id))
    }

    pub fn name_warnings(&self, name: &str, excluding_id: Option<&str>) -> Vec<NameWarning> {
        let wanted = name.trim().to_lowercase();
        self.doses()
            .filter(|s| Some(s.id.as_str()) != excluding_id)
            .filter(|s| s.name.trim().to_lowercase() == wanted)
            .map(|s| NameWarning {
                name: s.name.clone(),
                existing_schedule_id: s.id.clone(),
            })
            .collect()
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn add(&mut self, schedule: impl Into<RecurringSchedule>) -> Result<(), ValidationError> {
        let schedule = schedule.into();
        if self.get(schedule.id()).is_some() {
            return Err(ValidationError::DuplicateId(schedule.id().to_string()));
        }
        self.validate(&schedule)?;
        self.schedules.push(schedule);
        Ok(())
    }

    /// Replace the schedule with the same id. The kind may not change.
    pub fn update(&mut self, schedule: impl Into<RecurringSchedule>) -> Result<(), ValidationError> {
        let schedule = schedule.into();
        self.validate(&schedule)?;
        let slot = self
            .schedules
            .iter_mut()
            .find(|s| s.id() == schedule.id())
            .ok_or_else(|| ValidationError::UnknownSchedule(schedule.id().to_string()))?;
        if std::mem::discriminant(slot) != std::mem::discriminant(&schedule) {
            return Err(ValidationError::WrongKind(schedule.id().to_string()));
        }
        *slot = schedule;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<RecurringSchedule> {
        let index = self.schedules.iter().position(|s| s.id() == id)?;
        Some(self.schedules.remove(index))
    }

    /// Insert or replace, for restoring persisted state and for the single
    /// interval schedule whose settings are edited in place.
    pub fn upsert(&mut self, schedule: impl Into<RecurringSchedule>) -> Result<(), ValidationError> {
        let schedule = schedule.into();
        if self.get(schedule.id()).is_some() {
            self.update(schedule)
        } else {
            self.add(schedule)
        }
    }

    /// Insert a persisted schedule checking only its shape. A schedule saved
    /// under a smaller minimum gap still loads after the gap is raised.
    pub(crate) fn restore(&mut self, schedule: impl Into<RecurringSchedule>) -> Result<(), ValidationError> {
        let schedule = schedule.into();
        match &schedule {
            RecurringSchedule::Interval(s) => s.validate()?,
            RecurringSchedule::Dose(s) => s.validate_shape()?,
        }
        match self.schedules.iter_mut().find(|s| s.id() == schedule.id()) {
            Some(slot) if std::mem::discriminant(slot) != std::mem::discriminant(&schedule) => {
                return Err(ValidationError::WrongKind(schedule.id().to_string()));
            }
            Some(slot) => *slot = schedule,
            None => self.schedules.push(schedule),
        }
        Ok(())
    }

    pub(crate) fn dose_mut(&mut self, id: &str) -> Option<&mut DoseSchedule> {
        self.schedules.iter_mut().find_map(|s| match s {
            RecurringSchedule::Dose(d) if d.id == id => Some(d),
            _ => None,
        })
    }

    fn validate(&self, schedule: &RecurringSchedule) -> Result<(), ValidationError> {
        match schedule {
            RecurringSchedule::Interval(s) => s.validate(),
            RecurringSchedule::Dose(s) => {
                s.validate_shape()?;
                // Times are sorted, so adjacent pairs carry the smallest gaps.
                for pair in s.dose_times().windows(2) {
                    let gap = pair[0].gap(pair[1]);
                    if gap < self.min_gap_minutes {
                        return Err(ValidationError::DoseTimesTooClose {
                            schedule_id: s.id.clone(),
                            first: pair[0],
                            second: pair[1],
                            gap,
                            min_gap: self.min_gap_minutes,
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn med(id: &str, name: &str, times: &[&str]) -> DoseSchedule {
        DoseSchedule::new(
            id,
            name,
            times.iter().map(|s| t(s)).collect(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn close_times_within_one_schedule_are_a_validation_error() {
        let mut registry = ScheduleRegistry::new();
        let err = registry.add(med("a", "Aspirin", &["08:00", "08:10"])).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DoseTimesTooClose { gap: 10, min_gap: 15, .. }
        ));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn close_times_across_schedules_are_one_conflict() {
        let mut registry = ScheduleRegistry::new();
        registry.add(med("a", "Aspirin", &["08:00"])).unwrap();

        let reports = registry.check_conflicts(&[t("08:10")], None);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.offending_time, t("08:10"));
        assert_eq!(report.conflicting_schedule_id, "a");
        assert_eq!(report.conflicting_time, t("08:00"));
        assert_eq!(report.gap_minutes, 10);
        assert!(report.gap_minutes < registry.min_gap_minutes());
    }

    #[test]
    fn gap_boundary() {
        let mut registry = ScheduleRegistry::new();
        registry.add(med("a", "Aspirin", &["08:00"])).unwrap();

        assert!(registry.check_conflicts(&[t("08:15")], None).is_empty());
        assert_eq!(registry.check_conflicts(&[t("08:14")], None).len(), 1);
        assert_eq!(registry.check_conflicts(&[t("07:46")], None).len(), 1);
        assert!(registry.check_conflicts(&[t("07:45")], None).is_empty());
    }

    #[test]
    fn midnight_pairs_do_not_wrap() {
        let mut registry = ScheduleRegistry::new();
        registry.add(med("a", "Night pill", &["23:55"])).unwrap();
        assert!(registry.check_conflicts(&[t("00:05")], None).is_empty());
    }

    #[test]
    fn schedule_is_not_checked_against_itself() {
        let mut registry = ScheduleRegistry::new();
        let a = med("a", "Aspirin", &["08:00", "20:00"]);
        registry.add(a.clone()).unwrap();
        assert!(registry.conflicts_for(&a).is_empty());
        assert_eq!(registry.check_conflicts(a.dose_times(), None).len(), 2);
    }

    #[test]
    fn custom_min_gap() {
        let mut registry = ScheduleRegistry::new().with_min_gap(30);
        registry.add(med("a", "Aspirin", &["08:00"])).unwrap();
        assert_eq!(registry.check_conflicts(&[t("08:20")], None).len(), 1);
        assert!(registry.check_conflicts(&[t("08:30")], None).is_empty());
    }

    #[test]
    fn name_collisions_are_case_insensitive_warnings() {
        let mut registry = ScheduleRegistry::new();
        registry.add(med("a", "Aspirin", &["08:00"])).unwrap();

        let warnings = registry.name_warnings("  aspirin ", None);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].existing_schedule_id, "a");
        assert!(registry.name_warnings("Aspirin", Some("a")).is_empty());
        assert!(registry.name_warnings("Metformin", None).is_empty());
    }

    #[test]
    fn add_update_remove() {
        let mut registry = ScheduleRegistry::new();
        registry.add(IntervalSchedule::default()).unwrap();
        registry.add(med("a", "Aspirin", &["08:00"])).unwrap();
        assert!(matches!(
            registry.add(med("a", "Other", &["09:00"])),
            Err(ValidationError::DuplicateId(_))
        ));

        registry.update(med("a", "Aspirin", &["09:00", "21:00"])).unwrap();
        assert_eq!(registry.dose("a").unwrap().frequency(), 2);

        assert!(matches!(
            registry.update(med("zzz", "Ghost", &["09:00"])),
            Err(ValidationError::UnknownSchedule(_))
        ));

        let water = IntervalSchedule {
            id: "a".into(),
            ..IntervalSchedule::default()
        };
        assert!(matches!(registry.update(water), Err(ValidationError::WrongKind(_))));

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.list().len(), 1);
        assert!(registry.interval("water").is_some());
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let mut registry = ScheduleRegistry::new();
        let bad = IntervalSchedule {
            interval_minutes: 0,
            ..IntervalSchedule::default()
        };
        assert_eq!(registry.add(bad), Err(ValidationError::ZeroInterval));
    }

    #[test]
    fn restore_skips_gap_check_but_not_kind() {
        let mut registry = ScheduleRegistry::new().with_min_gap(30);
        registry.restore(IntervalSchedule::default()).unwrap();
        registry.restore(med("a", "Aspirin", &["08:00", "08:20"])).unwrap();
        assert_eq!(registry.dose("a").unwrap().frequency(), 2);

        registry.restore(med("a", "Aspirin", &["09:00"])).unwrap();
        assert_eq!(registry.doses().count(), 1);
        assert!(matches!(
            registry.restore(med("water", "Water", &["09:00"])),
            Err(ValidationError::WrongKind(_))
        ));
    }

    fn arb_times() -> impl Strategy<Value = Vec<TimeOfDay>> {
        prop::collection::btree_set(0u32..1440, 1..=4).prop_map(|set| {
            set.into_iter()
                .map(|m| TimeOfDay::from_minutes(m).unwrap())
                .collect()
        })
    }

    proptest! {
        #[test]
        fn conflicts_are_symmetric(a_times in arb_times(), b_times in arb_times()) {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let a = DoseSchedule::new("a", "A", a_times, date).unwrap();
            let b = DoseSchedule::new("b", "B", b_times, date).unwrap();

            let mut only_b = ScheduleRegistry::new().with_min_gap(0);
            only_b.add(b.clone()).unwrap();
            let mut only_a = ScheduleRegistry::new().with_min_gap(0);
            only_a.add(a.clone()).unwrap();
            let only_b = only_b.with_min_gap(DEFAULT_MIN_GAP_MINUTES);
            let only_a = only_a.with_min_gap(DEFAULT_MIN_GAP_MINUTES);

            let a_vs_b = only_b.check_conflicts(a.dose_times(), Some("a"));
            let b_vs_a = only_a.check_conflicts(b.dose_times(), Some("b"));

            prop_assert_eq!(a_vs_b.len(), b_vs_a.len());
            for report in &a_vs_b {
                let mirrored = b_vs_a.iter().any(|r| {
                    r.offending_time == report.conflicting_time
                        && r.conflicting_time == report.offending_time
                        && r.gap_minutes == report.gap_minutes
                });
                prop_assert!(mirrored);
            }
        }
    }
}

//! Reminder engine facade.
//!
//! `ReminderEngine` ties the registry, the occurrence log and the fire
//! ledger together behind `&self` methods. It owns no timers and performs
//! no I/O except through the [`BlobStore`] and [`Notifier`] it was built
//! with. The caller drives it:
//!
//! ```text
//! loop every minute and on resume:
//!     engine.tick(now)          -> fires at most once per schedule per interval
//! on user action:
//!     engine.log_water(ml, now)
//!     engine.record_dose(id, date, time, status, now)
//! on demand:
//!     engine.report(now), engine.due_doses(now), engine.refill_projections()
//! ```
//!
//! Lock order is registry before log. Every mutation writes through to the
//! store; a failed write is logged and the in-memory state stays
//! authoritative.

use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result, ValidationError};
use crate::events::Event;
use crate::hydration::HydrationSummary;
use crate::notify::Notifier;
use crate::occurrence::{DoseKey, DoseStatus, Occurrence, OccurrenceKind, OccurrenceLog};
use crate::reminder::{
    slots_for_day, DoseSlot, DoseState, FireDecision, FireLedger, Hold, ReminderContext,
    ReminderEvaluator,
};
use crate::schedule::{
    ConflictReport, DoseSchedule, IntervalSchedule, NameWarning, RecurringSchedule,
    ScheduleRegistry, TimeOfDay,
};
use crate::stats::{
    implicit_misses, project_refill, AdherenceAnalyzer, AdherenceReport, RefillProjection,
};
use crate::storage::{
    load_or_default, save_versioned, BlobStore, Config, OCCURRENCE_LOG_KEY, SCHEDULES_KEY,
    SETTINGS_KEY,
};

/// Persisted form of the `settings` blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(default)]
    interval: IntervalSchedule,
    #[serde(default)]
    last_fired: Option<NaiveDateTime>,
}

/// Result of adding or updating a medicine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Whether the schedule was stored.
    pub saved: bool,
    pub conflicts: Vec<ConflictReport>,
    pub name_warnings: Vec<NameWarning>,
}

impl SaveOutcome {
    pub fn needs_confirmation(&self) -> bool {
        !self.saved && (!self.conflicts.is_empty() || !self.name_warnings.is_empty())
    }
}

/// One interval schedule evaluated at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub schedule_id: String,
    pub decision: FireDecision,
    /// Ledger value the decision was made from.
    pub observed_last_fired: Option<NaiveDateTime>,
    pub at: NaiveDateTime,
}

impl Evaluation {
    /// The commit to attempt, when the decision was to fire.
    pub fn pending(&self) -> Option<PendingFire> {
        match &self.decision {
            FireDecision::Fire(context) => Some(PendingFire {
                context: context.clone(),
                observed_last_fired: self.observed_last_fired,
                at: self.at,
            }),
            FireDecision::DoNotFire(_) => None,
        }
    }
}

/// A fire decision waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFire {
    pub context: ReminderContext,
    /// Ledger value the decision was made from.
    pub observed_last_fired: Option<NaiveDateTime>,
    pub at: NaiveDateTime,
}

pub struct ReminderEngine {
    store: Box<dyn BlobStore>,
    notifier: Box<dyn Notifier>,
    config: Config,
    evaluator: ReminderEvaluator,
    registry: RwLock<ScheduleRegistry>,
    log: Mutex<OccurrenceLog>,
    ledger: FireLedger,
    subscribers: Mutex<Vec<mpsc::Sender<Event>>>,
}

impl ReminderEngine {
    /// Build an engine from persisted state. Missing, malformed or
    /// wrong-version blobs fall back to defaults; this never fails.
    pub fn open(store: Box<dyn BlobStore>, notifier: Box<dyn Notifier>, config: Config) -> Self {
        let settings: StoredSettings = load_or_default(store.as_ref(), SETTINGS_KEY);
        let medicines: Vec<DoseSchedule> = load_or_default(store.as_ref(), SCHEDULES_KEY);
        let mut log: OccurrenceLog = load_or_default(store.as_ref(), OCCURRENCE_LOG_KEY);
        log.set_retention(Some(config.log.retention_days));

        let mut registry = ScheduleRegistry::new().with_min_gap(config.conflicts.min_gap_minutes);
        let interval = match registry.restore(settings.interval.clone()) {
            Ok(()) => settings.interval,
            Err(e) => {
                tracing::warn!(error = %e, "invalid stored settings, using defaults");
                let interval = IntervalSchedule::default();
                // Defaults always validate.
                let _ = registry.restore(interval.clone());
                interval
            }
        };
        for medicine in medicines {
            let id = medicine.id.clone();
            if let Err(e) = registry.restore(medicine) {
                tracing::warn!(schedule_id = %id, error = %e, "dropping invalid stored medicine");
            }
        }

        let ledger = FireLedger::new();
        ledger.seed(&interval.id, settings.last_fired);

        tracing::debug!(
            medicines = registry.doses().count(),
            occurrences = log.len(),
            "engine loaded"
        );

        Self {
            store,
            notifier,
            evaluator: ReminderEvaluator::with_glass_ml(config.water.glass_ml),
            config,
            registry: RwLock::new(registry),
            log: Mutex::new(log),
            ledger,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribers_mut().push(tx);
        rx
    }

    // ── Interval schedule ────────────────────────────────────────────

    pub fn water_settings(&self) -> IntervalSchedule {
        self.registry()
            .intervals()
            .next()
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the interval schedule. A changed id starts a fresh ledger.
    pub fn update_water_settings(&self, settings: IntervalSchedule) -> Result<()> {
        settings.validate()?;
        {
            let mut registry = self.registry_mut();
            let previous: Vec<String> = registry.intervals().map(|s| s.id.clone()).collect();
            for id in previous.iter().filter(|id| **id != settings.id) {
                registry.remove(id);
                self.ledger.forget(id);
            }
            registry.upsert(settings.clone())?;
        }
        tracing::info!(
            schedule_id = %settings.id,
            enabled = settings.enabled,
            interval_minutes = settings.interval_minutes,
            goal_ml = settings.goal_amount,
            "settings changed"
        );
        self.persist_settings();
        self.emit(Event::SettingsChanged {
            schedule_id: settings.id,
        });
        Ok(())
    }

    // ── Medicines ────────────────────────────────────────────────────

    pub fn medicines(&self) -> Vec<DoseSchedule> {
        self.registry().doses().cloned().collect()
    }

    pub fn medicine(&self, id: &str) -> Option<DoseSchedule> {
        self.registry().dose(id).cloned()
    }

    pub fn check_conflicts(
        &self,
        candidate_dose_times: &[TimeOfDay],
        excluding_id: Option<&str>,
    ) -> Vec<ConflictReport> {
        self.registry()
            .check_conflicts(candidate_dose_times, excluding_id)
    }

    /// Add a medicine. Hard validation failures are errors. Conflicts and
    /// name warnings leave the registry untouched unless `confirmed`; the
    /// check and the insert happen under one write lock.
    pub fn add_medicine(&self, medicine: DoseSchedule, confirmed: bool) -> Result<SaveOutcome> {
        let outcome = {
            let mut registry = self.registry_mut();
            let outcome = SaveOutcome {
                saved: false,
                conflicts: registry.conflicts_for(&medicine),
                name_warnings: registry.name_warnings(&medicine.name, None),
            };
            if !confirmed && (!outcome.conflicts.is_empty() || !outcome.name_warnings.is_empty()) {
                return Ok(outcome);
            }
            registry.add(medicine.clone())?;
            SaveOutcome {
                saved: true,
                ..outcome
            }
        };

        tracing::info!(schedule_id = %medicine.id, name = %medicine.name, "medicine added");
        self.persist_schedules();
        self.emit(Event::ScheduleAdded {
            schedule_id: medicine.id.clone(),
        });
        self.emit_conflicts(&medicine.id, &outcome.conflicts);
        Ok(outcome)
    }

    /// Replace a medicine with the same id, with the same confirmation rule
    /// as [`add_medicine`](Self::add_medicine).
    pub fn update_medicine(&self, medicine: DoseSchedule, confirmed: bool) -> Result<SaveOutcome> {
        let outcome = {
            let mut registry = self.registry_mut();
            match registry.get(&medicine.id) {
                Some(RecurringSchedule::Dose(_)) => {}
                Some(RecurringSchedule::Interval(_)) => {
                    return Err(ValidationError::WrongKind(medicine.id.clone()).into())
                }
                None => return Err(ValidationError::UnknownSchedule(medicine.id.clone()).into()),
            }
            let outcome = SaveOutcome {
                saved: false,
                conflicts: registry.conflicts_for(&medicine),
                name_warnings: registry.name_warnings(&medicine.name, Some(&medicine.id)),
            };
            if !confirmed && (!outcome.conflicts.is_empty() || !outcome.name_warnings.is_empty()) {
                return Ok(outcome);
            }
            registry.update(medicine.clone())?;
            SaveOutcome {
                saved: true,
                ..outcome
            }
        };

        tracing::info!(schedule_id = %medicine.id, "medicine updated");
        self.persist_schedules();
        self.emit(Event::ScheduleUpdated {
            schedule_id: medicine.id.clone(),
        });
        self.emit_conflicts(&medicine.id, &outcome.conflicts);
        Ok(outcome)
    }

    /// Remove a medicine. Its occurrences stay in the log.
    pub fn remove_medicine(&self, id: &str) -> Result<DoseSchedule> {
        let removed = {
            let mut registry = self.registry_mut();
            if registry.dose(id).is_none() {
                return Err(match registry.get(id) {
                    Some(_) => ValidationError::WrongKind(id.to_string()),
                    None => ValidationError::UnknownSchedule(id.to_string()),
                }
                .into());
            }
            match registry.remove(id) {
                Some(RecurringSchedule::Dose(medicine)) => medicine,
                _ => return Err(ValidationError::UnknownSchedule(id.to_string()).into()),
            }
        };

        tracing::info!(schedule_id = %id, "medicine removed");
        self.persist_schedules();
        self.emit(Event::ScheduleRemoved {
            schedule_id: id.to_string(),
        });
        Ok(removed)
    }

    // ── Ticking ──────────────────────────────────────────────────────

    /// Evaluate every interval schedule without committing anything.
    pub fn decide(&self, now: NaiveDateTime) -> Vec<Evaluation> {
        let intervals: Vec<IntervalSchedule> = self.registry().intervals().cloned().collect();
        let log = self.log();
        intervals
            .into_iter()
            .map(|schedule| {
                let observed_last_fired = self.ledger.last_fired(&schedule.id);
                let today_total = log.total_amount_on(&schedule.id, now.date());
                let decision = self.evaluator.tick(&schedule, now, observed_last_fired, today_total);
                tracing::debug!(schedule_id = %schedule.id, ?decision, "evaluated");
                Evaluation {
                    schedule_id: schedule.id,
                    decision,
                    observed_last_fired,
                    at: now,
                }
            })
            .collect()
    }

    /// Commit a fire decision. Fails if the schedule was disabled or removed
    /// since the decision, or if another commit already moved the ledger.
    pub fn commit(&self, pending: &PendingFire) -> bool {
        let schedule_id = &pending.context.schedule_id;
        // Held across the compare-and-set so a concurrent disable either
        // lands before the check or after the commit.
        let registry = self.registry();
        let enabled = registry.interval(schedule_id).is_some_and(|s| s.enabled);
        if !enabled {
            tracing::debug!(schedule_id = %schedule_id, "schedule disabled before commit");
            return false;
        }
        self.ledger
            .try_commit(schedule_id, pending.observed_last_fired, pending.at)
    }

    /// Evaluate, commit and notify. Returns one decision per interval
    /// schedule; a decision that lost its commit is reported as
    /// [`Hold::Superseded`] or [`Hold::Disabled`].
    pub fn tick(&self, now: NaiveDateTime) -> Vec<FireDecision> {
        let mut results = Vec::new();
        for evaluation in self.decide(now) {
            let Some(pending) = evaluation.pending() else {
                results.push(evaluation.decision);
                continue;
            };
            let schedule_id = evaluation.schedule_id;
            if !self.commit(&pending) {
                let still_enabled = self
                    .registry()
                    .interval(&schedule_id)
                    .is_some_and(|s| s.enabled);
                results.push(FireDecision::DoNotFire(if still_enabled {
                    Hold::Superseded
                } else {
                    Hold::Disabled
                }));
                continue;
            }

            let context = pending.context;
            let (title, body) = (context.title().to_string(), context.body());
            tracing::info!(schedule_id = %schedule_id, remaining_ml = context.remaining_ml, "reminder fired");
            if let Err(e) = self.notifier.notify(&title, &body, now) {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "notification failed");
            }
            self.persist_settings();
            self.emit(Event::ReminderFired {
                schedule_id,
                title,
                body,
                at: now,
            });
            results.push(FireDecision::Fire(context));
        }
        results
    }

    pub fn last_fired(&self, schedule_id: &str) -> Option<NaiveDateTime> {
        self.ledger.last_fired(schedule_id)
    }

    // ── Occurrences ──────────────────────────────────────────────────

    /// Log an amount against the interval schedule.
    pub fn log_water(&self, ml: u32, now: NaiveDateTime) -> Result<HydrationSummary> {
        if ml == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let settings = self.water_settings();
        let today_total = {
            let mut log = self.log();
            log.append_at(Occurrence::amount(settings.id.clone(), ml, now), now.date());
            log.total_amount_on(&settings.id, now.date())
        };

        tracing::info!(schedule_id = %settings.id, ml, today_total, "water logged");
        self.persist_log();
        self.emit(Event::WaterLogged {
            schedule_id: settings.id.clone(),
            ml,
            today_total_ml: today_total,
            at: now,
        });
        Ok(HydrationSummary::new(
            &settings,
            today_total,
            self.config.water.glass_ml,
        ))
    }

    pub fn hydration(&self, now: NaiveDateTime) -> HydrationSummary {
        let settings = self.water_settings();
        let today_total = self.log().total_amount_on(&settings.id, now.date());
        HydrationSummary::new(&settings, today_total, self.config.water.glass_ml)
    }

    /// Record the outcome of one dose slot, replacing any earlier record for
    /// it. The first `Taken` for a slot draws one unit from refill tracking.
    pub fn record_dose(
        &self,
        schedule_id: &str,
        date: NaiveDate,
        scheduled_time: TimeOfDay,
        status: DoseStatus,
        now: NaiveDateTime,
    ) -> Result<Occurrence> {
        if status == DoseStatus::Snoozed {
            return self.snooze_dose(schedule_id, date, scheduled_time, now);
        }

        let (occurrence, refill_changed) = {
            let mut registry = self.registry_mut();
            let key = Self::dose_key(&registry, schedule_id, date, scheduled_time)?;
            let mut log = self.log();
            let previous = log.find(&key).and_then(|o| o.dose_record()).cloned();

            let mut occurrence = Occurrence::dose(schedule_id, date, scheduled_time, status, now);
            if let (OccurrenceKind::Dose(record), Some(previous)) = (&mut occurrence.kind, &previous) {
                record.snooze_count = previous.snooze_count;
            }

            let first_taken = status == DoseStatus::Taken
                && previous.map_or(true, |p| p.status != DoseStatus::Taken);
            let mut refill_changed = false;
            if first_taken {
                if let Some(refill) = registry.dose_mut(schedule_id).and_then(|m| m.refill.as_mut()) {
                    refill.remaining_quantity = refill.remaining_quantity.saturating_sub(1);
                    refill_changed = true;
                }
            }

            log.append_at(occurrence.clone(), now.date());
            (occurrence, refill_changed)
        };

        tracing::info!(schedule_id, %date, %scheduled_time, ?status, "dose recorded");
        self.persist_log();
        if refill_changed {
            self.persist_schedules();
        }
        self.emit(Event::DoseRecorded {
            schedule_id: schedule_id.to_string(),
            date,
            scheduled_time,
            status,
            at: now,
        });
        Ok(occurrence)
    }

    /// Snooze a dose slot for `doses.snooze_minutes`. The snooze ends at
    /// the last minute of the slot's day at the latest.
    pub fn snooze_dose(
        &self,
        schedule_id: &str,
        date: NaiveDate,
        scheduled_time: TimeOfDay,
        now: NaiveDateTime,
    ) -> Result<Occurrence> {
        let wake = now + Duration::minutes(self.config.doses.snooze_minutes as i64);
        let until = if wake.date() > date {
            TimeOfDay::LAST_MINUTE
        } else {
            TimeOfDay::from_naive_time(wake.time())
        };

        let occurrence = {
            let registry = self.registry();
            let key = Self::dose_key(&registry, schedule_id, date, scheduled_time)?;
            let mut log = self.log();
            let snooze_count = log
                .find(&key)
                .and_then(|o| o.dose_record())
                .map_or(0, |r| r.snooze_count)
                + 1;

            let mut occurrence =
                Occurrence::dose(schedule_id, date, scheduled_time, DoseStatus::Snoozed, now);
            if let OccurrenceKind::Dose(record) = &mut occurrence.kind {
                record.snoozed_until = Some(until);
                record.snooze_count = snooze_count;
            }
            log.append_at(occurrence.clone(), now.date());
            occurrence
        };

        tracing::info!(schedule_id, %date, %scheduled_time, %until, "dose snoozed");
        self.persist_log();
        self.emit(Event::DoseRecorded {
            schedule_id: schedule_id.to_string(),
            date,
            scheduled_time,
            status: DoseStatus::Snoozed,
            at: now,
        });
        Ok(occurrence)
    }

    fn dose_key(
        registry: &ScheduleRegistry,
        schedule_id: &str,
        date: NaiveDate,
        scheduled_time: TimeOfDay,
    ) -> Result<DoseKey> {
        let medicine = registry.dose(schedule_id).ok_or_else(|| match registry.get(schedule_id) {
            Some(_) => ValidationError::WrongKind(schedule_id.to_string()),
            None => ValidationError::UnknownSchedule(schedule_id.to_string()),
        })?;
        if !medicine.has_dose_time(scheduled_time) {
            return Err(ValidationError::UnknownDoseTime {
                schedule_id: schedule_id.to_string(),
                time: scheduled_time,
            }
            .into());
        }
        Ok(DoseKey {
            schedule_id: schedule_id.to_string(),
            date,
            scheduled_time,
        })
    }

    /// Every dose slot of today for active medicines, by time.
    pub fn doses_today(&self, now: NaiveDateTime) -> Vec<DoseSlot> {
        let registry = self.registry();
        let log = self.log();
        let mut slots: Vec<DoseSlot> = registry
            .doses()
            .flat_map(|m| slots_for_day(m, now.date(), &log, now, self.config.doses.grace))
            .collect();
        slots.sort_by_key(|s| s.scheduled_time);
        slots
    }

    /// Today's slots that need attention now.
    pub fn due_doses(&self, now: NaiveDateTime) -> Vec<DoseSlot> {
        self.doses_today(now)
            .into_iter()
            .filter(|s| s.state == DoseState::Due)
            .collect()
    }

    /// Occurrences with `since <= timestamp <= until`, oldest first.
    pub fn occurrences(&self, since: NaiveDateTime, until: NaiveDateTime) -> Vec<Occurrence> {
        self.log().query(since, until).into_iter().cloned().collect()
    }

    // ── Analysis ─────────────────────────────────────────────────────

    /// Adherence over the configured window.
    pub fn report(&self, now: NaiveDateTime) -> AdherenceReport {
        self.report_window(now, self.config.adherence.window_days)
    }

    pub fn report_window(&self, now: NaiveDateTime, window_days: u32) -> AdherenceReport {
        let medicines = self.medicines();
        let log = self.log();
        let implicit = if self.config.adherence.count_implicit_missed {
            implicit_misses(&medicines, &log, now, window_days, self.config.doses.grace)
        } else {
            Vec::new()
        };
        AdherenceAnalyzer::with_window(window_days).report(
            &medicines,
            log.entries().iter().chain(implicit.iter()),
            now,
        )
    }

    pub fn refill_projections(&self) -> Vec<RefillProjection> {
        self.registry()
            .doses()
            .filter_map(|m| project_refill(m, self.config.refill.warning_days))
            .collect()
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Write all state to the store.
    pub fn save(&self) -> std::result::Result<(), PersistenceError> {
        save_versioned(self.store.as_ref(), SETTINGS_KEY, &self.stored_settings())?;
        save_versioned(self.store.as_ref(), SCHEDULES_KEY, &self.medicines())?;
        let log = self.log();
        save_versioned(self.store.as_ref(), OCCURRENCE_LOG_KEY, &*log)
    }

    fn stored_settings(&self) -> StoredSettings {
        let interval = self.water_settings();
        let last_fired = self.ledger.last_fired(&interval.id);
        StoredSettings {
            interval,
            last_fired,
        }
    }

    fn persist_settings(&self) {
        let settings = self.stored_settings();
        Self::warn_on_failure(SETTINGS_KEY, save_versioned(self.store.as_ref(), SETTINGS_KEY, &settings));
    }

    fn persist_schedules(&self) {
        let medicines = self.medicines();
        Self::warn_on_failure(SCHEDULES_KEY, save_versioned(self.store.as_ref(), SCHEDULES_KEY, &medicines));
    }

    fn persist_log(&self) {
        let log = self.log();
        Self::warn_on_failure(
            OCCURRENCE_LOG_KEY,
            save_versioned(self.store.as_ref(), OCCURRENCE_LOG_KEY, &*log),
        );
    }

    fn warn_on_failure(key: &str, result: std::result::Result<(), PersistenceError>) {
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to persist, keeping in-memory state");
        }
    }

    // ── Events and locks ─────────────────────────────────────────────

    fn emit(&self, event: Event) {
        self.subscribers_mut()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn emit_conflicts(&self, schedule_id: &str, conflicts: &[ConflictReport]) {
        if conflicts.is_empty() {
            return;
        }
        tracing::info!(schedule_id, count = conflicts.len(), "saved with conflicts");
        self.emit(Event::ConflictDetected {
            schedule_id: schedule_id.to_string(),
            conflicts: conflicts.to_vec(),
        });
    }

    fn registry(&self) -> RwLockReadGuard<'_, ScheduleRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ScheduleRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, OccurrenceLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers_mut(&self) -> MutexGuard<'_, Vec<mpsc::Sender<Event>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryBlobStore;
    use std::sync::Arc;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn engine() -> (ReminderEngine, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::open(
            Box::new(MemoryBlobStore::new()),
            Box::new(Arc::clone(&notifier)),
            Config::default(),
        );
        (engine, notifier)
    }

    fn med(id: &str, name: &str, times: &[&str]) -> DoseSchedule {
        let times = times.iter().map(|s| t(s)).collect();
        DoseSchedule::new(id, name, times, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap()
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReminderEngine>();
    }

    #[test]
    fn tick_fires_once_per_interval() {
        let (engine, notifier) = engine();
        assert!(engine.tick(at(1, 9, 0))[0].should_fire());
        assert!(!engine.tick(at(1, 9, 30))[0].should_fire());
        assert!(engine.tick(at(1, 10, 0))[0].should_fire());
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(notifier.sent()[0].title, "Time to drink water");
        assert_eq!(engine.last_fired("water"), Some(at(1, 10, 0)));
    }

    struct OfflineNotifier;

    impl Notifier for OfflineNotifier {
        fn notify(&self, _: &str, _: &str, _: NaiveDateTime) -> std::result::Result<(), crate::error::NotifyError> {
            Err(crate::error::NotifyError::Unavailable("no display".into()))
        }
    }

    #[test]
    fn failed_notification_still_commits() {
        let engine = ReminderEngine::open(
            Box::new(MemoryBlobStore::new()),
            Box::new(OfflineNotifier),
            Config::default(),
        );
        let events = engine.subscribe();
        assert!(engine.tick(at(1, 9, 0))[0].should_fire());
        assert_eq!(engine.last_fired("water"), Some(at(1, 9, 0)));
        assert!(!engine.tick(at(1, 9, 1))[0].should_fire());
        assert!(matches!(events.try_recv(), Ok(Event::ReminderFired { .. })));
    }

    #[test]
    fn disable_between_decide_and_commit_suppresses() {
        let (engine, notifier) = engine();
        let pending = engine.decide(at(1, 9, 0))[0].pending().expect("fire decision");

        engine
            .update_water_settings(IntervalSchedule {
                enabled: false,
                ..IntervalSchedule::default()
            })
            .unwrap();

        assert!(!engine.commit(&pending));
        assert_eq!(engine.last_fired("water"), None);
        assert!(notifier.sent().is_empty());
        assert_eq!(engine.tick(at(1, 9, 0)), vec![FireDecision::DoNotFire(Hold::Disabled)]);
    }

    #[test]
    fn stale_decision_loses_commit() {
        let (engine, _) = engine();
        let evaluation = engine.decide(at(1, 9, 0)).remove(0);
        let pending = evaluation.pending().expect("fire decision");
        assert_eq!(pending.observed_last_fired, None);
        assert!(engine.commit(&pending));
        assert!(!engine.commit(&pending));
    }

    #[test]
    fn goal_met_stops_reminders() {
        let (engine, _) = engine();
        let summary = engine.log_water(2000, at(1, 8, 0)).unwrap();
        assert!(summary.goal_met());
        assert_eq!(
            engine.tick(at(1, 9, 0)),
            vec![FireDecision::DoNotFire(Hold::GoalMet)]
        );
        assert!(engine.log_water(0, at(1, 8, 0)).is_err());
    }

    #[test]
    fn add_medicine_requires_confirmation_for_conflicts() {
        let (engine, _) = engine();
        let events = engine.subscribe();
        assert!(engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap().saved);

        let outcome = engine.add_medicine(med("b", "Biotin", &["08:10"]), false).unwrap();
        assert!(!outcome.saved);
        assert!(outcome.needs_confirmation());
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].gap_minutes, 10);
        assert_eq!(engine.medicines().len(), 1);

        let outcome = engine.add_medicine(med("b", "Biotin", &["08:10"]), true).unwrap();
        assert!(outcome.saved);
        assert_eq!(engine.medicines().len(), 2);

        let received: Vec<Event> = events.try_iter().collect();
        assert!(matches!(received[0], Event::ScheduleAdded { .. }));
        assert!(matches!(received[1], Event::ScheduleAdded { .. }));
        assert!(matches!(received[2], Event::ConflictDetected { .. }));
    }

    #[test]
    fn add_medicine_flags_duplicate_names() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        let outcome = engine.add_medicine(med("b", "aspirin ", &["20:00"]), false).unwrap();
        assert!(!outcome.saved);
        assert_eq!(outcome.name_warnings[0].existing_schedule_id, "a");
    }

    #[test]
    fn update_and_remove_medicine() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        let outcome = engine.update_medicine(med("a", "Aspirin", &["09:00"]), false).unwrap();
        assert!(outcome.saved);
        assert_eq!(engine.medicine("a").unwrap().dose_times(), &[t("09:00")]);

        assert!(engine.update_medicine(med("x", "X", &["09:00"]), false).is_err());
        assert!(engine.remove_medicine("water").is_err());
        assert_eq!(engine.remove_medicine("a").unwrap().id, "a");
        assert!(engine.remove_medicine("a").is_err());
    }

    #[test]
    fn taken_draws_refill_once() {
        let (engine, _) = engine();
        engine
            .add_medicine(med("a", "Aspirin", &["08:00"]).with_refill(10), false)
            .unwrap();
        let date = at(2, 0, 0).date();

        engine.record_dose("a", date, t("08:00"), DoseStatus::Taken, at(2, 8, 0)).unwrap();
        engine.record_dose("a", date, t("08:00"), DoseStatus::Taken, at(2, 8, 5)).unwrap();
        assert_eq!(engine.refill_projections()[0].remaining_quantity, 9);

        engine.record_dose("a", date, t("08:00"), DoseStatus::Skipped, at(2, 8, 6)).unwrap();
        engine.record_dose("a", date, t("08:00"), DoseStatus::Taken, at(2, 8, 7)).unwrap();
        assert_eq!(engine.refill_projections()[0].remaining_quantity, 8);
    }

    #[test]
    fn record_dose_rejects_unknown_slot() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        let date = at(2, 0, 0).date();
        assert!(matches!(
            engine.record_dose("a", date, t("09:00"), DoseStatus::Taken, at(2, 9, 0)),
            Err(crate::error::CoreError::Validation(ValidationError::UnknownDoseTime { .. }))
        ));
        assert!(engine.record_dose("zzz", date, t("08:00"), DoseStatus::Taken, at(2, 9, 0)).is_err());
        assert!(engine.record_dose("water", date, t("08:00"), DoseStatus::Taken, at(2, 9, 0)).is_err());
    }

    #[test]
    fn snooze_counts_and_expires() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        let date = at(2, 0, 0).date();

        engine.snooze_dose("a", date, t("08:00"), at(2, 8, 0)).unwrap();
        let second = engine.snooze_dose("a", date, t("08:00"), at(2, 8, 15)).unwrap();
        let record = second.dose_record().unwrap();
        assert_eq!(record.snooze_count, 2);
        assert_eq!(record.snoozed_until, Some(t("08:30")));

        assert!(engine.due_doses(at(2, 8, 20)).is_empty());
        assert_eq!(engine.due_doses(at(2, 8, 30)).len(), 1);

        let late = engine.snooze_dose("a", date, t("08:00"), at(2, 23, 50)).unwrap();
        assert_eq!(late.dose_record().unwrap().snoozed_until, Some(TimeOfDay::LAST_MINUTE));
    }

    #[test]
    fn report_counts_implicit_misses() {
        let (engine, _) = engine();
        let day2 = at(2, 0, 0).date();
        let mut aspirin = med("a", "Aspirin", &["08:00"]);
        aspirin.start_date = day2;
        engine.add_medicine(aspirin, false).unwrap();
        engine.record_dose("a", day2, t("08:00"), DoseStatus::Taken, at(2, 8, 0)).unwrap();

        // Day 3 never recorded; day 4 still open.
        let report = engine.report(at(4, 12, 0));
        assert_eq!(report.taken, 1);
        assert_eq!(report.missed, 1);
        assert_eq!(report.overall_rate_pct, 50);
        assert_eq!(report.most_missed_time, Some(t("08:00")));
    }

    #[test]
    fn report_ignores_pruned_history() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        for d in 1..=20 {
            let date = at(d, 0, 0).date();
            engine.record_dose("a", date, t("08:00"), DoseStatus::Taken, at(d, 8, 0)).unwrap();
        }

        // Only the last week survives retention, and none of it is missed.
        let report = engine.report_window(at(20, 12, 0), 30);
        assert_eq!(report.total, 8);
        assert_eq!(report.taken, 8);
        assert_eq!(report.missed, 0);
    }

    #[test]
    fn expired_snooze_reported_as_missed() {
        let (engine, _) = engine();
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        engine.snooze_dose("a", at(2, 0, 0).date(), t("08:00"), at(2, 8, 0)).unwrap();

        let report = engine.report_window(at(4, 12, 0), 3);
        assert_eq!(report.total, 2);
        assert_eq!(report.missed, 2);
        assert_eq!(report.taken, 0);
    }

    #[test]
    fn save_and_reopen() {
        let store = Arc::new(MemoryBlobStore::new());
        let engine = ReminderEngine::open(
            Box::new(Arc::clone(&store)),
            Box::new(RecordingNotifier::new()),
            Config::default(),
        );
        engine.add_medicine(med("a", "Aspirin", &["08:00"]), false).unwrap();
        engine.log_water(250, at(1, 8, 0)).unwrap();
        engine.tick(at(1, 9, 0));
        engine.save().unwrap();

        let reopened = ReminderEngine::open(
            Box::new(Arc::clone(&store)),
            Box::new(RecordingNotifier::new()),
            Config::default(),
        );
        assert_eq!(reopened.medicines().len(), 1);
        assert_eq!(reopened.hydration(at(1, 12, 0)).today_total_ml, 250);
        assert_eq!(reopened.last_fired("water"), Some(at(1, 9, 0)));
        assert!(!reopened.tick(at(1, 9, 30))[0].should_fire());
    }
}

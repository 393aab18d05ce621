//! Integration tests for the reminder engine.
//!
//! Drives the engine through a day of water reminders and medicine doses,
//! then checks persistence through the SQLite store and fallback on
//! corrupted blobs.

use std::sync::Arc;
use std::thread;

use carebell_core::storage::{save_versioned, SCHEDULES_KEY, SETTINGS_KEY};
use carebell_core::{
    BlobStore, Config, DoseSchedule, DoseState, DoseStatus, Event, FireDecision, GracePeriod,
    IntervalSchedule, MemoryBlobStore, RecordingNotifier, RefillStatus, ReminderEngine,
    SqliteBlobStore, TimeOfDay,
};
use chrono::{NaiveDate, NaiveDateTime};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn medicine(id: &str, name: &str, times: &[&str]) -> DoseSchedule {
    DoseSchedule::new(id, name, times.iter().map(|s| t(s)).collect(), day(1)).unwrap()
}

fn memory_engine(notifier: Arc<RecordingNotifier>) -> ReminderEngine {
    ReminderEngine::open(
        Box::new(MemoryBlobStore::new()),
        Box::new(notifier),
        Config::default(),
    )
}

#[test]
fn test_water_day_workflow() {
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = memory_engine(Arc::clone(&notifier));
    let events = engine.subscribe();

    // Tick every minute from 06:00 to 22:00, drinking a glass per reminder.
    let mut fired = Vec::new();
    for minute in (6 * 60)..(22 * 60) {
        let now = at(1, minute / 60, minute % 60);
        if engine.tick(now).iter().any(FireDecision::should_fire) {
            fired.push(now);
            engine.log_water(250, now).unwrap();
        }
    }

    // 07:00, 08:00, ... eight glasses reach the 2000 ml goal at 14:00.
    assert_eq!(fired.len(), 8);
    assert_eq!(fired[0], at(1, 7, 0));
    assert_eq!(fired[7], at(1, 14, 0));
    assert!(engine.hydration(at(1, 22, 0)).goal_met());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 8);
    assert_eq!(sent[0].body, "Stay hydrated! 8 more glasses to reach your goal.");
    assert_eq!(sent[7].body, "Stay hydrated! 1 more glass to reach your goal.");

    let received: Vec<Event> = events.try_iter().collect();
    let reminders = received
        .iter()
        .filter(|e| matches!(e, Event::ReminderFired { .. }))
        .count();
    let logged = received
        .iter()
        .filter(|e| matches!(e, Event::WaterLogged { .. }))
        .count();
    assert_eq!((reminders, logged), (8, 8));
}

#[test]
fn test_new_day_resets_total() {
    let engine = memory_engine(Arc::new(RecordingNotifier::new()));
    engine.log_water(2000, at(1, 10, 0)).unwrap();
    assert!(!engine.tick(at(1, 12, 0))[0].should_fire());
    assert!(engine.tick(at(2, 7, 0))[0].should_fire());
    assert_eq!(engine.hydration(at(2, 7, 0)).today_total_ml, 0);
}

#[test]
fn test_racing_ticks_fire_once() {
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Arc::new(memory_engine(Arc::clone(&notifier)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.tick(at(1, 9, 0)))
        })
        .collect();
    let fires = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .filter(FireDecision::should_fire)
        .count();

    assert_eq!(fires, 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[test]
fn test_disabled_settings_never_fire() {
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = memory_engine(Arc::clone(&notifier));
    engine
        .update_water_settings(IntervalSchedule {
            enabled: false,
            ..IntervalSchedule::default()
        })
        .unwrap();
    for h in 7..=21 {
        assert!(!engine.tick(at(1, h, 0))[0].should_fire());
    }
    assert!(notifier.sent().is_empty());
}

#[test]
fn test_medicine_day_workflow() {
    let engine = memory_engine(Arc::new(RecordingNotifier::new()));
    let outcome = engine
        .add_medicine(
            medicine("met", "Metformin", &["08:00", "20:00"])
                .with_dosage("500 mg")
                .with_refill(6),
            false,
        )
        .unwrap();
    assert!(outcome.saved);

    let slots = engine.doses_today(at(3, 7, 0));
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|s| s.state == DoseState::Upcoming));

    assert_eq!(engine.due_doses(at(3, 8, 5)).len(), 1);
    engine
        .record_dose("met", day(3), t("08:00"), DoseStatus::Taken, at(3, 8, 5))
        .unwrap();
    assert!(engine.due_doses(at(3, 8, 6)).is_empty());

    let projection = &engine.refill_projections()[0];
    assert_eq!(projection.remaining_quantity, 5);
    assert_eq!(projection.days_left, 2);
    assert_eq!(projection.status, RefillStatus::Warning);

    // 20:00 is never recorded and counts as missed after the day ends.
    let report = engine.report(at(4, 7, 0));
    assert_eq!(report.per_item[0].item_id, "met");
    assert!(report.missed >= 1);
    assert_eq!(report.most_missed_time, Some(t("20:00")));
}

#[test]
fn test_implicit_misses_can_be_disabled() {
    let mut config = Config::default();
    config.adherence.count_implicit_missed = false;
    let engine = ReminderEngine::open(
        Box::new(MemoryBlobStore::new()),
        Box::new(RecordingNotifier::new()),
        config,
    );
    engine
        .add_medicine(medicine("a", "Aspirin", &["08:00"]), false)
        .unwrap();
    let report = engine.report(at(5, 12, 0));
    assert_eq!(report.total, 0);
    assert_eq!(report.overall_rate_pct, 0);
}

#[test]
fn test_minute_grace_marks_missed_same_day() {
    let mut config = Config::default();
    config.doses.grace = GracePeriod::Minutes(60);
    let engine = ReminderEngine::open(
        Box::new(MemoryBlobStore::new()),
        Box::new(RecordingNotifier::new()),
        config,
    );
    engine
        .add_medicine(medicine("a", "Aspirin", &["08:00"]).critical(), false)
        .unwrap();

    let slots = engine.doses_today(at(2, 9, 30));
    assert_eq!(slots[0].state, DoseState::Missed);
    assert!(slots[0].critical);
}

#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carebell.db");

    {
        let engine = ReminderEngine::open(
            Box::new(SqliteBlobStore::open_at(&path).unwrap()),
            Box::new(RecordingNotifier::new()),
            Config::default(),
        );
        engine
            .update_water_settings(IntervalSchedule {
                goal_amount: 3000,
                interval_minutes: 45,
                ..IntervalSchedule::default()
            })
            .unwrap();
        engine
            .add_medicine(medicine("a", "Aspirin", &["08:00"]), false)
            .unwrap();
        engine
            .record_dose("a", day(2), t("08:00"), DoseStatus::Skipped, at(2, 8, 1))
            .unwrap();
        engine.log_water(500, at(2, 9, 0)).unwrap();
    }

    let engine = ReminderEngine::open(
        Box::new(SqliteBlobStore::open_at(&path).unwrap()),
        Box::new(RecordingNotifier::new()),
        Config::default(),
    );
    let settings = engine.water_settings();
    assert_eq!(settings.goal_amount, 3000);
    assert_eq!(settings.interval_minutes, 45);
    assert_eq!(engine.medicines()[0].name, "Aspirin");
    assert_eq!(engine.hydration(at(2, 10, 0)).today_total_ml, 500);
    assert_eq!(engine.occurrences(at(2, 0, 0), at(2, 23, 59)).len(), 2);
}

#[test]
fn test_malformed_blobs_fall_back_to_defaults() {
    let store = MemoryBlobStore::new()
        .with_blob(SETTINGS_KEY, "{ this is not json")
        .with_blob(SCHEDULES_KEY, r#"{"version":99,"payload":[]}"#)
        .with_blob("occurrence_log", r#"{"version":1,"payload":{"oops":true}}"#);

    let engine = ReminderEngine::open(
        Box::new(store),
        Box::new(RecordingNotifier::new()),
        Config::default(),
    );

    assert_eq!(engine.water_settings(), IntervalSchedule::default());
    assert!(engine.medicines().is_empty());
    assert!(engine.occurrences(at(1, 0, 0), at(31, 0, 0)).is_empty());
    assert!(engine.tick(at(1, 9, 0))[0].should_fire());
}

#[test]
fn test_invalid_stored_medicine_is_dropped() {
    let store = Arc::new(MemoryBlobStore::new());
    let good = medicine("a", "Aspirin", &["08:00"]);
    let mut bad = serde_json::to_value(medicine("b", "Biotin", &["09:00"])).unwrap();
    bad["name"] = serde_json::Value::String(String::new());
    save_versioned(store.as_ref(), SCHEDULES_KEY, &vec![serde_json::to_value(&good).unwrap(), bad])
        .unwrap();

    let engine = ReminderEngine::open(
        Box::new(Arc::clone(&store)),
        Box::new(RecordingNotifier::new()),
        Config::default(),
    );
    let ids: Vec<String> = engine.medicines().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["a".to_string()]);
    assert!(store.load(SCHEDULES_KEY).unwrap().is_some());
}

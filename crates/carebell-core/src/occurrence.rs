//! Occurrence log.
//!
//! Append-only record of what actually happened: water amounts logged and
//! dose outcomes. Dose entries are keyed by `(schedule_id, date,
//! scheduled_time)` and a second write for the same key replaces the first.
//! Amount entries are never deduplicated.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::TimeOfDay;

/// Outcome of a scheduled dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Pending,
    Taken,
    Skipped,
    Missed,
    Snoozed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseRecord {
    pub scheduled_time: TimeOfDay,
    pub date: NaiveDate,
    pub status: DoseStatus,
    #[serde(default)]
    pub snoozed_until: Option<TimeOfDay>,
    #[serde(default)]
    pub snooze_count: u32,
}

impl DoseRecord {
    /// The instant the dose was due.
    pub fn slot(&self) -> NaiveDateTime {
        self.date.and_time(self.scheduled_time.to_naive_time())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OccurrenceKind {
    AmountLogged { ml: u32 },
    Dose(DoseRecord),
}

/// Identity of one dose slot on one day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DoseKey {
    pub schedule_id: String,
    pub date: NaiveDate,
    pub scheduled_time: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: String,
    pub schedule_id: String,
    pub timestamp: NaiveDateTime,
    pub kind: OccurrenceKind,
}

impl Occurrence {
    pub fn amount(schedule_id: impl Into<String>, ml: u32, at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schedule_id: schedule_id.into(),
            timestamp: at,
            kind: OccurrenceKind::AmountLogged { ml },
        }
    }

    pub fn dose(
        schedule_id: impl Into<String>,
        date: NaiveDate,
        scheduled_time: TimeOfDay,
        status: DoseStatus,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schedule_id: schedule_id.into(),
            timestamp: at,
            kind: OccurrenceKind::Dose(DoseRecord {
                scheduled_time,
                date,
                status,
                snoozed_until: None,
                snooze_count: 0,
            }),
        }
    }

    pub fn dose_record(&self) -> Option<&DoseRecord> {
        match &self.kind {
            OccurrenceKind::Dose(record) => Some(record),
            OccurrenceKind::AmountLogged { .. } => None,
        }
    }

    pub fn amount_ml(&self) -> Option<u32> {
        match self.kind {
            OccurrenceKind::AmountLogged { ml } => Some(ml),
            OccurrenceKind::Dose(_) => None,
        }
    }

    pub fn key(&self) -> Option<DoseKey> {
        self.dose_record().map(|record| DoseKey {
            schedule_id: self.schedule_id.clone(),
            date: record.date,
            scheduled_time: record.scheduled_time,
        })
    }

    /// Calendar day the entry belongs to: the dose date, or the day it was
    /// logged for amounts.
    pub fn day(&self) -> NaiveDate {
        match &self.kind {
            OccurrenceKind::Dose(record) => record.date,
            OccurrenceKind::AmountLogged { .. } => self.timestamp.date(),
        }
    }

    fn matches(&self, key: &DoseKey) -> bool {
        self.schedule_id == key.schedule_id
            && self
                .dose_record()
                .is_some_and(|r| r.date == key.date && r.scheduled_time == key.scheduled_time)
    }
}

fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(retention_days as i64))
        .unwrap_or(NaiveDate::MIN)
}

/// In-memory occurrence log with optional retention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceLog {
    entries: Vec<Occurrence>,
    #[serde(skip)]
    retention_days: Option<u32>,
}

impl OccurrenceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune entries older than `days` on every [`append_at`](Self::append_at).
    pub fn with_retention(mut self, days: u32) -> Self {
        self.retention_days = Some(days);
        self
    }

    pub fn set_retention(&mut self, days: Option<u32>) {
        self.retention_days = days;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in write order.
    pub fn entries(&self) -> &[Occurrence] {
        &self.entries
    }

    /// Append an occurrence. A dose entry replaces any earlier entry for the
    /// same slot, which is returned. Nothing is pruned.
    pub fn append(&mut self, occurrence: Occurrence) -> Option<Occurrence> {
        let replaced = occurrence.key().and_then(|key| {
            let index = self.entries.iter().position(|e| e.matches(&key))?;
            Some(self.entries.remove(index))
        });
        self.entries.push(occurrence);
        replaced
    }

    /// Append as of the caller's `today`, then prune by the configured
    /// retention relative to that same day.
    pub fn append_at(&mut self, occurrence: Occurrence, today: NaiveDate) -> Option<Occurrence> {
        let replaced = self.append(occurrence);
        if let Some(days) = self.retention_days {
            let pruned = self.prune(days, today);
            if pruned > 0 {
                tracing::debug!(pruned, retention_days = days, %today, "pruned occurrence log");
            }
        }
        replaced
    }

    /// First day whose entries are guaranteed to survive pruning as of
    /// `today`, when retention is configured. Absence of a record before
    /// this day says nothing about what happened.
    pub fn retained_since(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.retention_days.map(|days| retention_cutoff(today, days))
    }

    pub fn find(&self, key: &DoseKey) -> Option<&Occurrence> {
        self.entries.iter().find(|e| e.matches(key))
    }

    /// Entries with `since <= timestamp <= until`, oldest first. Entries with
    /// equal timestamps keep their write order.
    pub fn query(&self, since: NaiveDateTime, until: NaiveDateTime) -> Vec<&Occurrence> {
        let mut found: Vec<&Occurrence> = self
            .entries
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= until)
            .collect();
        found.sort_by_key(|e| e.timestamp);
        found
    }

    /// Remove entries whose day is before `today - retention_days`. Entries
    /// on `today` or later always survive. Returns how many were removed.
    pub fn prune(&mut self, retention_days: u32, today: NaiveDate) -> usize {
        // cutoff never passes today, so today's entries always survive.
        let cutoff = retention_cutoff(today, retention_days);
        let before = self.entries.len();
        self.entries.retain(|e| e.day() >= cutoff);
        before - self.entries.len()
    }

    /// Sum of amounts logged against `schedule_id` on `date`.
    pub fn total_amount_on(&self, schedule_id: &str, date: NaiveDate) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.schedule_id == schedule_id && e.timestamp.date() == date)
            .filter_map(Occurrence::amount_ml)
            .fold(0u32, |acc, ml| acc.saturating_add(ml))
    }
}

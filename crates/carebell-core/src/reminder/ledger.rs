//! Last-fired bookkeeping for interval schedules.
//!
//! Each schedule gets one atomic slot. Committing a fire is a single
//! compare-and-set against the value the decision was made from, so two
//! near-simultaneous ticks that both decided to fire commit at most once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, NaiveDateTime};

const NEVER: i64 = i64::MIN;

fn encode(at: Option<NaiveDateTime>) -> i64 {
    at.map_or(NEVER, |t| t.and_utc().timestamp_millis())
}

fn decode(raw: i64) -> Option<NaiveDateTime> {
    if raw == NEVER {
        return None;
    }
    DateTime::from_timestamp_millis(raw).map(|t| t.naive_utc())
}

#[derive(Debug, Default)]
pub struct FireLedger {
    slots: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl FireLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, schedule_id: &str) -> Arc<AtomicI64> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(schedule_id)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(schedule_id.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(NEVER))),
        )
    }

    /// `None` until the schedule fires in this process (or is seeded).
    pub fn last_fired(&self, schedule_id: &str) -> Option<NaiveDateTime> {
        decode(self.slot(schedule_id).load(Ordering::Acquire))
    }

    /// Restore a value re-derived from persisted settings.
    pub fn seed(&self, schedule_id: &str, at: Option<NaiveDateTime>) {
        self.slot(schedule_id).store(encode(at), Ordering::Release);
    }

    /// Record a fire at `fired_at` only if the slot still holds `observed`,
    /// the value the decision was made from. Returns whether this call won.
    pub fn try_commit(
        &self,
        schedule_id: &str,
        observed: Option<NaiveDateTime>,
        fired_at: NaiveDateTime,
    ) -> bool {
        self.slot(schedule_id)
            .compare_exchange(
                encode(observed),
                encode(Some(fired_at)),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn forget(&self, schedule_id: &str) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(schedule_id);
    }
}

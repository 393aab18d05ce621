//! Medication adherence analytics
//!
//! Aggregates dose occurrences over a trailing window into:
//! - **Overall rate**: share of recorded doses marked taken
//! - **Per-item rows**: the same counts scoped to each medicine
//! - **Most missed time**: the scheduled time that is missed most often
//!
//! Every function here is total. Empty input produces a zero report.

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::occurrence::{DoseKey, DoseStatus, Occurrence, OccurrenceLog};
use crate::reminder::GracePeriod;
use crate::schedule::{DoseSchedule, TimeOfDay};

pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Adherence for a single medicine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdherence {
    pub item_id: String,
    pub name: String,
    pub taken: u32,
    pub missed: u32,
    pub skipped: u32,
    pub total: u32,
    /// 0 to 100, rounded
    pub rate_pct: u32,
}

/// Adherence over the trailing window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceReport {
    pub window_days: u32,
    pub total: u32,
    pub taken: u32,
    pub missed: u32,
    pub skipped: u32,
    /// 0 to 100, rounded
    pub overall_rate_pct: u32,
    pub per_item: Vec<ItemAdherence>,
    pub most_missed_time: Option<TimeOfDay>,
}

/// `round(100 * part / whole)` in integer arithmetic, 0 when `whole` is 0.
pub fn rate_pct(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (part as u64, whole as u64);
    ((part * 200 + whole) / (whole * 2)) as u32
}

#[derive(Debug, Clone)]
pub struct AdherenceAnalyzer {
    pub window_days: u32,
}

impl Default for AdherenceAnalyzer {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl AdherenceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window_days: u32) -> Self {
        Self { window_days }
    }

    /// Build a report from dose occurrences whose slot (date plus
    /// scheduled time) falls in `now - window_days ..= now`.
    ///
    /// # Arguments
    /// * `medicines` - Schedules to break down by, in display order
    /// * `logs` - Occurrences in iteration order; amount logs are ignored.
    ///   A later entry for the same dose slot replaces an earlier one, so
    ///   synthesized misses can be chained after the recorded log.
    /// * `now` - End of the window
    pub fn report<'a, I>(&self, medicines: &[DoseSchedule], logs: I, now: NaiveDateTime) -> AdherenceReport
    where
        I: IntoIterator<Item = &'a Occurrence>,
    {
        let since = now - Duration::days(self.window_days as i64);
        let mut latest: IndexMap<DoseKey, &Occurrence> = IndexMap::new();
        for occurrence in logs {
            let (Some(key), Some(record)) = (occurrence.key(), occurrence.dose_record()) else {
                continue;
            };
            let slot = record.slot();
            if slot >= since && slot <= now {
                latest.insert(key, occurrence);
            }
        }
        let recent: Vec<&Occurrence> = latest.into_values().collect();

        if recent.is_empty() {
            return AdherenceReport {
                window_days: self.window_days,
                ..AdherenceReport::default()
            };
        }

        let mut overall = CountBuilder::default();
        let mut missed_times: IndexMap<TimeOfDay, u32> = IndexMap::new();
        for occurrence in &recent {
            let Some(record) = occurrence.dose_record() else {
                continue;
            };
            overall.record(record.status);
            if record.status == DoseStatus::Missed {
                *missed_times.entry(record.scheduled_time).or_insert(0) += 1;
            }
        }

        let per_item = medicines
            .iter()
            .map(|medicine| {
                let mut builder = CountBuilder::default();
                recent
                    .iter()
                    .filter(|o| o.schedule_id == medicine.id)
                    .filter_map(|o| o.dose_record())
                    .for_each(|r| builder.record(r.status));
                builder.build_item(medicine)
            })
            .collect();

        AdherenceReport {
            window_days: self.window_days,
            total: overall.total,
            taken: overall.taken,
            missed: overall.missed,
            skipped: overall.skipped,
            overall_rate_pct: rate_pct(overall.taken, overall.total),
            per_item,
            most_missed_time: most_frequent(&missed_times),
        }
    }
}

/// Highest count wins; ties go to the first key inserted.
fn most_frequent(counts: &IndexMap<TimeOfDay, u32>) -> Option<TimeOfDay> {
    let mut best: Option<(TimeOfDay, u32)> = None;
    for (&time, &count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((time, count));
        }
    }
    best.map(|(time, _)| time)
}

/// Synthesize `Missed` occurrences for active slots in the window that are
/// past their grace period and have no outcome: either no record at all, or
/// only a `Pending` or `Snoozed` one. Slots before the log's retention
/// cutoff are skipped, since their records may have been pruned. Nothing is
/// written to the log; the result is meant to be chained after the recorded
/// entries so it replaces the stale ones.
pub fn implicit_misses(
    medicines: &[DoseSchedule],
    log: &OccurrenceLog,
    now: NaiveDateTime,
    window_days: u32,
    grace: GracePeriod,
) -> Vec<Occurrence> {
    let since = now - Duration::days(window_days as i64);
    let first_day = match log.retained_since(now.date()) {
        Some(cutoff) => cutoff.max(since.date()),
        None => since.date(),
    };
    let mut synthesized = Vec::new();

    for medicine in medicines {
        let mut date = first_day;
        while date <= now.date() {
            if medicine.is_active_on(date) {
                for &scheduled_time in medicine.dose_times() {
                    let slot = date.and_time(scheduled_time.to_naive_time());
                    if slot < since || !grace.is_past(date, scheduled_time, now) {
                        continue;
                    }
                    let key = DoseKey {
                        schedule_id: medicine.id.clone(),
                        date,
                        scheduled_time,
                    };
                    let unresolved = match log.find(&key).and_then(Occurrence::dose_record) {
                        None => true,
                        Some(record) => {
                            matches!(record.status, DoseStatus::Pending | DoseStatus::Snoozed)
                        }
                    };
                    if unresolved {
                        synthesized.push(Occurrence::dose(
                            medicine.id.clone(),
                            date,
                            scheduled_time,
                            DoseStatus::Missed,
                            slot,
                        ));
                    }
                }
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
    }

    synthesized.sort_by_key(|o| o.timestamp);
    synthesized
}

/// Helper struct for counting outcomes
#[derive(Default)]
struct CountBuilder {
    total: u32,
    taken: u32,
    missed: u32,
    skipped: u32,
}

impl CountBuilder {
    fn record(&mut self, status: DoseStatus) {
        self.total += 1;
        match status {
            DoseStatus::Taken => self.taken += 1,
            DoseStatus::Missed => self.missed += 1,
            DoseStatus::Skipped => self.skipped += 1,
            DoseStatus::Pending | DoseStatus::Snoozed => {}
        }
    }

    fn build_item(self, medicine: &DoseSchedule) -> ItemAdherence {
        ItemAdherence {
            item_id: medicine.id.clone(),
            name: medicine.name.clone(),
            taken: self.taken,
            missed: self.missed,
            skipped: self.skipped,
            total: self.total,
            rate_pct: rate_pct(self.taken, self.total),
        }
    }
}

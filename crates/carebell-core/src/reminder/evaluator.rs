//! Interval reminder evaluation.
//!
//! The evaluator is a pure decision function over wall-clock input. It owns
//! no timers; the caller is responsible for invoking `tick()` at least once a
//! minute and on resume, then committing the fire through the
//! [`FireLedger`](super::FireLedger).
//!
//! ## Phases
//!
//! ```text
//! Idle -> ArmedInWindow -> Fired -> Idle
//! ```
//!
//! A schedule is `Idle` outside its window (or while disabled or with the
//! goal met), `ArmedInWindow` when a reminder would fire now, and `Fired`
//! while it is cooling down after the last reminder.
//!
//! ## Usage
//!
//! ```ignore
//! let evaluator = ReminderEvaluator::new();
//! match evaluator.tick(&water, now, ledger.last_fired("water"), today_total) {
//!     FireDecision::Fire(ctx) => { /* commit, then notify */ }
//!     FireDecision::DoNotFire(_) => {}
//! }
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schedule::{IntervalSchedule, TimeOfDay};

pub const DEFAULT_GLASS_ML: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPhase {
    Idle,
    ArmedInWindow,
    Fired,
}

/// Why a tick did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Hold {
    Disabled,
    OutsideWindow,
    GoalMet,
    Cooldown { minutes_left: i64 },
    /// The decision was valid but another tick committed first.
    Superseded,
}

/// Content for a fired reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderContext {
    pub schedule_id: String,
    pub today_total_ml: u32,
    pub goal_ml: u32,
    pub remaining_ml: u32,
    pub glasses_remaining: u32,
}

impl ReminderContext {
    pub fn title(&self) -> &'static str {
        "Time to drink water"
    }

    pub fn body(&self) -> String {
        let unit = if self.glasses_remaining == 1 { "glass" } else { "glasses" };
        format!(
            "Stay hydrated! {} more {unit} to reach your goal.",
            self.glasses_remaining
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FireDecision {
    DoNotFire(Hold),
    Fire(ReminderContext),
}

impl FireDecision {
    pub fn should_fire(&self) -> bool {
        matches!(self, FireDecision::Fire(_))
    }
}

#[derive(Debug, Clone)]
pub struct ReminderEvaluator {
    /// Serving size used to express the remaining amount.
    pub glass_ml: u32,
}

impl Default for ReminderEvaluator {
    fn default() -> Self {
        Self {
            glass_ml: DEFAULT_GLASS_ML,
        }
    }
}

impl ReminderEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_glass_ml(glass_ml: u32) -> Self {
        Self {
            glass_ml: glass_ml.max(1),
        }
    }

    /// Decide whether `schedule` should fire at `now`.
    ///
    /// `last_fired` of `None` means never fired (fresh process), so the
    /// first tick inside the window fires immediately. Identical inputs
    /// always produce the identical decision.
    pub fn tick(
        &self,
        schedule: &IntervalSchedule,
        now: NaiveDateTime,
        last_fired: Option<NaiveDateTime>,
        today_total: u32,
    ) -> FireDecision {
        if !schedule.enabled {
            return FireDecision::DoNotFire(Hold::Disabled);
        }
        if !schedule.window.contains(TimeOfDay::from_naive_time(now.time())) {
            return FireDecision::DoNotFire(Hold::OutsideWindow);
        }

        let remaining = schedule.remaining_to_goal(today_total);
        if remaining == 0 {
            return FireDecision::DoNotFire(Hold::GoalMet);
        }

        if let Some(last) = last_fired {
            let elapsed = (now - last).num_minutes();
            let interval = schedule.interval_minutes as i64;
            if elapsed < interval {
                return FireDecision::DoNotFire(Hold::Cooldown {
                    minutes_left: interval - elapsed,
                });
            }
        }

        FireDecision::Fire(ReminderContext {
            schedule_id: schedule.id.clone(),
            today_total_ml: today_total,
            goal_ml: schedule.goal_amount,
            remaining_ml: remaining,
            glasses_remaining: remaining.div_ceil(self.glass_ml.max(1)),
        })
    }

    pub fn phase(
        &self,
        schedule: &IntervalSchedule,
        now: NaiveDateTime,
        last_fired: Option<NaiveDateTime>,
        today_total: u32,
    ) -> IntervalPhase {
        match self.tick(schedule, now, last_fired, today_total) {
            FireDecision::Fire(_) => IntervalPhase::ArmedInWindow,
            FireDecision::DoNotFire(Hold::Cooldown { .. }) => IntervalPhase::Fired,
            FireDecision::DoNotFire(_) => IntervalPhase::Idle,
        }
    }
}

//! Reminder decisions: interval evaluation, the last-fired ledger, and
//! dose slot due-ness.

mod dose;
mod evaluator;
mod ledger;

pub use dose::{dose_state, slots_for_day, DoseSlot, DoseState, GracePeriod};
pub use evaluator::{
    FireDecision, Hold, IntervalPhase, ReminderContext, ReminderEvaluator, DEFAULT_GLASS_ML,
};
pub use ledger::FireLedger;

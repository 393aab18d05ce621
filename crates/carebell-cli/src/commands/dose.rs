use carebell_core::{DoseStatus, TimeOfDay};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Subcommand};

/// One dose slot: medicine id, scheduled time and day.
#[derive(Args)]
pub struct SlotArgs {
    /// Medicine id
    id: String,
    /// Scheduled dose time (HH:MM)
    time: TimeOfDay,
    /// Day of the dose (YYYY-MM-DD, default today)
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum DoseAction {
    /// Mark a dose taken
    Take(SlotArgs),
    /// Mark a dose skipped
    Skip(SlotArgs),
    /// Mark a dose missed
    Miss(SlotArgs),
    /// Snooze a dose for the configured number of minutes
    Snooze(SlotArgs),
    /// List doses due now
    Due {
        /// Include every dose of today, whatever its state
        #[arg(long)]
        all: bool,
    },
}

pub fn run(action: DoseAction, now: NaiveDateTime) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;

    let (slot, status) = match action {
        DoseAction::Take(slot) => (slot, DoseStatus::Taken),
        DoseAction::Skip(slot) => (slot, DoseStatus::Skipped),
        DoseAction::Miss(slot) => (slot, DoseStatus::Missed),
        DoseAction::Snooze(slot) => (slot, DoseStatus::Snoozed),
        DoseAction::Due { all } => {
            let slots = if all {
                engine.doses_today(now)
            } else {
                engine.due_doses(now)
            };
            return super::print_json(&slots);
        }
    };

    let date = slot.date.unwrap_or(now.date());
    let occurrence = engine.record_dose(&slot.id, date, slot.time, status, now)?;
    super::print_json(&occurrence)
}

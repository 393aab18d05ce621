use carebell_core::{DoseSchedule, ReminderEngine, SaveOutcome, TimeOfDay};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum MedAction {
    /// Add a medicine
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Dose times, comma-separated (e.g. 08:00,20:00); at most four
        #[arg(long, value_delimiter = ',', required = true)]
        times: Vec<TimeOfDay>,
        /// Identifier; derived from the name when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        dosage: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        /// Flag missed doses as critical
        #[arg(long)]
        critical: bool,
        /// Pill count for refill tracking
        #[arg(long)]
        quantity: Option<u32>,
        /// First day of the course (YYYY-MM-DD, default today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Last day of the course (YYYY-MM-DD); ongoing when omitted
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Save despite conflicts and name warnings
        #[arg(long)]
        force: bool,
    },
    /// Change an existing medicine
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_delimiter = ',')]
        times: Option<Vec<TimeOfDay>>,
        #[arg(long)]
        dosage: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        critical: Option<bool>,
        /// Reset refill tracking to this pill count
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Make the medicine ongoing again
        #[arg(long, conflicts_with = "end_date")]
        clear_end_date: bool,
        /// Save despite conflicts and name warnings
        #[arg(long)]
        force: bool,
    },
    /// Remove a medicine (its history is kept)
    Remove { id: String },
    /// List medicines as JSON
    List,
    /// Check candidate dose times against existing medicines
    Conflicts {
        #[arg(long, value_delimiter = ',', required = true)]
        times: Vec<TimeOfDay>,
        /// Medicine being edited, skipped in the check
        #[arg(long)]
        exclude: Option<String>,
    },
}

/// Lowercase name with runs of other characters collapsed to '-', made
/// unique against existing ids.
fn derive_id(engine: &ReminderEngine, name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let base = match slug.trim_end_matches('-') {
        "" => "med".to_string(),
        s => s.to_string(),
    };

    let taken: Vec<String> = engine.medicines().into_iter().map(|m| m.id).collect();
    let water = engine.water_settings().id;
    let free = |id: &str| id != water && !taken.iter().any(|t| t == id);
    if free(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn finish(outcome: SaveOutcome) -> Result<(), Box<dyn std::error::Error>> {
    super::print_json(&outcome)?;
    if outcome.needs_confirmation() {
        return Err(format!(
            "not saved: {} conflict(s), {} name warning(s); pass --force to save anyway",
            outcome.conflicts.len(),
            outcome.name_warnings.len()
        )
        .into());
    }
    Ok(())
}

pub fn run(action: MedAction, now: NaiveDateTime) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;

    match action {
        MedAction::Add {
            name,
            times,
            id,
            dosage,
            instructions,
            critical,
            quantity,
            start_date,
            end_date,
            force,
        } => {
            let id = id.unwrap_or_else(|| derive_id(&engine, &name));
            let mut medicine =
                DoseSchedule::new(id, name, times, start_date.unwrap_or(now.date()))?;
            if let Some(dosage) = dosage {
                medicine = medicine.with_dosage(dosage);
            }
            if let Some(instructions) = instructions {
                medicine = medicine.with_instructions(instructions);
            }
            if critical {
                medicine = medicine.critical();
            }
            if let Some(quantity) = quantity {
                medicine = medicine.with_refill(quantity);
            }
            if let Some(end_date) = end_date {
                medicine = medicine.with_end_date(end_date);
            }
            finish(engine.add_medicine(medicine, force)?)?;
        }
        MedAction::Update {
            id,
            name,
            times,
            dosage,
            instructions,
            critical,
            quantity,
            end_date,
            clear_end_date,
            force,
        } => {
            let mut medicine = engine
                .medicine(&id)
                .ok_or_else(|| format!("unknown medicine: {id}"))?;
            if let Some(name) = name {
                medicine.name = name;
            }
            if let Some(times) = times {
                medicine.set_dose_times(times)?;
            }
            if let Some(dosage) = dosage {
                medicine.dosage = dosage;
            }
            if let Some(instructions) = instructions {
                medicine.instructions = instructions;
            }
            if let Some(critical) = critical {
                medicine.critical = critical;
            }
            if let Some(quantity) = quantity {
                medicine = medicine.with_refill(quantity);
            }
            if let Some(end_date) = end_date {
                medicine = medicine.with_end_date(end_date);
            }
            if clear_end_date {
                medicine = medicine.clear_end_date();
            }
            finish(engine.update_medicine(medicine, force)?)?;
        }
        MedAction::Remove { id } => {
            let removed = engine.remove_medicine(&id)?;
            println!("removed {}", removed.id);
        }
        MedAction::List => {
            super::print_json(&engine.medicines())?;
        }
        MedAction::Conflicts { times, exclude } => {
            super::print_json(&engine.check_conflicts(&times, exclude.as_deref()))?;
        }
    }
    Ok(())
}

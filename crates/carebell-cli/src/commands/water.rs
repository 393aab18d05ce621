use carebell_core::{parse_amount, IntervalSchedule, TimeOfDay, Window};
use chrono::NaiveDateTime;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum WaterAction {
    /// Log water: millilitres, or sip (100), glass (250), bottle (500)
    Log {
        /// Amount to log
        amount: String,
    },
    /// Print today's progress as JSON
    Status,
    /// Show reminder settings, or change them when any option is given
    Settings {
        /// Daily goal in millilitres
        #[arg(long)]
        goal: Option<u32>,
        /// Minutes between reminders
        #[arg(long)]
        interval: Option<u32>,
        /// Window start (HH:MM)
        #[arg(long)]
        start: Option<TimeOfDay>,
        /// Window end (HH:MM)
        #[arg(long)]
        end: Option<TimeOfDay>,
        /// Turn reminders on
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        /// Turn reminders off
        #[arg(long)]
        disable: bool,
    },
}

pub fn run(action: WaterAction, now: NaiveDateTime) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;

    match action {
        WaterAction::Log { amount } => {
            let ml = parse_amount(&amount)?;
            let summary = engine.log_water(ml, now)?;
            super::print_json(&summary)?;
        }
        WaterAction::Status => {
            super::print_json(&engine.hydration(now))?;
        }
        WaterAction::Settings {
            goal,
            interval,
            start,
            end,
            enable,
            disable,
        } => {
            let current = engine.water_settings();
            let changed = goal.is_some()
                || interval.is_some()
                || start.is_some()
                || end.is_some()
                || enable
                || disable;
            if !changed {
                return super::print_json(&current);
            }

            let window = Window::new(
                start.unwrap_or(current.window.start),
                end.unwrap_or(current.window.end),
            )?;
            let settings = IntervalSchedule {
                window,
                interval_minutes: interval.unwrap_or(current.interval_minutes),
                goal_amount: goal.unwrap_or(current.goal_amount),
                enabled: if enable {
                    true
                } else if disable {
                    false
                } else {
                    current.enabled
                },
                ..current
            };
            engine.update_water_settings(settings.clone())?;
            super::print_json(&settings)?;
        }
    }
    Ok(())
}

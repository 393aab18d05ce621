use chrono::NaiveDateTime;

/// Print the adherence report over the configured or given window.
pub fn run(now: NaiveDateTime, days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;
    let report = match days {
        Some(days) => engine.report_window(now, days),
        None => engine.report(now),
    };
    super::print_json(&report)
}

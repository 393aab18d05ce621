use chrono::NaiveDateTime;

/// Evaluate reminders once and print every decision as JSON.
pub fn run(now: NaiveDateTime) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;
    let decisions = engine.tick(now);
    for decision in &decisions {
        if let carebell_core::FireDecision::Fire(context) = decision {
            eprintln!("{}: {}", context.title(), context.body());
        }
    }
    super::print_json(&decisions)
}

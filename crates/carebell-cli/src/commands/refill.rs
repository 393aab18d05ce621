/// Print refill projections for medicines that track a quantity.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine()?;
    super::print_json(&engine.refill_projections())
}

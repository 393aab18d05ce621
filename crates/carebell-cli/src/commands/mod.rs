pub mod config;
pub mod dose;
pub mod med;
pub mod refill;
pub mod report;
pub mod tick;
pub mod water;

use carebell_core::{BlobStore, Config, MemoryBlobStore, ReminderEngine, SqliteBlobStore, TracingNotifier};
use chrono::NaiveDateTime;

/// Open the engine over `<data dir>/carebell.db` with the on-disk config.
///
/// A broken config falls back to defaults. An unusable store falls back to
/// memory, so the command still runs but nothing is kept.
pub fn open_engine() -> Result<ReminderEngine, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store: Box<dyn BlobStore> = match SqliteBlobStore::open() {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "cannot open store, changes will not be saved");
            Box::new(MemoryBlobStore::new())
        }
    };
    tracing::debug!(
        min_gap_minutes = config.conflicts.min_gap_minutes,
        grace = ?config.doses.grace,
        "opening engine"
    );
    Ok(ReminderEngine::open(
        store,
        Box::new(TracingNotifier),
        config,
    ))
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]` or the same with a space separator.
pub fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("invalid timestamp '{s}', expected YYYY-MM-DDTHH:MM"))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

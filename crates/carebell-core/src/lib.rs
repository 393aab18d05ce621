//! # Carebell Core Library
//!
//! This library provides the core logic for carebell, a recurring reminder
//! and adherence engine for drinking water and taking medicines. All
//! operations are available through the standalone CLI binary, which is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Schedules**: interval reminders inside a daily window and fixed-time
//!   dose schedules, with conflict checks across medicines
//! - **Reminders**: a pure fire decision plus an atomic last-fired ledger;
//!   the caller invokes `tick()` at least once a minute
//! - **Occurrences**: an append-only log of water amounts and dose outcomes
//!   with retention pruning
//! - **Stats**: trailing-window adherence and refill projection
//! - **Storage**: versioned JSON blobs in SQLite and TOML configuration
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: facade tying everything together
//! - [`ScheduleRegistry`]: schedule validation and conflict detection
//! - [`ReminderEvaluator`]: interval fire decisions
//! - [`AdherenceAnalyzer`]: compliance reports
//! - [`Config`]: application configuration management

pub mod engine;
pub mod error;
pub mod events;
pub mod hydration;
pub mod notify;
pub mod occurrence;
pub mod reminder;
pub mod schedule;
pub mod stats;
pub mod storage;

pub use engine::{Evaluation, PendingFire, ReminderEngine, SaveOutcome};
pub use error::{ConfigError, CoreError, NotifyError, ParseError, PersistenceError, ValidationError};
pub use events::Event;
pub use hydration::{parse_amount, HydrationSummary, WaterPreset};
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use occurrence::{DoseKey, DoseRecord, DoseStatus, Occurrence, OccurrenceKind, OccurrenceLog};
pub use reminder::{
    DoseSlot, DoseState, FireDecision, FireLedger, GracePeriod, Hold, ReminderContext,
    ReminderEvaluator,
};
pub use schedule::{
    ConflictReport, DoseSchedule, IntervalSchedule, NameWarning, RecurringSchedule, RefillTracking,
    ScheduleRegistry, TimeOfDay, Window,
};
pub use stats::{AdherenceAnalyzer, AdherenceReport, ItemAdherence, RefillProjection, RefillStatus};
pub use storage::{BlobStore, Config, MemoryBlobStore, SqliteBlobStore};

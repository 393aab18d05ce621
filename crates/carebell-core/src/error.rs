//! Core error types for carebell-core.
//!
//! This module defines the error hierarchy using thiserror. Only parse and
//! validation failures are hard rejections; persistence and notification
//! failures are recovered locally by the engine and surface here mainly so
//! stores and notifiers have something typed to return.

use std::path::PathBuf;
use thiserror::Error;

use crate::schedule::TimeOfDay;

/// Core error type for carebell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed time-of-day input
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Schedule validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Blob store errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notification dispatch errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// A time string that is not a well-formed "HH:MM".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected HH:MM, got '{0}'")]
    Format(String),

    #[error("hour out of range in '{0}' (0-23)")]
    HourOutOfRange(String),

    #[error("minute out of range in '{0}' (0-59)")]
    MinuteOutOfRange(String),

    #[error("minute of day {0} out of range (0-1439)")]
    MinuteOfDay(u32),

    #[error("invalid amount '{0}', expected millilitres or sip, glass, bottle")]
    Amount(String),
}

/// Hard rejections when adding or updating a schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("dose time {time} appears more than once in schedule '{schedule_id}'")]
    DuplicateDoseTime {
        schedule_id: String,
        time: TimeOfDay,
    },

    #[error(
        "dose times {first} and {second} in schedule '{schedule_id}' are {gap} min apart (minimum {min_gap})"
    )]
    DoseTimesTooClose {
        schedule_id: String,
        first: TimeOfDay,
        second: TimeOfDay,
        gap: u32,
        min_gap: u32,
    },

    #[error("schedule '{schedule_id}' has {count} dose times (expected 1-4)")]
    DoseCount { schedule_id: String, count: usize },

    #[error("reminder interval must be greater than zero")]
    ZeroInterval,

    #[error("window start {start} is after end {end}")]
    InvertedWindow { start: TimeOfDay, end: TimeOfDay },

    #[error("end date {end} is before start date {start}")]
    InvertedDates {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("schedule name must not be empty")]
    EmptyName,

    #[error("schedule '{0}' already exists")]
    DuplicateId(String),

    #[error("schedule '{0}' not found")]
    UnknownSchedule(String),

    #[error("schedule '{0}' has the wrong kind for this operation")]
    WrongKind(String),

    #[error("'{time}' is not a dose time of schedule '{schedule_id}'")]
    UnknownDoseTime {
        schedule_id: String,
        time: TimeOfDay,
    },

    #[error("logged amount must be greater than zero")]
    ZeroAmount,
}

/// Blob store failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to open store at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    #[error("Failed to load '{key}': {message}")]
    LoadFailed { key: String, message: String },

    #[error("Failed to save '{key}': {message}")]
    SaveFailed { key: String, message: String },

    #[error("Unsupported version {found} for '{key}' (expected {expected})")]
    VersionMismatch {
        key: String,
        found: u32,
        expected: u32,
    },

    #[error("Malformed blob: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Notification dispatch failures.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

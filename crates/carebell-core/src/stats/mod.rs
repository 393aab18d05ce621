//! Statistics module for carebell
//!
//! This module provides analytics over the occurrence log: medication
//! adherence over a trailing window and refill projections for schedules
//! that track a remaining quantity.

mod adherence;
mod refill;

pub use adherence::{
    implicit_misses, rate_pct, AdherenceAnalyzer, AdherenceReport, ItemAdherence,
    DEFAULT_WINDOW_DAYS,
};

pub use refill::{project_refill, RefillProjection, RefillStatus, DEFAULT_WARNING_DAYS};

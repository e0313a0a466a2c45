//! Core types, record normalization, and collaborator traits for meterbill
//!
//! This crate provides the foundational types, error handling, and the
//! sentinel-aware normalizer used by all other meterbill crates.

pub mod breakdown;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod types;

// Re-export commonly used types
pub use breakdown::{ConfigOrigin, CostBreakdown, ThresholdReport, ThresholdState};
pub use error::{MeterbillError, Result};
pub use types::{
    ConsumptionTotals, CostMode, DailyDate, MeterRecord, RawMeterRecord, UtilityStream,
};

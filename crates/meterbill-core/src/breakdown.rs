//! Output types of the calculation engine
//!
//! Pure data structures consumed by the presentation layer. A breakdown is
//! built once per computation and never patched afterwards.

use crate::types::{DailyDate, UtilityStream};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Where the pricing or limits of a computation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    /// The tariff delivered by the tariff source
    #[display("configured")]
    Configured,
    /// The documented default, because no valid tariff was available
    #[display("default")]
    Default,
}

/// One volumetric cost line (a block or a band)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    /// Display label, e.g. `block 2` or `lwbp`
    pub label: String,
    /// Billed quantity
    pub quantity: f64,
    /// Effective unit rate, multipliers included
    pub unit_rate: f64,
    /// Line amount
    pub amount: f64,
}

/// A percentage surcharge applied on top of a basis amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeLine {
    /// Display label, e.g. `ct` or `ppj`
    pub label: String,
    /// Amount the percentage is applied to
    pub basis: f64,
    /// Percentage, 10.0 meaning ten percent
    pub percent: f64,
    /// Surcharge amount
    pub amount: f64,
}

/// Cost breakdown for one stream and one record set
///
/// Amounts are whole cents. `grand_total` is the sum of every displayed line
/// amount plus `fixed`, added in display order, so the table always adds up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Stream the breakdown belongs to
    pub stream: UtilityStream,
    /// Origin of the tariff used
    pub origin: ConfigOrigin,
    /// Total consumed quantity across all bands
    pub total_quantity: f64,
    /// Volumetric lines
    pub lines: SmallVec<[CostLine; 5]>,
    /// Volumetric lines plus surcharges applied before the levy
    pub subtotal: f64,
    /// Percentage surcharge lines
    pub surcharges: SmallVec<[SurchargeLine; 2]>,
    /// Fixed add-on cost
    pub fixed: f64,
    /// Grand total
    pub grand_total: f64,
}

impl CostBreakdown {
    /// Sum of the volumetric lines
    pub fn base(&self) -> f64 {
        self.lines.iter().fold(0.0, |acc, line| acc + line.amount)
    }

    /// Recompute the grand total from the displayed lines
    pub fn displayed_total(&self) -> f64 {
        let lines = self.base();
        let surcharges = self
            .surcharges
            .iter()
            .fold(lines, |acc, line| acc + line.amount);
        surcharges + self.fixed
    }

    /// Whether the grand total equals the displayed lines, bit for bit
    pub fn reconciles(&self) -> bool {
        self.displayed_total() == self.grand_total
    }
}

/// Classification of a reading against its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdState {
    /// Within limits
    #[display("normal")]
    Normal,
    /// Over temperature, or efficiency below setpoint
    #[display("warning")]
    Warning,
    /// No reading to evaluate
    #[display("unknown")]
    Unknown,
    /// Missing or physically invalid readings on an efficiency check
    #[display("needs maintenance")]
    NeedsMaintenance,
}

/// Which record a threshold evaluation used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingSource {
    /// A record saved locally and not yet confirmed by a refresh
    #[display("pending")]
    Pending,
    /// The latest fetched snapshot
    #[display("snapshot")]
    Snapshot,
    /// No evaluable record
    #[display("none")]
    NoRecord,
}

/// Result of a threshold evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    /// Stream evaluated
    pub stream: UtilityStream,
    /// Origin of the limits used
    pub origin: ConfigOrigin,
    /// Resulting state
    pub state: ThresholdState,
    /// Date of the record evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DailyDate>,
    /// Where that record came from
    pub source: ReadingSource,
    /// The reading (absolute mode) or the delta (delta mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// The limit or setpoint compared against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

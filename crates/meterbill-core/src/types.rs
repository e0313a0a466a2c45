//! Core domain types for meterbill
//!
//! This module contains the types shared by every meterbill crate: the
//! utility streams the hotel records, raw and normalized meter records, and
//! the consumption totals handed to the calculators.

use crate::normalize::normalize;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Calendar date of a reading
///
/// Readings have day granularity. Dates are unique per stream upstream but
/// need not be contiguous.
///
/// # Examples
/// ```
/// use meterbill_core::types::DailyDate;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let daily = DailyDate::new(date);
///
/// assert_eq!(daily.format("%Y-%m-%d"), "2024-01-15");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailyDate(NaiveDate);

impl DailyDate {
    /// Create a new DailyDate
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Get the inner NaiveDate
    pub fn inner(&self) -> &NaiveDate {
        &self.0
    }

    /// Parse the date formats the upstream API emits
    ///
    /// Accepts `YYYY-MM-DD`, and RFC 3339 timestamps (the date part is kept).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self(date));
        }
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.date_naive()))
    }

    /// Format with a chrono format string
    pub fn format(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }
}

impl fmt::Display for DailyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Pricing family a stream is billed or evaluated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TariffFamily {
    /// Progressive block-rate pricing
    Block,
    /// Flat unit rate(s) with percentage surcharges
    Flat,
    /// Price times quantity
    Unit,
    /// Limit classification, no cost
    Threshold,
}

impl fmt::Display for TariffFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Flat => write!(f, "flat"),
            Self::Unit => write!(f, "unit"),
            Self::Threshold => write!(f, "threshold"),
        }
    }
}

/// One of the utility streams recorded by the hotel engineering team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtilityStream {
    /// Municipal water, three stepped blocks
    Pdam,
    /// Deep-well groundwater, five progressive blocks
    Abt,
    /// Medium-voltage electricity, off-peak and peak bands
    KwhTm,
    /// Low-voltage electricity, single band with CT surcharge
    KwhTr,
    /// LPG / piped gas
    Gas,
    /// Generator fuel
    Fuel,
    /// Trucked bulk water
    BulkWater,
    /// Chiller room temperature
    Chiller,
    /// Freezer room temperature
    Freezer,
    /// Heat pump inlet/outlet temperatures
    HeatPump,
}

impl UtilityStream {
    /// Every stream, in display order
    pub const ALL: [UtilityStream; 10] = [
        Self::Pdam,
        Self::Abt,
        Self::KwhTm,
        Self::KwhTr,
        Self::Gas,
        Self::Fuel,
        Self::BulkWater,
        Self::Chiller,
        Self::Freezer,
        Self::HeatPump,
    ];

    /// Stable identifier, also used as the tariff file key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdam => "pdam",
            Self::Abt => "abt",
            Self::KwhTm => "kwh-tm",
            Self::KwhTr => "kwh-tr",
            Self::Gas => "gas",
            Self::Fuel => "fuel",
            Self::BulkWater => "bulk-water",
            Self::Chiller => "chiller",
            Self::Freezer => "freezer",
            Self::HeatPump => "heat-pump",
        }
    }

    /// The pricing family this stream expects
    pub fn family(&self) -> TariffFamily {
        match self {
            Self::Pdam | Self::Abt => TariffFamily::Block,
            Self::KwhTm | Self::KwhTr => TariffFamily::Flat,
            Self::Gas | Self::Fuel | Self::BulkWater => TariffFamily::Unit,
            Self::Chiller | Self::Freezer | Self::HeatPump => TariffFamily::Threshold,
        }
    }

    /// Fields summed into consumption bands, in band order
    ///
    /// Threshold streams have no consumption bands.
    pub fn quantity_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Pdam | Self::Abt | Self::KwhTr | Self::Gas => &["usage"],
            Self::KwhTm => &["lwbp", "wbp"],
            Self::Fuel => &["liters"],
            Self::BulkWater => &["volume"],
            Self::Chiller | Self::Freezer | Self::HeatPump => &[],
        }
    }

    /// Field carrying an upstream-computed per-record cost, if any
    pub fn cost_field(&self) -> Option<&'static str> {
        match self.family() {
            TariffFamily::Unit => Some("cost"),
            _ => None,
        }
    }

    /// Reading fields used by threshold evaluation
    ///
    /// One field for absolute limits, `[inlet, outlet]` for delta-T.
    pub fn reading_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Chiller | Self::Freezer => &["temperature"],
            Self::HeatPump => &["inlet", "outlet"],
            _ => &[],
        }
    }
}

impl fmt::Display for UtilityStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UtilityStream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|stream| stream.as_str() == wanted)
            .ok_or_else(|| format!("Invalid utility stream: {s}"))
    }
}

/// Cost calculation mode for unit-priced streams
///
/// Some screens receive a per-record cost from the upstream system. The mode
/// decides whether that cost is trusted, ignored, or required.
///
/// # Examples
/// ```
/// use meterbill_core::types::CostMode;
/// use std::str::FromStr;
///
/// let mode = CostMode::from_str("auto").unwrap();
/// assert_eq!(mode, CostMode::Auto);
/// assert_eq!(CostMode::Calculate.to_string(), "calculate");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMode {
    /// Use the provided per-record cost when present, otherwise price it
    #[default]
    Auto,
    /// Always price the total quantity
    Calculate,
    /// Only sum provided costs
    Display,
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Calculate => write!(f, "calculate"),
            Self::Display => write!(f, "display"),
        }
    }
}

impl std::str::FromStr for CostMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "calculate" => Ok(Self::Calculate),
            "display" => Ok(Self::Display),
            _ => Err(format!("Invalid cost mode: {s}")),
        }
    }
}

/// A raw field value as delivered by the API
///
/// Most fields arrive as strings; some endpoints send bare numbers. Anything
/// else (objects, booleans) is carried along and normalizes to absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Other(serde_json::Value),
}

impl RawValue {
    /// Apply the sentinel rules and parse
    ///
    /// Numbers go through their textual form so `0` and `-999` are treated
    /// the same way as `"0"` and `"-999"`.
    pub fn normalize(&self) -> Option<f64> {
        match self {
            Self::Text(text) => normalize(text),
            Self::Number(n) => normalize(&n.to_string()),
            Self::Other(_) => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Raw record as deserialized from the record source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeterRecord {
    /// Date of the reading, as text
    pub date: String,
    /// Free-text attribution
    #[serde(rename = "recordedBy", default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
    /// All other keys of the upstream object
    #[serde(flatten)]
    pub fields: BTreeMap<String, RawValue>,
}

impl RawMeterRecord {
    /// Create a raw record with no fields
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            recorded_by: None,
            fields: BTreeMap::new(),
        }
    }

    /// Add a raw field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One normalized reading for one day
///
/// Records are immutable snapshots: a new fetch replaces the whole set.
///
/// # Examples
/// ```
/// use meterbill_core::types::{MeterRecord, RawMeterRecord};
///
/// let raw = RawMeterRecord::new("2024-03-01")
///     .with_field("usage", "12,5")
///     .with_field("cost", "-999");
/// let record = MeterRecord::from_raw(raw).unwrap();
///
/// assert_eq!(record.value("usage"), Some(12.5));
/// assert_eq!(record.value("cost"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    /// Date of the reading
    pub date: DailyDate,
    /// Normalized values keyed by field name
    pub values: BTreeMap<String, Option<f64>>,
    /// Free-text attribution, not used in calculation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
}

impl MeterRecord {
    /// Create an empty record for a date
    pub fn new(date: DailyDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
            recorded_by: None,
        }
    }

    /// Set a normalized value
    pub fn with_value(mut self, field: impl Into<String>, value: Option<f64>) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    /// Present value of a field, if recorded
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    /// Normalize a raw record
    ///
    /// Returns `None` when the date does not parse; the caller drops the
    /// record rather than failing the whole set.
    pub fn from_raw(raw: RawMeterRecord) -> Option<Self> {
        let Some(date) = DailyDate::parse(&raw.date) else {
            debug!("Dropping record with unparseable date '{}'", raw.date);
            return None;
        };

        let values = raw
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.normalize()))
            .collect();

        Some(Self {
            date,
            values,
            recorded_by: raw.recorded_by,
        })
    }
}

/// Total quantity of one consumption band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTotal {
    /// Band name, the source field name (`usage`, `lwbp`, ...)
    pub band: String,
    /// Summed non-negative quantity
    pub quantity: f64,
}

/// Upstream-provided costs found while aggregating
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidedCost {
    /// Sum of provided per-record costs
    pub amount: f64,
    /// Quantity of the records that carried a provided cost
    pub covered_quantity: f64,
    /// Number of records that carried a provided cost
    pub records: usize,
}

/// Aggregated consumption of one record set
///
/// # Examples
/// ```
/// use meterbill_core::types::ConsumptionTotals;
///
/// let totals = ConsumptionTotals::single("usage", 120.0);
/// assert_eq!(totals.primary(), 120.0);
/// assert_eq!(totals.secondary(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionTotals {
    /// Per-band totals, in the stream's band order
    pub bands: SmallVec<[BandTotal; 2]>,
    /// Provided costs, for streams that carry them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provided_cost: Option<ProvidedCost>,
    /// Number of records that went into the totals
    pub record_count: usize,
}

impl ConsumptionTotals {
    /// Totals with a single band
    pub fn single(band: impl Into<String>, quantity: f64) -> Self {
        let mut totals = Self::default();
        totals.push_band(band, quantity);
        totals
    }

    /// Totals with two bands
    pub fn dual(
        first: impl Into<String>,
        first_quantity: f64,
        second: impl Into<String>,
        second_quantity: f64,
    ) -> Self {
        let mut totals = Self::single(first, first_quantity);
        totals.push_band(second, second_quantity);
        totals
    }

    /// Append a band
    pub fn push_band(&mut self, band: impl Into<String>, quantity: f64) {
        self.bands.push(BandTotal {
            band: band.into(),
            quantity,
        });
    }

    /// Quantity of the first band, zero when there is none
    pub fn primary(&self) -> f64 {
        self.bands.first().map_or(0.0, |b| b.quantity)
    }

    /// Quantity of the second band, if the stream has one
    pub fn secondary(&self) -> Option<f64> {
        self.bands.get(1).map(|b| b.quantity)
    }

    /// Quantity of a named band
    pub fn get(&self, band: &str) -> Option<f64> {
        self.bands
            .iter()
            .find(|b| b.band == band)
            .map(|b| b.quantity)
    }

    /// Sum over all bands
    pub fn total(&self) -> f64 {
        self.bands.iter().map(|b| b.quantity).sum()
    }
}

//! Tariff configuration
//!
//! A tariff is one of four tagged variants, one per pricing family. Every
//! config is validated before use; a config that fails validation, or that
//! belongs to the wrong family for the stream, is replaced by the stream's
//! default so the engine always has something to compute with.
//!
//! # Examples
//!
//! ```
//! use meterbill_pricing::tariff::TariffConfig;
//!
//! let json = r#"{"kind":"block","boundaries":[50,100,150,200],"rates":[1000,1500,2000,2500,3000]}"#;
//! let tariff: TariffConfig = serde_json::from_str(json).unwrap();
//! assert!(tariff.validate().is_ok());
//! ```

use crate::defaults::default_tariff;
use meterbill_core::breakdown::ConfigOrigin;
use meterbill_core::error::{MeterbillError, Result};
use meterbill_core::types::{TariffFamily, UtilityStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

fn hundred_percent() -> f64 {
    100.0
}

/// How block quantities are split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockScheme {
    /// Clamp formula over any number of blocks
    #[default]
    Progressive,
    /// Three blocks split by explicit branches on the first two boundaries
    Stepped,
}

/// Progressive block-rate tariff
///
/// With `n` rates, the first `n - 1` boundaries split the blocks. An `n`-th
/// boundary is accepted for display only: the last block is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Split scheme
    #[serde(default)]
    pub scheme: BlockScheme,
    /// Cumulative block boundaries, strictly increasing
    pub boundaries: Vec<f64>,
    /// Unit rate per block; the last rate covers the unbounded overflow
    pub rates: Vec<f64>,
    /// Percentage multiplier applied to every block
    #[serde(default = "hundred_percent")]
    pub pct: f64,
    /// Fixed add-on cost
    #[serde(default)]
    pub fixed: f64,
}

/// Flat-rate tariff with optional second band and surcharges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatConfig {
    /// Rate of the first band
    pub rate: f64,
    /// Rate of the second band, for dual-band meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_rate: Option<f64>,
    /// CT surcharge percentage applied to the base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<f64>,
    /// Levy percentage applied to the subtotal
    #[serde(default)]
    pub ppj: f64,
    /// Fixed add-on cost
    #[serde(default)]
    pub fixed: f64,
}

/// Single unit price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Price per unit of quantity
    pub price: f64,
}

/// Direction of an absolute limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// Warn when the reading is at or above the limit
    #[default]
    AtOrAbove,
    /// Warn when the reading is at or below the limit
    AtOrBelow,
}

/// Limits for threshold classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Absolute limit on a single reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum outlet minus inlet difference for a healthy unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_setpoint: Option<f64>,
    /// Direction of the absolute limit
    #[serde(default)]
    pub comparison: Comparison,
}

/// Tariff configuration, tagged by pricing family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TariffConfig {
    Block(BlockConfig),
    Flat(FlatConfig),
    Unit(UnitConfig),
    Threshold(ThresholdConfig),
}

fn check_amount(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MeterbillError::InvalidTariff(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(MeterbillError::InvalidTariff(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}

impl BlockConfig {
    /// Number of blocks (equal to the number of rates)
    pub fn block_count(&self) -> usize {
        self.rates.len()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.rates.len();
        if n < 2 {
            return Err(MeterbillError::InvalidTariff(format!(
                "block tariff needs at least two rates, got {n}"
            )));
        }
        if self.boundaries.len() != n - 1 && self.boundaries.len() != n {
            return Err(MeterbillError::InvalidTariff(format!(
                "{} rates need {} or {} boundaries, got {}",
                n,
                n - 1,
                n,
                self.boundaries.len()
            )));
        }
        if self.scheme == BlockScheme::Stepped && n != 3 {
            return Err(MeterbillError::InvalidTariff(format!(
                "stepped scheme has exactly three blocks, got {n}"
            )));
        }
        for (i, boundary) in self.boundaries.iter().enumerate() {
            check_amount(&format!("boundary {}", i + 1), *boundary)?;
        }
        if let Some(pair) = self.boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(MeterbillError::InvalidTariff(format!(
                "boundaries must be strictly increasing, found {} then {}",
                pair[0], pair[1]
            )));
        }
        for (i, rate) in self.rates.iter().enumerate() {
            check_amount(&format!("rate {}", i + 1), *rate)?;
        }
        check_amount("pct", self.pct)?;
        check_amount("fixed", self.fixed)
    }
}

impl FlatConfig {
    fn validate(&self) -> Result<()> {
        check_amount("rate", self.rate)?;
        if let Some(rate) = self.second_rate {
            check_amount("second_rate", rate)?;
        }
        if let Some(ct) = self.ct {
            check_amount("ct", ct)?;
        }
        check_amount("ppj", self.ppj)?;
        check_amount("fixed", self.fixed)
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<()> {
        if self.max.is_none() && self.delta_setpoint.is_none() {
            return Err(MeterbillError::InvalidTariff(
                "threshold config needs a max or a delta_setpoint".to_string(),
            ));
        }
        if let Some(max) = self.max {
            check_finite("max", max)?;
        }
        if let Some(setpoint) = self.delta_setpoint {
            check_finite("delta_setpoint", setpoint)?;
        }
        Ok(())
    }

    /// A delta-T stream needs a setpoint, a single-reading stream a max
    fn check_mode(&self, stream: UtilityStream) -> Result<()> {
        let (missing, present) = match stream.reading_fields().len() {
            2 => ("delta_setpoint", self.delta_setpoint.is_some()),
            1 => ("max", self.max.is_some()),
            _ => return Ok(()),
        };
        if !present {
            return Err(MeterbillError::InvalidTariff(format!(
                "{stream} limits need a {missing}"
            )));
        }
        Ok(())
    }
}

impl TariffConfig {
    /// Pricing family of this config
    pub fn family(&self) -> TariffFamily {
        match self {
            Self::Block(_) => TariffFamily::Block,
            Self::Flat(_) => TariffFamily::Flat,
            Self::Unit(_) => TariffFamily::Unit,
            Self::Threshold(_) => TariffFamily::Threshold,
        }
    }

    /// Check the configuration-integrity rules
    ///
    /// # Errors
    ///
    /// Returns [`MeterbillError::InvalidTariff`] describing the first rule
    /// the config breaks.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Block(config) => config.validate(),
            Self::Flat(config) => config.validate(),
            Self::Unit(config) => check_amount("price", config.price),
            Self::Threshold(config) => config.validate(),
        }
    }

    /// Check that this config can drive `stream`
    ///
    /// Adds the family check, and for threshold configs the limit that the
    /// stream's evaluation mode reads, on top of [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`MeterbillError::InvalidTariff`] when any check fails.
    pub fn validate_for(&self, stream: UtilityStream) -> Result<()> {
        if self.family() != stream.family() {
            return Err(MeterbillError::InvalidTariff(format!(
                "expected a {} tariff, got {}",
                stream.family(),
                self.family()
            )));
        }
        self.validate()?;
        match self {
            Self::Threshold(config) => config.check_mode(stream),
            _ => Ok(()),
        }
    }

    /// Pick the config to compute a stream with
    ///
    /// Uses `tariff` when it is present, valid, and of the stream's family;
    /// otherwise falls back to the stream default. Never fails.
    pub fn resolve(stream: UtilityStream, tariff: Option<&TariffConfig>) -> (Self, ConfigOrigin) {
        let Some(tariff) = tariff else {
            debug!("No tariff loaded for {}, using default", stream);
            return (default_tariff(stream), ConfigOrigin::Default);
        };

        if tariff.family() != stream.family() {
            warn!(
                "Tariff for {} is a {} config, expected {}; using default",
                stream,
                tariff.family(),
                stream.family()
            );
            return (default_tariff(stream), ConfigOrigin::Default);
        }

        match tariff.validate_for(stream) {
            Ok(()) => (tariff.clone(), ConfigOrigin::Configured),
            Err(e) => {
                warn!("Rejecting tariff for {}: {}; using default", stream, e);
                (default_tariff(stream), ConfigOrigin::Default)
            }
        }
    }
}

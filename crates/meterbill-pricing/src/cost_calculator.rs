//! Cost calculator dispatch
//!
//! Picks the calculator matching the resolved tariff of a stream and turns
//! its output into a [`CostBreakdown`]. Every call recomputes from scratch;
//! nothing is cached between calls.
//!
//! Every amount is rounded to cents when its line is built, and the grand
//! total is summed from those rounded amounts. What is printed is what is
//! added.
//!
//! # Examples
//!
//! ```
//! use meterbill_core::types::{ConsumptionTotals, CostMode, UtilityStream};
//! use meterbill_pricing::CostCalculator;
//!
//! // No tariff loaded yet: the documented default is used
//! let totals = ConsumptionTotals::single("usage", 30.0);
//! let breakdown = CostCalculator::calculate(UtilityStream::Pdam, &totals, None, CostMode::Auto)
//!     .unwrap();
//! assert_eq!(breakdown.grand_total, 50_000.0);
//! assert!(breakdown.reconciles());
//! ```

use crate::block::BlockTariffCalculator;
use crate::flat::FlatRateCalculator;
use crate::tariff::TariffConfig;
use crate::unit::UnitCostCalculator;
use meterbill_core::breakdown::{ConfigOrigin, CostBreakdown, CostLine, SurchargeLine};
use meterbill_core::types::{ConsumptionTotals, CostMode, UtilityStream};
use smallvec::SmallVec;
use tracing::debug;

/// Priced lines before they are attached to a stream
#[derive(Debug, Clone, PartialEq)]
pub struct Priced {
    /// Volumetric lines
    pub lines: SmallVec<[CostLine; 5]>,
    /// Percentage surcharges
    pub surcharges: SmallVec<[SurchargeLine; 2]>,
    /// Amount before the levy
    pub subtotal: f64,
    /// Fixed add-on
    pub fixed: f64,
    /// Sum of every line plus fixed, in display order
    pub grand_total: f64,
}

impl Priced {
    /// Lines without surcharges; the subtotal is the sum of the lines
    pub fn new(
        lines: SmallVec<[CostLine; 5]>,
        surcharges: SmallVec<[SurchargeLine; 2]>,
        fixed: f64,
    ) -> Self {
        let subtotal = sum_lines(&lines);
        Self::assemble(lines, surcharges, subtotal, fixed)
    }

    /// Lines and surcharges with an explicit subtotal
    pub fn assemble(
        lines: SmallVec<[CostLine; 5]>,
        surcharges: SmallVec<[SurchargeLine; 2]>,
        subtotal: f64,
        fixed: f64,
    ) -> Self {
        let fixed = round_cents(fixed);
        let grand_total = surcharges
            .iter()
            .fold(sum_lines(&lines), |acc, s| acc + s.amount)
            + fixed;
        Self {
            lines,
            surcharges,
            subtotal,
            fixed,
            grand_total,
        }
    }

    /// Attach stream and origin
    pub fn into_breakdown(
        self,
        stream: UtilityStream,
        origin: ConfigOrigin,
        total_quantity: f64,
    ) -> CostBreakdown {
        CostBreakdown {
            stream,
            origin,
            total_quantity,
            lines: self.lines,
            subtotal: self.subtotal,
            surcharges: self.surcharges,
            fixed: self.fixed,
            grand_total: self.grand_total,
        }
    }
}

/// Round an amount to two decimals
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub(crate) fn sum_lines(lines: &[CostLine]) -> f64 {
    lines.iter().fold(0.0, |acc, line| acc + line.amount)
}

/// Dispatches consumption totals to the right calculator
pub struct CostCalculator;

impl CostCalculator {
    /// Price a stream's totals
    ///
    /// `tariff` may be `None` while the tariff fetch is in flight; the
    /// stream default is used then. Returns `None` for threshold streams,
    /// which have no cost.
    pub fn calculate(
        stream: UtilityStream,
        totals: &ConsumptionTotals,
        tariff: Option<&TariffConfig>,
        mode: CostMode,
    ) -> Option<CostBreakdown> {
        let (config, origin) = TariffConfig::resolve(stream, tariff);
        let total_quantity = totals.total();

        let priced = match &config {
            TariffConfig::Block(block) => {
                BlockTariffCalculator::from_validated(block).price(totals.primary())
            }
            TariffConfig::Flat(flat) => FlatRateCalculator::new(flat).price(totals),
            TariffConfig::Unit(unit) => UnitCostCalculator::new(unit.price).price(totals, mode),
            TariffConfig::Threshold(_) => {
                debug!("{} is evaluated against limits, not priced", stream);
                return None;
            }
        };

        debug!(
            "Calculated {} cost {:.2} for {:.3} units ({} tariff)",
            stream, priced.grand_total, total_quantity, origin
        );

        Some(priced.into_breakdown(stream, origin, total_quantity))
    }
}

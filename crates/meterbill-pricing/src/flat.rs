//! Flat-rate pricing with surcharges
//!
//! One calculator covers both electricity variants:
//! - single band with a CT surcharge on the base, then the PPJ levy;
//! - two bands (off-peak / peak) with no CT, the levy applied to the base.
//!
//! `grand_total = base + ct + levy + fixed`, where `levy` is taken on
//! `base + ct`. Each surcharge is rounded to cents before the next one is
//! taken on it.

use crate::cost_calculator::{Priced, round_cents, sum_lines};
use crate::tariff::FlatConfig;
use meterbill_core::breakdown::{CostLine, SurchargeLine};
use meterbill_core::types::ConsumptionTotals;
use smallvec::SmallVec;
use tracing::debug;

/// Applies a validated [`FlatConfig`] to consumption totals
pub struct FlatRateCalculator<'a> {
    config: &'a FlatConfig,
}

impl<'a> FlatRateCalculator<'a> {
    /// Create a calculator over a validated config
    pub fn new(config: &'a FlatConfig) -> Self {
        Self { config }
    }

    /// Price the bands of `totals`
    ///
    /// The first band uses `rate`, the second `second_rate`. Without a
    /// second rate every band is billed at `rate`.
    pub fn price(&self, totals: &ConsumptionTotals) -> Priced {
        let mut lines: SmallVec<[CostLine; 5]> = SmallVec::new();
        for (i, band) in totals.bands.iter().enumerate() {
            let rate = match (i, self.config.second_rate) {
                (0, _) | (_, None) => self.config.rate,
                (_, Some(second)) => second,
            };
            let quantity = band.quantity.max(0.0);
            lines.push(CostLine {
                label: band.band.clone(),
                quantity,
                unit_rate: rate,
                amount: round_cents(quantity * rate),
            });
        }

        let base = sum_lines(&lines);
        let mut surcharges: SmallVec<[SurchargeLine; 2]> = SmallVec::new();
        let mut subtotal = base;

        if let Some(ct) = self.config.ct {
            let amount = round_cents(base * ct / 100.0);
            surcharges.push(SurchargeLine {
                label: "ct".to_string(),
                basis: base,
                percent: ct,
                amount,
            });
            subtotal += amount;
        }

        if self.config.ppj > 0.0 {
            surcharges.push(SurchargeLine {
                label: "ppj".to_string(),
                basis: subtotal,
                percent: self.config.ppj,
                amount: round_cents(subtotal * self.config.ppj / 100.0),
            });
        }

        let priced = Priced::assemble(lines, surcharges, subtotal, self.config.fixed);
        debug!(
            "Flat pricing: base {:.2}, subtotal {:.2} -> {:.2}",
            base, subtotal, priced.grand_total
        );
        priced
    }
}

//! Unit-price costing
//!
//! `quantity x price` with no tiers and no surcharges. Streams whose records
//! already carry an upstream cost are summed instead of recomputed,
//! depending on the [`CostMode`].

use crate::cost_calculator::{Priced, round_cents};
use meterbill_core::breakdown::CostLine;
use meterbill_core::types::{ConsumptionTotals, CostMode};
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Prices unit-costed consumption
#[derive(Debug, Clone, Copy)]
pub struct UnitCostCalculator {
    price: f64,
}

impl UnitCostCalculator {
    /// Create a calculator for a unit price
    pub fn new(price: f64) -> Self {
        Self { price }
    }

    /// Cost of a quantity at the unit price
    pub fn calculate(&self, quantity: f64) -> f64 {
        quantity.max(0.0) * self.price
    }

    /// Price consumption totals in the given mode
    ///
    /// - `Auto` sums provided costs and computes the rest at the unit price.
    /// - `Calculate` ignores provided costs.
    /// - `Display` reports provided costs only.
    pub fn price(&self, totals: &ConsumptionTotals, mode: CostMode) -> Priced {
        let quantity = totals.total().max(0.0);
        let provided = totals.provided_cost.unwrap_or_default();
        let mut lines: SmallVec<[CostLine; 5]> = SmallVec::new();

        match mode {
            CostMode::Calculate => {
                lines.push(self.computed_line(quantity));
            }
            CostMode::Auto => {
                if provided.records > 0 {
                    lines.push(provided_line(provided.amount, provided.covered_quantity));
                }
                let remaining = (quantity - provided.covered_quantity).max(0.0);
                if remaining > 0.0 || provided.records == 0 {
                    lines.push(self.computed_line(remaining));
                }
            }
            CostMode::Display => {
                if provided.records == 0 && quantity > 0.0 {
                    warn!(
                        "No provided costs for {:.3} units in display mode, reporting zero cost",
                        quantity
                    );
                }
                lines.push(provided_line(provided.amount, provided.covered_quantity));
            }
        }

        let priced = Priced::new(lines, SmallVec::new(), 0.0);
        debug!(
            "Unit pricing ({} mode): {:.3} units -> {:.2}",
            mode, quantity, priced.grand_total
        );
        priced
    }

    fn computed_line(&self, quantity: f64) -> CostLine {
        CostLine {
            label: "calculated".to_string(),
            quantity,
            unit_rate: self.price,
            amount: round_cents(self.calculate(quantity)),
        }
    }
}

fn provided_line(amount: f64, quantity: f64) -> CostLine {
    let unit_rate = if quantity > 0.0 { amount / quantity } else { 0.0 };
    CostLine {
        label: "provided".to_string(),
        quantity,
        unit_rate,
        amount: round_cents(amount),
    }
}

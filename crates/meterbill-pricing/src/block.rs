//! Progressive block-rate pricing
//!
//! The first block is a minimum-charge allotment: it is always billed in
//! full, even when consumption does not reach it. Every later block takes
//! the part of the consumption between its lower and upper boundary, and
//! the last block takes everything above the last used boundary.
//!
//! A reading exactly on a boundary belongs to the lower block.
//!
//! # Examples
//!
//! ```
//! use meterbill_pricing::block::BlockTariffCalculator;
//! use meterbill_pricing::tariff::{BlockConfig, BlockScheme};
//!
//! let config = BlockConfig {
//!     scheme: BlockScheme::Progressive,
//!     boundaries: vec![50.0, 100.0, 150.0, 200.0],
//!     rates: vec![1000.0, 1500.0, 2000.0, 2500.0, 3000.0],
//!     pct: 100.0,
//!     fixed: 0.0,
//! };
//! let priced = BlockTariffCalculator::new(&config).unwrap().price(120.0);
//! assert_eq!(priced.grand_total, 165_000.0);
//! ```

use crate::cost_calculator::{Priced, round_cents};
use crate::tariff::{BlockConfig, BlockScheme};
use meterbill_core::breakdown::CostLine;
use meterbill_core::error::Result;
use smallvec::SmallVec;
use tracing::debug;

/// Per-block quantities
pub type BlockQuantities = SmallVec<[f64; 5]>;

/// Applies a validated [`BlockConfig`] to a consumption total
pub struct BlockTariffCalculator<'a> {
    config: &'a BlockConfig,
}

impl<'a> BlockTariffCalculator<'a> {
    /// Create a calculator, validating the config first
    ///
    /// # Errors
    ///
    /// Returns [`MeterbillError::InvalidTariff`](meterbill_core::error::MeterbillError::InvalidTariff)
    /// when the config breaks a block-tariff rule.
    pub fn new(config: &'a BlockConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a calculator over a config that already passed validation
    pub(crate) fn from_validated(config: &'a BlockConfig) -> Self {
        Self { config }
    }

    /// Split a total into per-block quantities
    ///
    /// Negative or NaN totals count as zero consumption.
    pub fn quantities(&self, total: f64) -> BlockQuantities {
        let total = if total > 0.0 { total } else { 0.0 };
        match self.config.scheme {
            BlockScheme::Progressive => self.progressive(total),
            BlockScheme::Stepped => self.stepped(total),
        }
    }

    fn progressive(&self, total: f64) -> BlockQuantities {
        let n = self.config.rates.len();
        let b = &self.config.boundaries;

        let mut quantities = BlockQuantities::with_capacity(n);
        quantities.push(b[0]);
        for i in 1..n - 1 {
            let width = b[i] - b[i - 1];
            quantities.push((total - b[i - 1]).clamp(0.0, width));
        }
        quantities.push((total - b[n - 2]).max(0.0));
        quantities
    }

    fn stepped(&self, total: f64) -> BlockQuantities {
        let b = &self.config.boundaries;
        let (first, second) = (b[0], b[1]);

        let (q2, q3) = if total <= first {
            (0.0, 0.0)
        } else if total <= second {
            (total - first, 0.0)
        } else {
            (second - first, total - second)
        };

        let mut quantities = BlockQuantities::with_capacity(3);
        quantities.extend([first, q2, q3]);
        quantities
    }

    /// Price a consumption total
    pub fn price(&self, total: f64) -> Priced {
        let quantities = self.quantities(total);
        let pct = self.config.pct;

        let lines = quantities
            .iter()
            .zip(&self.config.rates)
            .enumerate()
            .map(|(i, (&quantity, &rate))| CostLine {
                label: format!("block {}", i + 1),
                quantity,
                unit_rate: rate * pct / 100.0,
                amount: round_cents(quantity * rate * pct / 100.0),
            })
            .collect();

        let priced = Priced::new(lines, SmallVec::new(), self.config.fixed);
        debug!(
            "Block pricing: total {:.3} over {} blocks -> {:.2}",
            total,
            quantities.len(),
            priced.grand_total
        );
        priced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scheme: BlockScheme, boundaries: &[f64], rates: &[f64]) -> BlockConfig {
        BlockConfig {
            scheme,
            boundaries: boundaries.to_vec(),
            rates: rates.to_vec(),
            pct: 100.0,
            fixed: 0.0,
        }
    }

    fn five_block() -> BlockConfig {
        config(
            BlockScheme::Progressive,
            &[50.0, 100.0, 150.0, 200.0],
            &[1000.0, 1500.0, 2000.0, 2500.0, 3000.0],
        )
    }

    fn three_block() -> BlockConfig {
        config(
            BlockScheme::Stepped,
            &[50.0, 100.0, 150.0],
            &[1000.0, 1500.0, 2000.0],
        )
    }

    #[test]
    fn test_five_block_split() {
        let config = five_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(120.0).as_slice(), &[50.0, 50.0, 20.0, 0.0, 0.0]);

        let priced = calc.price(120.0);
        assert_eq!(priced.subtotal, 165_000.0);
        assert_eq!(priced.grand_total, 165_000.0);
    }

    #[test]
    fn test_overflow_block_is_unbounded() {
        let config = five_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(
            calc.quantities(500.0).as_slice(),
            &[50.0, 50.0, 50.0, 50.0, 300.0]
        );
    }

    #[test]
    fn test_boundary_belongs_to_lower_block() {
        let config = five_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(100.0).as_slice(), &[50.0, 50.0, 0.0, 0.0, 0.0]);
        assert_eq!(calc.quantities(50.0).as_slice(), &[50.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_three_block_minimum_charge() {
        let config = three_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(30.0).as_slice(), &[50.0, 0.0, 0.0]);
        assert_eq!(calc.price(30.0).grand_total, 50_000.0);
    }

    #[test]
    fn test_zero_consumption_still_pays_first_block() {
        let config = five_block();
        let priced = BlockTariffCalculator::new(&config).unwrap().price(0.0);
        assert_eq!(priced.grand_total, 50_000.0);
    }

    #[test]
    fn test_stepped_branches() {
        let config = three_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(75.0).as_slice(), &[50.0, 25.0, 0.0]);
        assert_eq!(calc.quantities(100.0).as_slice(), &[50.0, 50.0, 0.0]);
        assert_eq!(calc.quantities(180.0).as_slice(), &[50.0, 50.0, 80.0]);
    }

    #[test]
    fn test_pct_and_fixed() {
        let mut config = three_block();
        config.pct = 50.0;
        config.fixed = 7_500.0;
        let priced = BlockTariffCalculator::new(&config).unwrap().price(120.0);
        // (50 * 1000 + 50 * 1500 + 20 * 2000) / 2 + 7500
        assert_eq!(priced.subtotal, 82_500.0);
        assert_eq!(priced.grand_total, 90_000.0);
        assert_eq!(priced.lines[1].unit_rate, 750.0);
    }

    #[test]
    fn test_negative_total_treated_as_zero() {
        let config = five_block();
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(-10.0), calc.quantities(0.0));
        assert_eq!(calc.quantities(f64::NAN), calc.quantities(0.0));
    }

    #[test]
    fn test_rejects_unvalidated_configs() {
        let one_rate = config(BlockScheme::Progressive, &[10.0], &[100.0]);
        assert!(BlockTariffCalculator::new(&one_rate).is_err());

        let no_boundaries = config(BlockScheme::Progressive, &[], &[100.0, 200.0]);
        assert!(BlockTariffCalculator::new(&no_boundaries).is_err());

        let short_stepped = config(BlockScheme::Stepped, &[50.0], &[1.0, 2.0, 3.0]);
        assert!(BlockTariffCalculator::new(&short_stepped).is_err());
    }

    #[test]
    fn test_two_block_config() {
        let config = config(BlockScheme::Progressive, &[10.0], &[100.0, 200.0]);
        let calc = BlockTariffCalculator::new(&config).unwrap();
        assert_eq!(calc.quantities(25.0).as_slice(), &[10.0, 15.0]);
    }
}

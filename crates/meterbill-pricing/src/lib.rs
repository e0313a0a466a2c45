//! Tariffs and cost calculators for meterbill
//!
//! This crate holds the tariff configuration model with its documented
//! defaults, the block, flat, and unit calculators, and the file-backed
//! tariff loader.

pub mod block;
pub mod cost_calculator;
pub mod defaults;
pub mod flat;
pub mod tariff;
pub mod tariff_loader;
pub mod unit;

pub use cost_calculator::CostCalculator;
pub use defaults::default_tariff;
pub use tariff::TariffConfig;
pub use tariff_loader::{TariffLoader, TariffSource};

//! meterbill - Turn hotel utility meter readings into costs and alerts
//!
//! This library provides functionality to:
//! - Load raw meter records from JSON or JSONL files and normalize them
//! - Aggregate daily readings into consumption totals per tariff band
//! - Price totals with block, flat-rate, or unit tariffs
//! - Classify monitored equipment readings against their limits
//! - Recompute a stream whenever its records or tariff change
//!
//! # Examples
//!
//! ```no_run
//! use meterbill::{
//!     data_loader::DataLoader,
//!     engine::{Engine, RecomputeSession},
//! };
//! use meterbill_core::types::{CostMode, UtilityStream};
//! use meterbill_pricing::TariffLoader;
//!
//! #[tokio::main]
//! async fn main() -> meterbill::Result<()> {
//!     let records = DataLoader::new("records/kwh-tm.jsonl");
//!     let tariffs = TariffLoader::new(None);
//!     let mut session = RecomputeSession::new(UtilityStream::KwhTm, CostMode::Auto);
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(4);
//!     Engine::drive(&mut session, &records, &tariffs, &tx).await?;
//!     drop(tx);
//!
//!     while let Some(breakdown) = rx.recv().await {
//!         println!("{breakdown:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod data_loader;
pub mod engine;
pub mod filters;
pub mod output;
pub mod threshold;
pub mod watch;

// Re-export the shared crates' modules under this crate
pub use meterbill_core::{error, types};

pub use meterbill_core::error::{MeterbillError, Result};
pub use meterbill_core::types::{CostMode, DailyDate, MeterRecord, UtilityStream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

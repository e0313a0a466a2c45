//! CLI interface for meterbill
//!
//! # Example
//!
//! ```bash
//! # Bill January's PDAM readings with the configured tariff
//! meterbill bill --stream pdam --records pdam.jsonl --month 2024-01
//!
//! # Check the heat pump, taking a just-saved reading into account
//! meterbill check --stream heat-pump --records heat-pump.jsonl --pending saved.json
//!
//! # Recompute whenever the record or tariff file changes
//! meterbill watch --stream kwh-tm --records kwh-tm.jsonl --tariff tariffs.json
//! ```

use crate::filters::RecordFilter;
use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use meterbill_core::error::{MeterbillError, Result};
use meterbill_core::types::{CostMode, UtilityStream};
use std::path::PathBuf;

/// Turn hotel utility meter readings into costs and alerts
#[derive(Parser, Debug, Clone)]
#[command(name = "meterbill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Input arguments shared by the stream commands
#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Utility stream (pdam, abt, kwh-tm, kwh-tr, gas, fuel, bulk-water, chiller, freezer, heat-pump)
    #[arg(long, short = 's')]
    pub stream: UtilityStream,

    /// Record file, a JSON array or JSONL
    #[arg(long, short = 'r')]
    pub records: PathBuf,

    /// Tariff file; defaults to the per-user config file
    #[arg(long, short = 't', env = "METERBILL_TARIFF_FILE")]
    pub tariff: Option<PathBuf>,
}

/// Date filter arguments
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Filter by start date (YYYY-MM-DD or YYYY-MM)
    #[arg(long)]
    pub since: Option<String>,

    /// Filter by end date (YYYY-MM-DD or YYYY-MM)
    #[arg(long)]
    pub until: Option<String>,

    /// Bill a single month (YYYY-MM)
    #[arg(long, conflicts_with_all = ["since", "until"])]
    pub month: Option<String>,
}

impl FilterArgs {
    /// Build the record filter
    pub fn to_filter(&self) -> Result<RecordFilter> {
        let mut filter = RecordFilter::new();

        if let Some(month) = &self.month {
            let (year, month) = parse_month_filter(month)?;
            filter = filter.with_month(year, month);
        }
        if let Some(since) = &self.since {
            filter = filter.with_since(parse_date_filter(since)?);
        }
        if let Some(until) = &self.until {
            filter = filter.with_until(parse_until_filter(until)?);
        }

        Ok(filter)
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute the cost breakdown of a priced stream
    Bill {
        #[command(flatten)]
        input: StreamArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Cost calculation mode for unit-priced streams
        #[arg(long, default_value = "auto")]
        mode: CostMode,

        /// Show per-day consumption
        #[arg(long)]
        daily: bool,
    },

    /// Evaluate a monitored stream against its limits
    Check {
        #[command(flatten)]
        input: StreamArgs,

        /// A just-saved record (JSON object) that overrides the snapshot
        #[arg(long)]
        pending: Option<PathBuf>,
    },

    /// Recompute whenever the record or tariff file changes
    Watch {
        #[command(flatten)]
        input: StreamArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Cost calculation mode for unit-priced streams
        #[arg(long, default_value = "auto")]
        mode: CostMode,

        /// Refresh interval in seconds
        #[arg(long, default_value = "5")]
        interval: u64,
    },

    /// Print the documented default tariffs
    Defaults {
        /// Only this stream
        #[arg(long, short = 's')]
        stream: Option<UtilityStream>,
    },
}

/// Parse a date filter argument
///
/// Accepts YYYY-MM-DD, or YYYY-MM for the first day of that month.
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    let (year, month) = parse_month_filter(date_str)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| MeterbillError::InvalidDate(format!("Invalid date: {date_str}")))
}

/// Parse an end-date filter argument
///
/// Like [`parse_date_filter`], but YYYY-MM means the last day of the month.
pub fn parse_until_filter(date_str: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    let first = parse_date_filter(date_str)?;
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next_month
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| MeterbillError::InvalidDate(format!("Invalid date: {date_str}")))
}

/// Parse a month filter argument (YYYY-MM)
pub fn parse_month_filter(month_str: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = month_str.split('-').collect();
    if parts.len() != 2 {
        return Err(MeterbillError::InvalidDate(format!(
            "Invalid date format '{month_str}', expected YYYY-MM-DD or YYYY-MM"
        )));
    }

    let year = parts[0]
        .parse::<i32>()
        .map_err(|_| MeterbillError::InvalidDate(format!("Invalid year in '{month_str}'")))?;
    let month = parts[1]
        .parse::<u32>()
        .map_err(|_| MeterbillError::InvalidDate(format!("Invalid month in '{month_str}'")))?;

    if !(1..=12).contains(&month) {
        return Err(MeterbillError::InvalidDate(format!(
            "Month must be between 1-12, got {month}"
        )));
    }

    Ok((year, month))
}

//! Output formatting
//!
//! Two formatters share the [`OutputFormatter`] trait:
//! - a table formatter for the terminal, with colored threshold states
//! - a JSON formatter for scripts and other tools
//!
//! Numbers are printed plainly with fixed decimals. There is no currency
//! symbol or grouping; the presentation layer that owns the locale does that.
//!
//! # Examples
//!
//! ```
//! use meterbill::engine::Engine;
//! use meterbill::output::get_formatter;
//! use meterbill_core::types::{CostMode, UtilityStream};
//!
//! let breakdown = Engine::compute(UtilityStream::Pdam, &[], None, CostMode::Auto);
//!
//! let formatter = get_formatter(false, false);
//! println!("{}", formatter.format_breakdown(&breakdown, &[]));
//!
//! let json_formatter = get_formatter(true, false);
//! assert!(json_formatter.format_breakdown(&breakdown, &[]).contains("\"grand_total\""));
//! ```

use crate::aggregation::DailyConsumption;
use crate::engine::Breakdown;
use colored::Colorize;
use meterbill_core::breakdown::{CostBreakdown, ThresholdReport, ThresholdState};
use meterbill_core::types::UtilityStream;
use meterbill_pricing::TariffConfig;
use meterbill_pricing::tariff::Comparison;
use prettytable::{Cell, Table, format, row};
use serde_json::json;
use std::collections::BTreeMap;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a cost breakdown, optionally with per-day consumption
    fn format_cost(&self, cost: &CostBreakdown, daily: &[DailyConsumption]) -> String;

    /// Format a threshold report
    fn format_threshold(&self, report: &ThresholdReport) -> String;

    /// Format the default tariff table
    fn format_defaults(&self, defaults: &BTreeMap<UtilityStream, TariffConfig>) -> String;

    /// Format whichever breakdown an engine run produced
    fn format_breakdown(&self, breakdown: &Breakdown, daily: &[DailyConsumption]) -> String {
        match breakdown {
            Breakdown::Cost(cost) => self.format_cost(cost, daily),
            Breakdown::Threshold(report) => self.format_threshold(report),
        }
    }
}

/// Table formatter for human-readable output
pub struct TableFormatter {
    /// Whether to color threshold states
    pub color: bool,
}

impl TableFormatter {
    /// Create a new TableFormatter
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn format_amount(amount: f64) -> String {
        format!("{amount:.2}")
    }

    fn format_quantity(quantity: f64) -> String {
        format!("{quantity:.3}")
    }

    fn format_optional(value: Option<f64>) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
    }

    fn format_state(&self, state: ThresholdState) -> String {
        let text = state.to_string().to_uppercase();
        if !self.color {
            return text;
        }
        match state {
            ThresholdState::Normal => text.green().to_string(),
            ThresholdState::Warning => text.yellow().bold().to_string(),
            ThresholdState::Unknown => text.dimmed().to_string(),
            ThresholdState::NeedsMaintenance => text.red().bold().to_string(),
        }
    }

    fn format_daily(daily: &[DailyConsumption]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        let bands: Vec<&str> = daily
            .first()
            .map(|d| d.totals.bands.iter().map(|b| b.band.as_str()).collect())
            .unwrap_or_default();

        let mut titles = row![b -> "Date"];
        for band in &bands {
            titles.add_cell(Cell::new(band).style_spec("b"));
        }
        titles.add_cell(Cell::new("Records").style_spec("b"));
        table.set_titles(titles);

        for day in daily {
            let mut row = row![day.date.format("%Y-%m-%d")];
            for band in &day.totals.bands {
                let quantity = Self::format_quantity(band.quantity);
                row.add_cell(Cell::new(&quantity).style_spec("r"));
            }
            let count = day.totals.record_count.to_string();
            row.add_cell(Cell::new(&count).style_spec("r"));
            table.add_row(row);
        }

        table.to_string()
    }
}

impl OutputFormatter for TableFormatter {
    fn format_cost(&self, cost: &CostBreakdown, daily: &[DailyConsumption]) -> String {
        let mut output = String::new();

        if !daily.is_empty() {
            output.push_str(&Self::format_daily(daily));
            output.push('\n');
        }

        output.push_str(&format!(
            "{} ({} tariff): {} units\n",
            cost.stream,
            cost.origin,
            Self::format_quantity(cost.total_quantity)
        ));

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Line", b -> "Quantity", b -> "Rate", b -> "Amount"]);

        for line in &cost.lines {
            table.add_row(row![
                line.label,
                r -> Self::format_quantity(line.quantity),
                r -> Self::format_amount(line.unit_rate),
                r -> Self::format_amount(line.amount)
            ]);
        }

        if !cost.surcharges.is_empty() {
            table.add_row(row![i -> "base", "", "", r -> Self::format_amount(cost.base())]);
            for surcharge in &cost.surcharges {
                table.add_row(row![
                    format!("{} {}%", surcharge.label, surcharge.percent),
                    r -> Self::format_amount(surcharge.basis),
                    "",
                    r -> Self::format_amount(surcharge.amount)
                ]);
            }
        }

        if cost.fixed != 0.0 {
            table.add_row(row!["fixed", "", "", r -> Self::format_amount(cost.fixed)]);
        }

        table.add_row(row![b -> "TOTAL", "", "", br -> Self::format_amount(cost.grand_total)]);

        output.push_str(&table.to_string());
        output
    }

    fn format_threshold(&self, report: &ThresholdReport) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Stream",
            b -> "State",
            b -> "Date",
            b -> "Source",
            b -> "Value",
            b -> "Limit"
        ]);

        table.add_row(row![
            report.stream,
            self.format_state(report.state),
            report.date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            report.source,
            r -> Self::format_optional(report.value),
            r -> Self::format_optional(report.limit)
        ]);

        format!("{} ({} limits)\n{}", report.stream, report.origin, table)
    }

    fn format_defaults(&self, defaults: &BTreeMap<UtilityStream, TariffConfig>) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Stream", b -> "Family", b -> "Default"]);

        for (stream, tariff) in defaults {
            table.add_row(row![stream, tariff.family(), describe_tariff(tariff)]);
        }

        table.to_string()
    }
}

/// One-line summary of a tariff
pub fn describe_tariff(tariff: &TariffConfig) -> String {
    let list = |values: &[f64]| {
        values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match tariff {
        TariffConfig::Block(block) => format!(
            "{:?} blocks [{}] at [{}], pct {}, fixed {}",
            block.scheme,
            list(&block.boundaries),
            list(&block.rates),
            block.pct,
            block.fixed
        )
        .to_lowercase(),
        TariffConfig::Flat(flat) => {
            let mut parts = vec![format!("rate {}", flat.rate)];
            if let Some(second) = flat.second_rate {
                parts.push(format!("second rate {second}"));
            }
            if let Some(ct) = flat.ct {
                parts.push(format!("ct {ct}%"));
            }
            parts.push(format!("ppj {}%", flat.ppj));
            parts.push(format!("fixed {}", flat.fixed));
            parts.join(", ")
        }
        TariffConfig::Unit(unit) => format!("{} per unit", unit.price),
        TariffConfig::Threshold(limits) => match (limits.max, limits.delta_setpoint) {
            (Some(max), _) => match limits.comparison {
                Comparison::AtOrAbove => format!("warn at or above {max}"),
                Comparison::AtOrBelow => format!("warn at or below {max}"),
            },
            (None, Some(setpoint)) => format!("delta-T setpoint {setpoint}"),
            (None, None) => "no limits".to_string(),
        },
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_cost(&self, cost: &CostBreakdown, daily: &[DailyConsumption]) -> String {
        let mut output = json!(cost);
        if !daily.is_empty() {
            output["daily"] = json!(daily);
        }
        format!("{output:#}")
    }

    fn format_threshold(&self, report: &ThresholdReport) -> String {
        format!("{:#}", json!(report))
    }

    fn format_defaults(&self, defaults: &BTreeMap<UtilityStream, TariffConfig>) -> String {
        format!("{:#}", json!(defaults))
    }
}

/// Get the appropriate formatter
pub fn get_formatter(json: bool, color: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter::new(color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use meterbill_core::breakdown::{ConfigOrigin, ReadingSource};
    use meterbill_core::types::{CostMode, DailyDate, MeterRecord};
    use meterbill_pricing::defaults::default_tariffs;

    fn kwh_tm_breakdown() -> CostBreakdown {
        let date = DailyDate::new(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let records = vec![
            MeterRecord::new(date)
                .with_value("lwbp", Some(100.0))
                .with_value("wbp", Some(50.0)),
        ];
        Engine::compute(UtilityStream::KwhTm, &records, None, CostMode::Auto)
            .as_cost()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_table_cost_output() {
        let output = TableFormatter::new(false).format_cost(&kwh_tm_breakdown(), &[]);
        assert!(output.contains("kwh-tm (default tariff)"));
        assert!(output.contains("lwbp"));
        assert!(output.contains("ppj 10%"));
        assert!(output.contains("TOTAL"));
        assert!(!output.contains('$'));
    }

    #[test]
    fn test_table_amounts_add_up_to_total() {
        let date = DailyDate::new(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let records = vec![MeterRecord::new(date).with_value("usage", Some(1.014))];
        let breakdown = Engine::compute(UtilityStream::KwhTr, &records, None, CostMode::Auto);
        let cost = breakdown.as_cost().unwrap();
        let output = TableFormatter::new(false).format_cost(cost, &[]);

        let shown: Vec<String> = cost
            .lines
            .iter()
            .map(|l| l.amount)
            .chain(cost.surcharges.iter().map(|s| s.amount))
            .chain(std::iter::once(cost.fixed))
            .map(TableFormatter::format_amount)
            .collect();
        let cents = |text: &str| text.replace('.', "").parse::<i64>().unwrap();

        let total = TableFormatter::format_amount(cost.grand_total);
        assert_eq!(total, "1584.33");
        assert!(output.contains(&total));
        assert!(shown[..3].iter().all(|amount| output.contains(amount.as_str())));
        assert_eq!(shown.iter().map(|s| cents(s)).sum::<i64>(), cents(&total));
    }

    #[test]
    fn test_base_row_is_the_sum_of_lines() {
        let cost = kwh_tm_breakdown();
        let output = TableFormatter::new(false).format_cost(&cost, &[]);
        assert!(output.contains("base"));
        assert!(!output.contains("subtotal"));
        assert!(output.contains(&TableFormatter::format_amount(cost.base())));
    }

    #[test]
    fn test_json_cost_output() {
        let output = JsonFormatter.format_cost(&kwh_tm_breakdown(), &[]);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["stream"], "kwh-tm");
        assert_eq!(value["origin"], "default");
        assert_eq!(value["lines"].as_array().unwrap().len(), 2);
        assert!(value.get("daily").is_none());
    }

    #[test]
    fn test_threshold_output() {
        let report = ThresholdReport {
            stream: UtilityStream::HeatPump,
            origin: ConfigOrigin::Default,
            state: ThresholdState::NeedsMaintenance,
            date: None,
            source: ReadingSource::NoRecord,
            value: None,
            limit: Some(10.0),
        };

        let table = TableFormatter::new(false).format_threshold(&report);
        assert!(table.contains("NEEDS MAINTENANCE"));
        assert!(table.contains("10.00"));

        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_threshold(&report)).unwrap();
        assert_eq!(json["state"], "needs-maintenance");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_defaults_output() {
        let table = TableFormatter::new(false).format_defaults(default_tariffs());
        assert!(table.contains("stepped blocks [50, 100, 150]"));
        assert!(table.contains("delta-T setpoint 10"));

        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_defaults(default_tariffs())).unwrap();
        assert_eq!(json["gas"]["price"], 12000.0);
    }
}

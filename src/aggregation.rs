//! Consumption aggregation
//!
//! Sums a record set's present readings into per-band totals. Absent values
//! add nothing, duplicate dates are summed as given, and negative or
//! non-finite quantities are skipped.
//!
//! # Examples
//!
//! ```
//! use meterbill::aggregation::ConsumptionAggregator;
//! use meterbill_core::types::{DailyDate, MeterRecord, UtilityStream};
//! use chrono::NaiveDate;
//!
//! let date = DailyDate::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
//! let records = vec![
//!     MeterRecord::new(date).with_value("usage", Some(12.0)),
//!     MeterRecord::new(date).with_value("usage", None),
//! ];
//!
//! let totals = ConsumptionAggregator::aggregate(UtilityStream::Pdam, &records);
//! assert_eq!(totals.primary(), 12.0);
//! assert_eq!(totals.record_count, 2);
//! ```

use meterbill_core::types::{
    ConsumptionTotals, DailyDate, MeterRecord, ProvidedCost, UtilityStream,
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::debug;

/// Consumption of a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyConsumption {
    /// Date of the readings
    pub date: DailyDate,
    /// Totals of that day's records
    pub totals: ConsumptionTotals,
}

/// Running sums for one record set
struct BandAccumulator<'a> {
    fields: &'a [&'a str],
    cost_field: Option<&'a str>,
    quantities: SmallVec<[f64; 2]>,
    provided: Option<ProvidedCost>,
    records: usize,
}

impl<'a> BandAccumulator<'a> {
    fn new(fields: &'a [&'a str], cost_field: Option<&'a str>) -> Self {
        Self {
            fields,
            cost_field,
            quantities: fields.iter().map(|_| 0.0).collect(),
            provided: None,
            records: 0,
        }
    }

    fn add_record(&mut self, record: &MeterRecord) {
        self.records += 1;
        let mut record_quantity = 0.0;

        for (sum, field) in self.quantities.iter_mut().zip(self.fields) {
            match record.value(field) {
                Some(q) if q.is_finite() && q >= 0.0 => {
                    *sum += q;
                    record_quantity += q;
                }
                Some(q) => debug!("Skipping {} = {} on {}", field, q, record.date),
                None => {}
            }
        }

        let cost = self
            .cost_field
            .and_then(|field| record.value(field))
            .filter(|c| c.is_finite() && *c >= 0.0);
        if let Some(amount) = cost {
            let provided = self.provided.get_or_insert_with(ProvidedCost::default);
            provided.amount += amount;
            provided.covered_quantity += record_quantity;
            provided.records += 1;
        }
    }

    fn into_totals(self) -> ConsumptionTotals {
        let mut totals = ConsumptionTotals {
            provided_cost: self.provided,
            record_count: self.records,
            ..ConsumptionTotals::default()
        };
        for (field, quantity) in self.fields.iter().zip(self.quantities) {
            totals.push_band(*field, quantity);
        }
        totals
    }
}

/// Sums normalized records into consumption totals
pub struct ConsumptionAggregator;

impl ConsumptionAggregator {
    /// Totals of a stream's records over its quantity and cost fields
    pub fn aggregate(stream: UtilityStream, records: &[MeterRecord]) -> ConsumptionTotals {
        let totals =
            Self::aggregate_fields(stream.quantity_fields(), stream.cost_field(), records);
        debug!(
            "Aggregated {} {} records: {:.3} units",
            totals.record_count,
            stream,
            totals.total()
        );
        totals
    }

    /// Totals over explicit fields
    ///
    /// One band per quantity field, in the given order. When `cost_field`
    /// is set, records carrying a present cost are also summed into
    /// [`ProvidedCost`].
    pub fn aggregate_fields(
        fields: &[&str],
        cost_field: Option<&str>,
        records: &[MeterRecord],
    ) -> ConsumptionTotals {
        let mut acc = BandAccumulator::new(fields, cost_field);
        for record in records {
            acc.add_record(record);
        }
        acc.into_totals()
    }

    /// Per-day totals, ordered by date
    pub fn aggregate_daily(
        stream: UtilityStream,
        records: &[MeterRecord],
    ) -> Vec<DailyConsumption> {
        let fields = stream.quantity_fields();
        let cost_field = stream.cost_field();
        let mut days: BTreeMap<DailyDate, BandAccumulator<'_>> = BTreeMap::new();

        for record in records {
            days.entry(record.date)
                .or_insert_with(|| BandAccumulator::new(fields, cost_field))
                .add_record(record);
        }

        days.into_iter()
            .map(|(date, acc)| DailyConsumption {
                date,
                totals: acc.into_totals(),
            })
            .collect()
    }
}

//! Threshold evaluation
//!
//! Classifies the latest evaluable reading of a monitored stream against
//! its limits. Two modes exist, picked by the stream's reading fields:
//!
//! - absolute: one reading against `max`, `Unknown` when it is absent;
//! - delta-T: `outlet - inlet` against `delta_setpoint`, `NeedsMaintenance`
//!   when a reading is absent or the delta is negative.
//!
//! The record evaluated is resolved in two tiers. A pending override, the
//! record the user just saved, wins over the fetched snapshot until the next
//! full refresh clears it. Within the snapshot, the most recent record with
//! every reading present is used, not simply the newest record.

use meterbill_core::breakdown::{ConfigOrigin, ReadingSource, ThresholdReport, ThresholdState};
use meterbill_core::types::{MeterRecord, UtilityStream};
use meterbill_pricing::tariff::{Comparison, TariffConfig, ThresholdConfig};
use tracing::debug;

/// A locally saved record not yet confirmed by a refresh
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOverride {
    /// The saved record, already normalized
    pub record: MeterRecord,
}

impl PendingOverride {
    /// Wrap a just-saved record
    pub fn new(record: MeterRecord) -> Self {
        Self { record }
    }
}

/// Record chosen for evaluation and where it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedReading<'a> {
    /// The record, if any
    pub record: Option<&'a MeterRecord>,
    /// Its origin
    pub source: ReadingSource,
}

/// Classifies readings against a validated [`ThresholdConfig`]
pub struct ThresholdEvaluator<'a> {
    config: &'a ThresholdConfig,
}

impl<'a> ThresholdEvaluator<'a> {
    /// Create an evaluator over a validated config
    pub fn new(config: &'a ThresholdConfig) -> Self {
        Self { config }
    }

    /// Absolute mode
    pub fn classify_absolute(&self, reading: Option<f64>) -> ThresholdState {
        let Some(reading) = reading else {
            return ThresholdState::Unknown;
        };
        let Some(limit) = self.config.max else {
            return ThresholdState::Normal;
        };

        let breached = match self.config.comparison {
            Comparison::AtOrAbove => reading >= limit,
            Comparison::AtOrBelow => reading <= limit,
        };
        if breached {
            ThresholdState::Warning
        } else {
            ThresholdState::Normal
        }
    }

    /// Delta-T mode
    pub fn classify_delta(&self, inlet: Option<f64>, outlet: Option<f64>) -> ThresholdState {
        let (Some(inlet), Some(outlet)) = (inlet, outlet) else {
            return ThresholdState::NeedsMaintenance;
        };

        let delta = outlet - inlet;
        if delta.is_nan() || delta < 0.0 {
            return ThresholdState::NeedsMaintenance;
        }

        match self.config.delta_setpoint {
            Some(setpoint) if delta >= setpoint => ThresholdState::Normal,
            _ => ThresholdState::Warning,
        }
    }

    /// Evaluate a stream's records
    pub fn evaluate(
        &self,
        stream: UtilityStream,
        records: &[MeterRecord],
        pending: Option<&PendingOverride>,
        origin: ConfigOrigin,
    ) -> ThresholdReport {
        let fields = stream.reading_fields();
        let resolved = resolve_reading(fields, records, pending);
        let date = resolved.record.map(|r| r.date);
        let reading = |field: &str| resolved.record.and_then(|r| r.value(field));

        let (state, value, limit) = match fields {
            [inlet, outlet] => {
                let (inlet, outlet) = (reading(*inlet), reading(*outlet));
                let delta = inlet.zip(outlet).map(|(i, o)| o - i);
                (
                    self.classify_delta(inlet, outlet),
                    delta,
                    self.config.delta_setpoint,
                )
            }
            [field] => {
                let value = reading(*field);
                (self.classify_absolute(value), value, self.config.max)
            }
            _ => (ThresholdState::Unknown, None, None),
        };

        debug!(
            "{} is {} ({} record, value {:?})",
            stream, state, resolved.source, value
        );

        ThresholdReport {
            stream,
            origin,
            state,
            date,
            source: resolved.source,
            value,
            limit,
        }
    }

    /// Resolve the stream's limits and evaluate
    ///
    /// A stream without threshold limits reports `Unknown`.
    pub fn evaluate_stream(
        stream: UtilityStream,
        records: &[MeterRecord],
        pending: Option<&PendingOverride>,
        tariff: Option<&TariffConfig>,
    ) -> ThresholdReport {
        let (config, origin) = TariffConfig::resolve(stream, tariff);
        match &config {
            TariffConfig::Threshold(limits) => {
                ThresholdEvaluator::new(limits).evaluate(stream, records, pending, origin)
            }
            _ => ThresholdReport {
                stream,
                origin,
                state: ThresholdState::Unknown,
                date: None,
                source: ReadingSource::NoRecord,
                value: None,
                limit: None,
            },
        }
    }
}

fn is_evaluable(record: &MeterRecord, fields: &[&str]) -> bool {
    fields.iter().all(|f| record.value(f).is_some())
}

/// Pick the record to evaluate
///
/// An evaluable pending override comes first. Otherwise the most recent
/// snapshot record with every field present; when none has them, the newest
/// record so that missing data shows up as such. Among records of the same
/// date the later one in the list wins.
pub fn resolve_reading<'a>(
    fields: &[&str],
    records: &'a [MeterRecord],
    pending: Option<&'a PendingOverride>,
) -> ResolvedReading<'a> {
    if let Some(pending) = pending.filter(|p| is_evaluable(&p.record, fields)) {
        return ResolvedReading {
            record: Some(&pending.record),
            source: ReadingSource::Pending,
        };
    }

    let latest_evaluable = records
        .iter()
        .filter(|r| is_evaluable(r, fields))
        .max_by_key(|r| r.date);

    match latest_evaluable.or_else(|| records.iter().max_by_key(|r| r.date)) {
        Some(record) => ResolvedReading {
            record: Some(record),
            source: ReadingSource::Snapshot,
        },
        None => match pending {
            Some(pending) => ResolvedReading {
                record: Some(&pending.record),
                source: ReadingSource::Pending,
            },
            None => ResolvedReading {
                record: None,
                source: ReadingSource::NoRecord,
            },
        },
    }
}

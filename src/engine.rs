//! Recompute engine
//!
//! [`Engine::compute`] is the pure entry point: it aggregates a record
//! snapshot, resolves the tariff, and returns a fresh [`Breakdown`]. It
//! never patches an earlier result.
//!
//! [`RecomputeSession`] owns the inputs of one stream as they arrive from
//! two independent fetches. Every fetch is issued a [`Ticket`]; a completed
//! fetch is applied only when its ticket is the latest issued for that
//! input, so a slow stale response can never overwrite a newer one.
//!
//! # Examples
//!
//! ```
//! use meterbill::engine::{Breakdown, Engine};
//! use meterbill_core::types::{CostMode, DailyDate, MeterRecord, UtilityStream};
//! use chrono::NaiveDate;
//!
//! let date = DailyDate::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
//! let records = vec![MeterRecord::new(date).with_value("usage", Some(30.0))];
//!
//! // Tariff not loaded yet: the stream default applies
//! let breakdown = Engine::compute(UtilityStream::Pdam, &records, None, CostMode::Auto);
//! let Breakdown::Cost(cost) = breakdown else { panic!("pdam is priced") };
//! assert_eq!(cost.grand_total, 50_000.0);
//! ```

use crate::aggregation::ConsumptionAggregator;
use crate::data_loader::normalize_records;
use crate::filters::RecordFilter;
use crate::threshold::{PendingOverride, ThresholdEvaluator};
use derive_more::From;
use meterbill_core::breakdown::{CostBreakdown, ThresholdReport};
use meterbill_core::error::Result;
use meterbill_core::provider::RecordSource;
use meterbill_core::types::{
    CostMode, MeterRecord, RawMeterRecord, TariffFamily, UtilityStream,
};
use meterbill_pricing::{CostCalculator, TariffConfig, TariffSource};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of one computation
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(untagged)]
pub enum Breakdown {
    /// Priced stream
    Cost(CostBreakdown),
    /// Monitored stream
    Threshold(ThresholdReport),
}

impl Breakdown {
    /// Stream the result belongs to
    pub fn stream(&self) -> UtilityStream {
        match self {
            Self::Cost(cost) => cost.stream,
            Self::Threshold(report) => report.stream,
        }
    }

    /// The cost breakdown, for priced streams
    pub fn as_cost(&self) -> Option<&CostBreakdown> {
        match self {
            Self::Cost(cost) => Some(cost),
            Self::Threshold(_) => None,
        }
    }

    /// The threshold report, for monitored streams
    pub fn as_threshold(&self) -> Option<&ThresholdReport> {
        match self {
            Self::Cost(_) => None,
            Self::Threshold(report) => Some(report),
        }
    }
}

/// Stateless computation entry points
pub struct Engine;

impl Engine {
    /// Compute a stream's breakdown from a record snapshot
    ///
    /// `tariff` is `None` while it has not loaded; the stream default is
    /// used then.
    pub fn compute(
        stream: UtilityStream,
        records: &[MeterRecord],
        tariff: Option<&TariffConfig>,
        mode: CostMode,
    ) -> Breakdown {
        Self::compute_with_pending(stream, records, None, tariff, mode)
    }

    /// Compute with a pending local override for threshold streams
    pub fn compute_with_pending(
        stream: UtilityStream,
        records: &[MeterRecord],
        pending: Option<&PendingOverride>,
        tariff: Option<&TariffConfig>,
        mode: CostMode,
    ) -> Breakdown {
        if stream.family() == TariffFamily::Threshold {
            return ThresholdEvaluator::evaluate_stream(stream, records, pending, tariff).into();
        }

        let totals = ConsumptionAggregator::aggregate(stream, records);
        match CostCalculator::calculate(stream, &totals, tariff, mode) {
            Some(cost) => cost.into(),
            None => ThresholdEvaluator::evaluate_stream(stream, records, pending, tariff).into(),
        }
    }

    /// Fetch both inputs of a session concurrently and publish results
    ///
    /// A breakdown is sent after each input lands, as soon as records are
    /// available. A failed tariff fetch counts as "no tariff". A failed
    /// record fetch keeps the previous snapshot and is returned once the
    /// tariff fetch has finished too.
    pub async fn drive(
        session: &mut RecomputeSession,
        records: &dyn RecordSource,
        tariffs: &dyn TariffSource,
        tx: &mpsc::Sender<Breakdown>,
    ) -> Result<()> {
        let stream = session.stream();
        let records_ticket = session.issue(Input::Records);
        let tariff_ticket = session.issue(Input::Tariff);

        let records_fut = records.fetch_records(stream);
        let tariff_fut = tariffs.fetch_tariff(stream);
        tokio::pin!(records_fut, tariff_fut);

        let mut records_done = false;
        let mut tariff_done = false;
        let mut records_error = None;

        while !(records_done && tariff_done) {
            let update = tokio::select! {
                result = &mut records_fut, if !records_done => {
                    records_done = true;
                    match result {
                        Ok(raw) => session.apply_records(records_ticket, raw),
                        Err(e) => {
                            warn!("Failed to fetch {} records: {}", stream, e);
                            records_error = Some(e);
                            None
                        }
                    }
                }
                result = &mut tariff_fut, if !tariff_done => {
                    tariff_done = true;
                    let tariff = result.unwrap_or_else(|e| {
                        warn!("Failed to fetch {} tariff: {}, using default", stream, e);
                        None
                    });
                    session.apply_tariff(tariff_ticket, tariff)
                }
            };

            if let Some(breakdown) = update
                && tx.send(breakdown).await.is_err()
            {
                debug!("Breakdown receiver dropped, stopping");
                return Ok(());
            }
        }

        match records_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One of the two independently fetched inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The record snapshot
    Records,
    /// The tariff config
    Tariff,
}

/// Identifies one fetch of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    input: Input,
    seq: u64,
}

impl Ticket {
    /// Input the fetch is for
    pub fn input(&self) -> Input {
        self.input
    }
}

/// Latest accepted inputs of one stream
#[derive(Debug, Clone)]
pub struct RecomputeSession {
    stream: UtilityStream,
    mode: CostMode,
    filter: RecordFilter,
    records: Option<Vec<MeterRecord>>,
    tariff: Option<TariffConfig>,
    pending: Option<PendingOverride>,
    issued_records: u64,
    issued_tariff: u64,
}

impl RecomputeSession {
    /// Create an empty session
    pub fn new(stream: UtilityStream, mode: CostMode) -> Self {
        Self {
            stream,
            mode,
            filter: RecordFilter::default(),
            records: None,
            tariff: None,
            pending: None,
            issued_records: 0,
            issued_tariff: 0,
        }
    }

    /// Restrict records before aggregation
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stream of this session
    pub fn stream(&self) -> UtilityStream {
        self.stream
    }

    /// Accepted tariff, if one has landed
    pub fn tariff(&self) -> Option<&TariffConfig> {
        self.tariff.as_ref()
    }

    /// Accepted record snapshot, if one has landed
    pub fn records(&self) -> Option<&[MeterRecord]> {
        self.records.as_deref()
    }

    /// Pending local override
    pub fn pending(&self) -> Option<&PendingOverride> {
        self.pending.as_ref()
    }

    /// Start a fetch; only the latest ticket per input is honored
    pub fn issue(&mut self, input: Input) -> Ticket {
        let counter = match input {
            Input::Records => &mut self.issued_records,
            Input::Tariff => &mut self.issued_tariff,
        };
        *counter += 1;
        Ticket {
            input,
            seq: *counter,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        let latest = match ticket.input {
            Input::Records => self.issued_records,
            Input::Tariff => self.issued_tariff,
        };
        ticket.seq == latest
    }

    /// Apply a completed record fetch
    ///
    /// Returns the recomputed breakdown, or `None` when the ticket is stale
    /// or belongs to the other input. A fresh snapshot clears any pending
    /// override.
    pub fn apply_records(
        &mut self,
        ticket: Ticket,
        raw: Vec<RawMeterRecord>,
    ) -> Option<Breakdown> {
        if ticket.input != Input::Records || !self.is_current(ticket) {
            debug!("Discarding stale {} records (ticket {})", self.stream, ticket.seq);
            return None;
        }

        let records = self.filter.apply(normalize_records(raw));
        info!("Accepted {} {} records", records.len(), self.stream);
        self.records = Some(records);
        self.pending = None;
        Some(self.current())
    }

    /// Apply a completed tariff fetch
    ///
    /// Returns the recomputed breakdown once records are available, or
    /// `None` when the ticket is stale.
    pub fn apply_tariff(
        &mut self,
        ticket: Ticket,
        tariff: Option<TariffConfig>,
    ) -> Option<Breakdown> {
        if ticket.input != Input::Tariff || !self.is_current(ticket) {
            debug!("Discarding stale {} tariff (ticket {})", self.stream, ticket.seq);
            return None;
        }

        self.tariff = tariff;
        self.records.as_ref()?;
        Some(self.current())
    }

    /// Record a locally saved reading
    ///
    /// The record takes priority for threshold evaluation until the next
    /// accepted record snapshot.
    pub fn save_record(&mut self, record: MeterRecord) -> Breakdown {
        self.pending = Some(PendingOverride::new(record));
        self.current()
    }

    /// Recompute from the accepted inputs
    pub fn current(&self) -> Breakdown {
        Engine::compute_with_pending(
            self.stream,
            self.records.as_deref().unwrap_or_default(),
            self.pending.as_ref(),
            self.tariff.as_ref(),
            self.mode,
        )
    }
}

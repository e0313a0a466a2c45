//! File-backed record source
//!
//! Reads raw meter records from a JSON file holding either an array of
//! records or one record per line (JSONL). Malformed records are dropped
//! with a warning; the rest of the file still loads.
//!
//! ```json
//! {"date": "2024-01-01", "usage": "12,5", "recordedBy": "night shift"}
//! {"date": "2024-01-02", "usage": "-999"}
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use meterbill::data_loader::DataLoader;
//! use futures::StreamExt;
//!
//! # async fn example() -> meterbill::Result<()> {
//! let loader = DataLoader::new("records/pdam.jsonl");
//!
//! let records = loader.load_raw_records();
//! tokio::pin!(records);
//! while let Some(result) = records.next().await {
//!     let record = result?;
//!     println!("{}: {} fields", record.date, record.fields.len());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::Stream;
use meterbill_core::error::Result;
use meterbill_core::provider::RecordSource;
use meterbill_core::types::{MeterRecord, RawMeterRecord, UtilityStream};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Record loader for one JSON or JSONL file
#[derive(Debug, Clone)]
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    /// Create a loader for a record file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The record file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream raw records in file order
    ///
    /// Only a missing or unreadable file surfaces as an error item.
    pub fn load_raw_records(&self) -> impl Stream<Item = Result<RawMeterRecord>> + '_ {
        async_stream::stream! {
            let content = match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => content,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let records = if content.trim_start().starts_with('[') {
                Self::parse_array(&self.path, &content)
            } else {
                Self::parse_lines(&self.path, &content)
            };

            for record in records {
                yield Ok(record);
            }
        }
    }

    fn parse_array(path: &Path, content: &str) -> Vec<RawMeterRecord> {
        let values: Vec<serde_json::Value> = match serde_json::from_str(content) {
            Ok(values) => values,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| {
                serde_json::from_value::<RawMeterRecord>(value)
                    .map_err(|e| {
                        warn!(
                            "Skipping record {} in {}: {}",
                            index + 1,
                            path.display(),
                            e
                        );
                    })
                    .ok()
            })
            .collect()
    }

    fn parse_lines(path: &Path, content: &str) -> Vec<RawMeterRecord> {
        let mut records = Vec::new();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RawMeterRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {}: {}",
                        index + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        records
    }

    /// Load and normalize every record
    ///
    /// Records with an unparseable date are dropped with a warning.
    pub async fn load_records(&self) -> Result<Vec<MeterRecord>> {
        let raw = self.collect_raw().await?;
        Ok(normalize_records(raw))
    }

    async fn collect_raw(&self) -> Result<Vec<RawMeterRecord>> {
        let stream = self.load_raw_records();
        tokio::pin!(stream);

        let mut records = Vec::new();
        while let Some(result) = stream.next().await {
            records.push(result?);
        }

        debug!(
            "Loaded {} raw records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for DataLoader {
    async fn fetch_records(&self, stream: UtilityStream) -> Result<Vec<RawMeterRecord>> {
        debug!("Fetching {} records from {}", stream, self.path.display());
        self.collect_raw().await
    }
}

/// Normalize raw records, dropping those with a bad date
pub fn normalize_records(raw: Vec<RawMeterRecord>) -> Vec<MeterRecord> {
    let total = raw.len();
    let records: Vec<MeterRecord> = raw.into_iter().filter_map(MeterRecord::from_raw).collect();

    let dropped = total - records.len();
    if dropped > 0 {
        warn!("Dropped {} of {} records with unparseable dates", dropped, total);
    }
    records
}

//! Common test utilities for meterbill tests

use chrono::NaiveDate;
use meterbill::types::{DailyDate, MeterRecord, RawMeterRecord};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for raw records as the upstream API sends them
#[derive(Clone)]
pub struct RecordBuilder {
    date: String,
    recorded_by: Option<String>,
    fields: Map<String, Value>,
}

impl RecordBuilder {
    /// Start a record for a date (YYYY-MM-DD)
    pub fn on(date: &str) -> Self {
        Self {
            date: date.to_string(),
            recorded_by: None,
            fields: Map::new(),
        }
    }

    /// Set a field as text, the way most endpoints send values
    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.fields.insert(field.to_string(), json!(value));
        self
    }

    /// Set a field as a bare number
    #[allow(dead_code)]
    pub fn number(mut self, field: &str, value: f64) -> Self {
        self.fields.insert(field.to_string(), json!(value));
        self
    }

    #[allow(dead_code)]
    pub fn recorded_by(mut self, name: &str) -> Self {
        self.recorded_by = Some(name.to_string());
        self
    }

    /// JSON object for this record
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("date".to_string(), json!(self.date));
        if let Some(name) = &self.recorded_by {
            object.insert("recordedBy".to_string(), json!(name));
        }
        Value::Object(object)
    }

    /// Raw record, as the loader would produce it
    #[allow(dead_code)]
    pub fn raw(&self) -> RawMeterRecord {
        serde_json::from_value(self.to_json()).unwrap()
    }

    /// Normalized record
    #[allow(dead_code)]
    pub fn build(&self) -> MeterRecord {
        MeterRecord::from_raw(self.raw()).unwrap()
    }
}

/// Render records as JSONL
pub fn to_jsonl(records: &[RecordBuilder]) -> String {
    records
        .iter()
        .map(|r| format!("{}\n", r.to_json()))
        .collect()
}

/// Write a file into a temp dir and return its path
pub async fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

/// Date helper
#[allow(dead_code)]
pub fn day(year: i32, month: u32, day: u32) -> DailyDate {
    DailyDate::new(NaiveDate::from_ymd_opt(year, month, day).unwrap())
}

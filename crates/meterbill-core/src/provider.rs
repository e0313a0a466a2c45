//! Record source trait
//!
//! The HTTP client, the offline queue, and the file loader all hand records
//! to the engine through this trait. Transport, authentication, and retries
//! stay on the implementor's side.

use crate::error::Result;
use crate::types::{RawMeterRecord, UtilityStream};
use async_trait::async_trait;

/// Supplies the raw records of one utility stream
///
/// Records come back ordered by date. Normalization happens afterwards, so
/// implementors pass field values through untouched.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every record of a stream
    async fn fetch_records(&self, stream: UtilityStream) -> Result<Vec<RawMeterRecord>>;
}

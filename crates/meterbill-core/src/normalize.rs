//! Record normalization
//!
//! The upstream system stores every reading as text and marks "not recorded"
//! with sentinel strings instead of leaving the field out. This module turns
//! those raw strings into `Option<f64>` once, so that aggregation and
//! threshold evaluation never see a sentinel.
//!
//! # Examples
//!
//! ```
//! use meterbill_core::normalize::normalize;
//!
//! assert_eq!(normalize("12,5"), Some(12.5));
//! assert_eq!(normalize("-999"), None);
//! assert_eq!(normalize(""), None);
//! assert_eq!(normalize("0.0"), Some(0.0));
//! ```

use std::borrow::Cow;

/// Textual markers that mean "no reading"
///
/// `"0"` overlaps a legitimate zero reading. The upstream convention wins:
/// a bare `"0"` is absent, while `"0.0"` or `"0,00"` is a recorded zero.
pub const SENTINELS: &[&str] = &["0", "-999", "-999.00", "-999,00"];

/// Normalize a raw field value into an optional number
///
/// Returns `None` for empty input, for any of the [`SENTINELS`], and for
/// anything that does not parse as a finite decimal number.
pub fn normalize(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || SENTINELS.contains(&trimmed) {
        return None;
    }
    parse_decimal(trimmed)
}

/// Parse a decimal accepting either `.` or `,` as the separator
///
/// Mixed separators (`1.234,5`) are ambiguous and rejected.
fn parse_decimal(s: &str) -> Option<f64> {
    let candidate: Cow<'_, str> = if s.contains(',') {
        if s.contains('.') || s.matches(',').count() > 1 {
            return None;
        }
        Cow::Owned(s.replace(',', "."))
    } else {
        Cow::Borrowed(s)
    };

    let value: f64 = candidate.parse().ok()?;
    value.is_finite().then_some(value)
}

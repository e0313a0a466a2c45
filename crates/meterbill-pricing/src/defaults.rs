//! Documented default tariffs
//!
//! Used whenever a stream's tariff has not loaded yet, failed to load, or
//! failed validation. The numbers are deliberately round so that results
//! computed with a default are easy to recognize on screen.
//!
//! | Stream | Default |
//! |---|---|
//! | pdam | stepped blocks `[50, 100, 150]` at `[1000, 1500, 2000]` |
//! | abt | progressive blocks `[50, 100, 150, 200]` at `[1000, 1500, 2000, 2500, 3000]` |
//! | kwh-tm | lwbp 1035.78, wbp 1553.67, ppj 10% |
//! | kwh-tr | 1444.70, ct 5%, ppj 3% |
//! | gas | 12000 per unit |
//! | fuel | 6800 per liter |
//! | bulk-water | 25000 per m3 |
//! | chiller | warn at or above 5.0 |
//! | freezer | warn at or above -15.0 |
//! | heat-pump | delta-T setpoint 10.0 |

use crate::tariff::{
    BlockConfig, BlockScheme, Comparison, FlatConfig, TariffConfig, ThresholdConfig, UnitConfig,
};
use meterbill_core::types::UtilityStream;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static DEFAULT_TARIFFS: Lazy<BTreeMap<UtilityStream, TariffConfig>> = Lazy::new(|| {
    UtilityStream::ALL
        .into_iter()
        .map(|stream| (stream, build_default(stream)))
        .collect()
});

fn build_default(stream: UtilityStream) -> TariffConfig {
    match stream {
        UtilityStream::Pdam => TariffConfig::Block(BlockConfig {
            scheme: BlockScheme::Stepped,
            boundaries: vec![50.0, 100.0, 150.0],
            rates: vec![1000.0, 1500.0, 2000.0],
            pct: 100.0,
            fixed: 0.0,
        }),
        UtilityStream::Abt => TariffConfig::Block(BlockConfig {
            scheme: BlockScheme::Progressive,
            boundaries: vec![50.0, 100.0, 150.0, 200.0],
            rates: vec![1000.0, 1500.0, 2000.0, 2500.0, 3000.0],
            pct: 100.0,
            fixed: 0.0,
        }),
        UtilityStream::KwhTm => TariffConfig::Flat(FlatConfig {
            rate: 1035.78,
            second_rate: Some(1553.67),
            ct: None,
            ppj: 10.0,
            fixed: 0.0,
        }),
        UtilityStream::KwhTr => TariffConfig::Flat(FlatConfig {
            rate: 1444.70,
            second_rate: None,
            ct: Some(5.0),
            ppj: 3.0,
            fixed: 0.0,
        }),
        UtilityStream::Gas => TariffConfig::Unit(UnitConfig { price: 12_000.0 }),
        UtilityStream::Fuel => TariffConfig::Unit(UnitConfig { price: 6_800.0 }),
        UtilityStream::BulkWater => TariffConfig::Unit(UnitConfig { price: 25_000.0 }),
        UtilityStream::Chiller => TariffConfig::Threshold(ThresholdConfig {
            max: Some(5.0),
            delta_setpoint: None,
            comparison: Comparison::AtOrAbove,
        }),
        UtilityStream::Freezer => TariffConfig::Threshold(ThresholdConfig {
            max: Some(-15.0),
            delta_setpoint: None,
            comparison: Comparison::AtOrAbove,
        }),
        UtilityStream::HeatPump => TariffConfig::Threshold(ThresholdConfig {
            max: None,
            delta_setpoint: Some(10.0),
            comparison: Comparison::AtOrAbove,
        }),
    }
}

/// Default tariff of a stream
pub fn default_tariff(stream: UtilityStream) -> TariffConfig {
    DEFAULT_TARIFFS
        .get(&stream)
        .cloned()
        .unwrap_or_else(|| build_default(stream))
}

/// The whole default table, keyed by stream
pub fn default_tariffs() -> &'static BTreeMap<UtilityStream, TariffConfig> {
    &DEFAULT_TARIFFS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_is_valid_and_matches_family() {
        for stream in UtilityStream::ALL {
            let tariff = default_tariff(stream);
            assert!(tariff.validate().is_ok(), "default for {stream} is invalid");
            assert_eq!(tariff.family(), stream.family(), "family of {stream}");
        }
    }

    #[test]
    fn test_default_table_covers_all_streams() {
        assert_eq!(default_tariffs().len(), UtilityStream::ALL.len());
    }

    #[test]
    fn test_default_table_serializes_with_stream_keys() {
        let json = serde_json::to_value(default_tariffs()).unwrap();
        assert_eq!(json["abt"]["kind"], "block");
        assert_eq!(json["heat-pump"]["delta_setpoint"], 10.0);
    }
}

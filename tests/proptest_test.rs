//! Property-based tests for meterbill using proptest

use chrono::NaiveDate;
use meterbill::engine::Engine;
use meterbill::threshold::ThresholdEvaluator;
use meterbill_core::breakdown::{ConfigOrigin, ThresholdState};
use meterbill_core::types::{ConsumptionTotals, CostMode, DailyDate, MeterRecord, UtilityStream};
use meterbill_pricing::CostCalculator;
use meterbill_pricing::block::BlockTariffCalculator;
use meterbill_pricing::tariff::{
    BlockConfig, BlockScheme, FlatConfig, TariffConfig, ThresholdConfig,
};
use proptest::prelude::*;

// Strategies for generating test data

prop_compose! {
    fn arb_progressive_config()(
        widths in prop::collection::vec(1u32..500, 1..6),
        pct in 50u32..=150,
        fixed in 0u32..100_000,
    )(
        rates in prop::collection::vec(0u32..10_000, widths.len() + 1),
        widths in Just(widths),
        pct in Just(pct),
        fixed in Just(fixed),
    ) -> BlockConfig {
        let boundaries = widths
            .iter()
            .scan(0.0, |acc, w| {
                *acc += f64::from(*w);
                Some(*acc)
            })
            .collect();
        BlockConfig {
            scheme: BlockScheme::Progressive,
            boundaries,
            rates: rates.into_iter().map(f64::from).collect(),
            pct: f64::from(pct),
            fixed: f64::from(fixed),
        }
    }
}

prop_compose! {
    fn arb_stepped_config()(
        first in 1u32..500,
        second in 1u32..500,
        display_cap in prop::option::of(1u32..500),
        rates in prop::collection::vec(0u32..10_000, 3),
        pct in 50u32..=150,
        fixed in 0u32..100_000,
    ) -> BlockConfig {
        let first = f64::from(first);
        let second = first + f64::from(second);
        let mut boundaries = vec![first, second];
        if let Some(cap) = display_cap {
            boundaries.push(second + f64::from(cap));
        }
        BlockConfig {
            scheme: BlockScheme::Stepped,
            boundaries,
            rates: rates.into_iter().map(f64::from).collect(),
            pct: f64::from(pct),
            fixed: f64::from(fixed),
        }
    }
}

fn arb_block_config() -> impl Strategy<Value = BlockConfig> {
    prop_oneof![arb_progressive_config(), arb_stepped_config()]
}

prop_compose! {
    fn arb_flat_config()(
        rate in 0.0f64..5_000.0,
        second_rate in prop::option::of(0.0f64..5_000.0),
        ct in prop::option::of(0.0f64..20.0),
        ppj in 0.0f64..20.0,
        fixed in 0.0f64..100_000.0,
    ) -> FlatConfig {
        FlatConfig { rate, second_rate, ct, ppj, fixed }
    }
}

prop_compose! {
    fn arb_record()(
        day in 1u32..=28,
        usage in prop::option::of(0.0f64..1_000.0),
    ) -> MeterRecord {
        let date = DailyDate::new(NaiveDate::from_ymd_opt(2024, 4, day).unwrap());
        MeterRecord::new(date).with_value("usage", usage)
    }
}

proptest! {
    #[test]
    fn test_block_quantities_cover_consumption(
        config in arb_block_config(),
        total in 0.0f64..5_000.0,
    ) {
        let quantities = BlockTariffCalculator::new(&config).unwrap().quantities(total);
        prop_assert_eq!(quantities.len(), config.rates.len());

        // The first block is billed in full even below its boundary
        let covered: f64 = quantities.iter().sum();
        let expected = total.max(config.boundaries[0]);
        prop_assert!((covered - expected).abs() < 1e-6);
        prop_assert!(quantities.iter().all(|q| *q >= 0.0));
    }

    #[test]
    fn test_block_cost_is_monotonic(
        config in arb_block_config(),
        a in 0.0f64..5_000.0,
        b in 0.0f64..5_000.0,
    ) {
        let calculator = BlockTariffCalculator::new(&config).unwrap();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(calculator.price(low).grand_total <= calculator.price(high).grand_total);
    }

    #[test]
    fn test_flat_cost_reconciles(
        config in arb_flat_config(),
        first in 0.0f64..10_000.0,
        second in prop::option::of(0.0f64..10_000.0),
    ) {
        let totals = match second {
            Some(second) => ConsumptionTotals::dual("lwbp", first, "wbp", second),
            None => ConsumptionTotals::single("usage", first),
        };
        let tariff = TariffConfig::Flat(config);
        let cost = CostCalculator::calculate(
            UtilityStream::KwhTm,
            &totals,
            Some(&tariff),
            CostMode::Auto,
        )
        .unwrap();

        prop_assert_eq!(cost.origin, ConfigOrigin::Configured);
        prop_assert!(cost.reconciles());
        prop_assert!(cost.grand_total >= cost.fixed);
    }

    #[test]
    fn test_compute_is_idempotent(
        records in prop::collection::vec(arb_record(), 0..30),
        stream in prop::sample::select(vec![
            UtilityStream::Pdam,
            UtilityStream::Abt,
            UtilityStream::Gas,
        ]),
    ) {
        let first = Engine::compute(stream, &records, None, CostMode::Auto);
        let second = Engine::compute(stream, &records, None, CostMode::Auto);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_tariff_falls_back_to_default(
        rates in prop::collection::vec(0.0f64..1_000.0, 0..2),
        records in prop::collection::vec(arb_record(), 0..10),
    ) {
        // Fewer than two rates never validates
        let broken = TariffConfig::Block(BlockConfig {
            scheme: BlockScheme::Progressive,
            boundaries: vec![10.0],
            rates,
            pct: 100.0,
            fixed: 0.0,
        });

        let with_broken =
            Engine::compute(UtilityStream::Abt, &records, Some(&broken), CostMode::Auto);
        let with_none = Engine::compute(UtilityStream::Abt, &records, None, CostMode::Auto);
        prop_assert_eq!(with_broken.as_cost().unwrap().origin, ConfigOrigin::Default);
        prop_assert_eq!(with_broken, with_none);
    }

    #[test]
    fn test_delta_classification_is_total(
        inlet in prop::option::of(-50.0f64..100.0),
        outlet in prop::option::of(-50.0f64..100.0),
        setpoint in prop::option::of(0.0f64..30.0),
    ) {
        let config = ThresholdConfig {
            max: None,
            delta_setpoint: setpoint,
            comparison: Default::default(),
        };
        let state = ThresholdEvaluator::new(&config).classify_delta(inlet, outlet);

        match (inlet, outlet) {
            (Some(i), Some(o)) if o - i < 0.0 => {
                prop_assert_eq!(state, ThresholdState::NeedsMaintenance)
            }
            (Some(i), Some(o)) => match setpoint {
                Some(s) if o - i >= s => prop_assert_eq!(state, ThresholdState::Normal),
                _ => prop_assert_eq!(state, ThresholdState::Warning),
            },
            _ => prop_assert_eq!(state, ThresholdState::NeedsMaintenance),
        }
    }

    #[test]
    fn test_absolute_classification_is_total(
        reading in prop::option::of(-40.0f64..40.0),
        max in -40.0f64..40.0,
    ) {
        let config = ThresholdConfig {
            max: Some(max),
            delta_setpoint: None,
            comparison: Default::default(),
        };
        let state = ThresholdEvaluator::new(&config).classify_absolute(reading);

        match reading {
            None => prop_assert_eq!(state, ThresholdState::Unknown),
            Some(r) if r >= max => prop_assert_eq!(state, ThresholdState::Warning),
            Some(_) => prop_assert_eq!(state, ThresholdState::Normal),
        }
    }
}

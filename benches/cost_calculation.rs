use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use meterbill::aggregation::ConsumptionAggregator;
use meterbill::engine::Engine;
use meterbill_core::types::{ConsumptionTotals, CostMode, DailyDate, MeterRecord, UtilityStream};
use meterbill_pricing::block::BlockTariffCalculator;
use meterbill_pricing::default_tariff;
use meterbill_pricing::flat::FlatRateCalculator;
use meterbill_pricing::tariff::TariffConfig;
use std::hint::black_box;

fn month_of_records(fields: &[&str]) -> Vec<MeterRecord> {
    (1..=31)
        .map(|day| {
            let date = DailyDate::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap());
            fields.iter().fold(MeterRecord::new(date), |record, field| {
                record.with_value(*field, Some(f64::from(day) * 1.5))
            })
        })
        .collect()
}

fn benchmark_tariffs(c: &mut Criterion) {
    let mut group = c.benchmark_group("tariffs");

    let TariffConfig::Block(abt) = default_tariff(UtilityStream::Abt) else {
        unreachable!("abt is block priced")
    };
    group.bench_function("progressive_blocks", |b| {
        let calculator = BlockTariffCalculator::new(&abt).unwrap();
        b.iter(|| calculator.price(black_box(120.0)));
    });

    let TariffConfig::Flat(kwh) = default_tariff(UtilityStream::KwhTm) else {
        unreachable!("kwh-tm is flat priced")
    };
    group.bench_function("flat_dual_band", |b| {
        let calculator = FlatRateCalculator::new(&kwh);
        let totals = ConsumptionTotals::dual("lwbp", 100.0, "wbp", 50.0);
        b.iter(|| calculator.price(black_box(&totals)));
    });

    group.finish();
}

fn benchmark_monthly_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("monthly_compute");

    let pdam = month_of_records(&["usage"]);
    group.bench_function("aggregate_pdam", |b| {
        b.iter(|| ConsumptionAggregator::aggregate(UtilityStream::Pdam, black_box(&pdam)));
    });

    let kwh = month_of_records(&["lwbp", "wbp"]);
    group.bench_function("compute_kwh_tm", |b| {
        b.iter(|| Engine::compute(UtilityStream::KwhTm, black_box(&kwh), None, CostMode::Auto));
    });

    let heat_pump = month_of_records(&["inlet", "outlet"]);
    group.bench_function("evaluate_heat_pump", |b| {
        b.iter(|| {
            Engine::compute(
                UtilityStream::HeatPump,
                black_box(&heat_pump),
                None,
                CostMode::Auto,
            )
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_tariffs, benchmark_monthly_compute);
criterion_main!(benches);

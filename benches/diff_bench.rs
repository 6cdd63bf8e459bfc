use balance_watch::{Asset, AssetWrapper, BalanceSnapshot, FeeCalculator, Money, diff, logic::fee_eligible};
use criterion::{Criterion, criterion_group, criterion_main};
use lazy_static::lazy_static;
use std::hint::black_box;
use std::sync::Arc;

lazy_static! {
    static ref WAVES: AssetWrapper = Arc::new(Asset::builder("WAVES").precision(8).ticker("WAVES").build());
    static ref TOKENS: Vec<AssetWrapper> = (0..1000)
        .map(|i| {
            let builder = Asset::builder(format!("token-{i:04}")).precision((i % 9) as u8);
            // Every tenth token is sponsored.
            let builder = if i % 10 == 0 { builder.min_sponsored_fee(1 + i as u64) } else { builder };
            Arc::new(builder.build())
        })
        .collect();
}

fn snapshot(shift: u64, skip: usize) -> BalanceSnapshot {
    let mut balances = BalanceSnapshot::new();
    balances.insert("WAVES".to_string(), Money::new(500_000_000, WAVES.clone()));
    for (i, asset) in TOKENS.iter().enumerate().skip(skip) {
        let coins = if i % 100 == 0 { 1_000_000 + shift } else { 1_000_000 };
        balances.insert(asset.get_id().to_string(), Money::new(coins, asset.clone()));
    }
    balances
}

fn benchmark_diff(c: &mut Criterion) {
    let old = snapshot(0, 0);
    let same = snapshot(0, 0);
    let changed = snapshot(7, 0);
    let shrunk = snapshot(0, 3);

    let mut group = c.benchmark_group("diff");
    group.bench_function("unchanged_1000", |b| b.iter(|| diff(black_box(&old), black_box(&same))));
    group.bench_function("ten_changed_1000", |b| b.iter(|| diff(black_box(&old), black_box(&changed))));
    group.bench_function("three_removed_1000", |b| b.iter(|| diff(black_box(&old), black_box(&shrunk))));
    group.finish();
}

fn benchmark_fees(c: &mut Criterion) {
    let balances = snapshot(0, 0);
    let fee_list = fee_eligible(&balances);
    let base_fee = Money::new(250_000, WAVES.clone());
    let calculator = FeeCalculator::new();

    let mut group = c.benchmark_group("fees");
    group.bench_function("fee_eligible_1000", |b| b.iter(|| fee_eligible(black_box(&balances))));
    group.bench_function("convert_101", |b| b.iter(|| calculator.convert(black_box(&fee_list), black_box(&base_fee))));
    group.finish();
}

criterion_group!(benches, benchmark_diff, benchmark_fees);
criterion_main!(benches);

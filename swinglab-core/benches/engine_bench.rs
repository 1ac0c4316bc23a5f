//! Criterion benchmarks for SwingLab hot paths.
//!
//! Benchmarks:
//! 1. EMA smoothing over a game-length series with gaps
//! 2. Full single-series replay (smoothing + screening + exit state machine)

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swinglab_core::domain::{PricePoint, PriceSeries, StrategyParams};
use swinglab_core::smoothing::smooth_with_gaps;
use swinglab_core::strategy::replay_series;

// ── Helpers ──────────────────────────────────────────────────────────

/// A per-second series oscillating around 0.45 with a gap every 97 samples.
fn make_series(n: usize) -> PriceSeries {
    let t0 = Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let price = if i % 97 == 0 && i > 0 {
                None
            } else {
                let cents = (45.0 + (i as f64 * 0.01).sin() * 20.0).round();
                Some(cents / 100.0)
            };
            PricePoint::new(t0 + Duration::seconds(i as i64), price)
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("smoothing");
    for n in [3_600usize, 14_400] {
        let raw = make_series(n).raw_prices();
        group.bench_with_input(BenchmarkId::from_parameter(n), &raw, |b, raw| {
            b.iter(|| smooth_with_gaps(black_box(0.25), black_box(raw)))
        });
    }
    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_series");
    let params = StrategyParams::default();
    for n in [3_600usize, 14_400] {
        let series = make_series(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, series| {
            b.iter(|| replay_series(black_box(series), black_box(&params), 2.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_smoothing, bench_replay);
criterion_main!(benches);

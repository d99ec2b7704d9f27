//! Performance benchmarks for fixed-point arithmetic
//!
//! The pricing curves call `pow` several times per trade, so `ln`/`exp`
//! dominate the hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use types::FixedPoint;

fn fp(s: &str) -> FixedPoint {
    FixedPoint::from_decimal_str(s).unwrap()
}

fn bench_mul_div(c: &mut Criterion) {
    let x = fp("100000.123456789");
    let y = fp("1.000273972602739726");
    let d = fp("3.14159");

    c.bench_function("mul_down", |b| {
        b.iter(|| black_box(x).mul_down(black_box(y)))
    });

    c.bench_function("mul_div_up", |b| {
        b.iter(|| black_box(x).mul_div_up(black_box(y), black_box(d)))
    });
}

fn bench_transcendental(c: &mut Criterion) {
    let reserves = fp("200000");
    let exponent = fp("0.988889");

    c.bench_function("ln", |b| b.iter(|| black_box(reserves).ln()));

    c.bench_function("exp", |b| b.iter(|| black_box(exponent).exp()));

    c.bench_function("pow_curve_exponent", |b| {
        b.iter(|| black_box(reserves).pow(black_box(exponent)))
    });
}

criterion_group!(benches, bench_mul_div, bench_transcendental);
criterion_main!(benches);

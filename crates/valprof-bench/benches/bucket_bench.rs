//! Bucketing benchmarks.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use valprof_core::{RangeSpec, memop_rep_value};

fn bench_memop(c: &mut Criterion) {
    let sizes: Vec<u64> = (0..1024).map(|i| (i * 37) % 4096).collect();
    c.bench_function("memop_rep_value_1024", |b| {
        b.iter(|| {
            let mut acc = 0_u64;
            for &size in &sizes {
                acc = acc.wrapping_add(memop_rep_value(black_box(size)));
            }
            acc
        });
    });
}

fn bench_range(c: &mut Criterion) {
    let spec = RangeSpec::new(0, 64, Some(4096));
    let values: Vec<u64> = (0..1024).map(|i| (i * 131) % 8192).collect();
    c.bench_function("range_bucket_1024", |b| {
        b.iter(|| {
            let mut acc = 0_u64;
            for &value in &values {
                acc = acc.wrapping_add(black_box(spec).bucket(value));
            }
            acc
        });
    });
}

criterion_group!(benches, bench_memop, bench_range);
criterion_main!(benches);

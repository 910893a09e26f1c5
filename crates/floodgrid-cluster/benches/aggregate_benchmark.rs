//! Performance benchmarks for cluster aggregation.
//!
//! ## Running the benchmarks
//!
//! ```bash
//! cargo bench -p floodgrid-cluster
//! ```
//!
//! ## Benchmarks included
//!
//! - `aggregate/shard_size/N` - One zoom level over a fixed point set with shard size N
//! - `generate/mode/M` - All zoom levels of one date in flat or hierarchical mode

use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use floodgrid_cluster::{
    ClusterAggregator, FloodgridConfig, GenerationMode, GenerationStore, HierarchyBuilder, InMemoryPointStore,
    RawPoint, ReturnPeriod, RiskClassifier, ZoomPrecisionMap,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const POINT_COUNT: usize = 200_000;

fn points(count: usize) -> Vec<RawPoint> {
    let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0xF100D);
    (0..count)
        .map(|_| {
            RawPoint::new(
                date,
                rng.gen_range(25.0..50.0),
                rng.gen_range(-125.0..-65.0),
                rng.gen_range(0.0..1.0),
                ReturnPeriod::ALL[rng.gen_range(0..3)],
            )
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let data = points(POINT_COUNT);
    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(POINT_COUNT as u64));

    for shard_size in [POINT_COUNT, 65_536, 8_192] {
        let aggregator = ClusterAggregator::new(ZoomPrecisionMap::production(), RiskClassifier::default())
            .with_shard_size(shard_size);
        group.bench_with_input(BenchmarkId::new("shard_size", shard_size), &data, |b, data| {
            b.iter(|| black_box(aggregator.aggregate(data, 4).unwrap().clusters.len()));
        });
    }
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(10);

    for mode in [GenerationMode::Flat, GenerationMode::Hierarchical] {
        let source = Arc::new(InMemoryPointStore::new());
        source.ingest(points(50_000));
        let config = FloodgridConfig {
            mode,
            ..Default::default()
        };
        let builder = HierarchyBuilder::new(&config, source, Arc::new(GenerationStore::new())).unwrap();

        group.bench_function(BenchmarkId::new("mode", mode), |b| {
            b.iter(|| black_box(builder.regenerate(None).unwrap().cluster_count()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_generate);
criterion_main!(benches);

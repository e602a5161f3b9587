//! Benchmarks for the range engine and list rebuilds.
//!
//! Run with: cargo bench
//!
//! Measures:
//! - Decomposition of single runs (aligned, unaligned, IPv6)
//! - Coalescing + decomposition of sorted range streams
//! - A full list rebuild against an in-memory database

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rackradar::addr::AddrRange;
use rackradar::range::{decompose, minimal_cover};
use rackradar::{Field, Importer, ListDefinition, ListRebuilder, NetBlock, SqliteStore};

/// Deterministic sorted ranges: `count` /24-ish blocks with gaps and overlaps.
fn generate_ranges(count: u32) -> Vec<AddrRange<u32>> {
    let mut ranges: Vec<_> = (0..count)
        .map(|i| {
            let start = 0x0a00_0000 + i * 200;
            let len = if i % 7 == 0 { 511 } else { 255 };
            AddrRange {
                start,
                end: start + len,
            }
        })
        .collect();
    ranges.sort();
    ranges
}

fn bench_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");

    group.bench_function("aligned_v4", |b| {
        let run = AddrRange {
            start: 0x0a00_0000u32,
            end: 0x0aff_ffff,
        };
        b.iter(|| decompose(black_box(run)).count())
    });

    group.bench_function("unaligned_v4", |b| {
        let run = AddrRange {
            start: 0x0a00_0001u32,
            end: 0xfffe_fffe,
        };
        b.iter(|| decompose(black_box(run)).count())
    });

    group.bench_function("unaligned_v6", |b| {
        let run = AddrRange {
            start: 1u128,
            end: u128::MAX - 1,
        };
        b.iter(|| decompose(black_box(run)).count())
    });

    group.finish();
}

fn bench_minimal_cover(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimal_cover");

    for size in [1_000u32, 10_000, 100_000].iter() {
        let ranges = generate_ranges(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("ranges", size), &ranges, |b, ranges| {
            b.iter(|| minimal_cover(ranges.iter().copied()).count())
        });
    }

    group.finish();
}

fn bench_list_rebuild(c: &mut Criterion) {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut import = Importer::begin(&store, "BENCH").unwrap();
    for (i, range) in generate_ranges(10_000).into_iter().enumerate() {
        let name = if i % 2 == 0 { "EVEN-NET" } else { "ODD-NET" };
        let template = NetBlock::new(rackradar::CidrBlock {
            addr: 0u32,
            prefix_len: 32,
        })
        .name(name);
        import.insert_range(range, &template).unwrap();
    }
    import.finish().unwrap();

    let lists = vec![ListDefinition::new("even").matching(Field::IpNetname, "EVEN-%")];

    let mut group = c.benchmark_group("list_rebuild");
    group.sample_size(10);
    group.bench_function("10k_netblocks", |b| {
        b.iter(|| ListRebuilder::new(&store, &lists).rebuild_all())
    });
    group.finish();
}

criterion_group!(benches, bench_decompose, bench_minimal_cover, bench_list_rebuild);

criterion_main!(benches);

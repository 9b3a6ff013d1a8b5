//! Criterion benchmarks for JSON parsing.
//!
//! Run with:
//!   cargo bench --bench json

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddstore::json::{self, ParseFlags};
use ddstore::SymbolTable;

fn array_of_objects(n: usize) -> String {
    let items: Vec<String> = (0..n)
        .map(|i| format!(r#"{{"id": {i}, "name": "item_{i}", "active": true, "score": {:.3}}}"#, i as f64 * 0.5))
        .collect();
    format!("[{}]", items.join(","))
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_parse");

    for &n in &[16usize, 256, 4096] {
        let src = array_of_objects(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", n), &src, |b, src| {
            b.iter(|| {
                let mut symbols = SymbolTable::new();
                json::parse(src.as_bytes(), &mut symbols, ParseFlags::default()).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_parse_with_hints(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_parse_with_hints");

    for &n in &[16usize, 256] {
        let src = array_of_objects(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_and_print", n), &src, |b, src| {
            b.iter(|| {
                let mut symbols = SymbolTable::new();
                let (store, tree) = ddstore::hint::parse(src.as_bytes(), &mut symbols, ParseFlags::default()).unwrap();
                ddstore::hint::print(&store, &symbols, src.as_bytes(), &tree)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_parse_with_hints);
criterion_main!(benches);

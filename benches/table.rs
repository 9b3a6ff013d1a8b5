//! Criterion benchmarks for table insertion and lookup.
//!
//! Run with:
//!   cargo bench --bench table

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddstore::store::table;
use ddstore::{DataNode, DataStore, SymbolTable};

fn build_table(n: u32) -> (DataStore, SymbolTable, ddstore::Handle) {
    let mut store = DataStore::new();
    let mut symbols = SymbolTable::new();
    let h = store.make_table();
    for i in 0..n {
        let sym = symbols.intern(&format!("key_{i}"));
        table::set(&mut store, h, sym, DataNode::Int32Small(i as i32)).unwrap();
    }
    (store, symbols, h)
}

fn bench_table_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert");

    for &n in &[16u32, 256, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("set", n), &n, |b, &n| {
            b.iter(|| {
                let (store, symbols, h) = build_table(n);
                (store, symbols, h)
            })
        });
    }

    group.finish();
}

fn bench_table_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_lookup");

    for &n in &[16u32, 256, 4096] {
        let (store, mut symbols, h) = build_table(n);
        let lookup_sym = symbols.intern(&format!("key_{}", n / 2));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("get", n), &lookup_sym, |b, &sym| {
            b.iter(|| table::get(&store, h, sym).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_table_insert, bench_table_lookup);
criterion_main!(benches);

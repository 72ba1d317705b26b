//! Criterion measurement of the nested array-literal tokenizer on flat and nested inputs of
//! growing width.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use extdb::literal::tokenize;

fn flat_literal(width: usize) -> String {
    let fields: Vec<String> = (0..width)
        .map(|i| {
            if i % 2 == 0 {
                format!("\"name {i} with \"\"quotes\"\"\"")
            } else {
                format!("{i}.5e-3")
            }
        })
        .collect();
    format!("[{}]", fields.join(","))
}

fn nested_literal(width: usize) -> String {
    let fields: Vec<String> = (0..width)
        .map(|i| format!("[{i},[\"]\",<obj {i}>],[]]"))
        .collect();
    format!("[{}]", fields.join(", "))
}

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("literal_tokenizer");
    for width in [4usize, 32, 256] {
        let flat = flat_literal(width);
        group.throughput(Throughput::Bytes(flat.len() as u64));
        group.bench_with_input(BenchmarkId::new("flat", width), &flat, |b, input| {
            b.iter(|| tokenize(black_box(input)));
        });

        let nested = nested_literal(width);
        group.throughput(Throughput::Bytes(nested.len() as u64));
        group.bench_with_input(BenchmarkId::new("nested", width), &nested, |b, input| {
            b.iter(|| tokenize(black_box(input)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenizer);
criterion_main!(benches);

use std::{fmt::Write as _, hint::black_box, iter::repeat_with, sync::Arc};

use columnload::{
    csv::{ChunkEncoder, CsvOptions},
    pipeline::{JobOutcome, Pipeline, PipelineOptions},
    sink::{MemoryConnector, Sink},
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SCHEMA: &str = "uint32,uint32,float64,string(25),date,string(44)";

fn lineitem_rows(rows: usize) -> Vec<u8> {
    let mut out = String::with_capacity(rows * 96);
    for key in 0..rows {
        let flag: String = repeat_with(fastrand::alphanumeric)
            .take(fastrand::usize(1..=25))
            .collect();
        let comment: String = repeat_with(fastrand::alphanumeric)
            .take(fastrand::usize(10..=44))
            .collect();
        let _ = writeln!(
            out,
            "{key}|{}|{}.{:02}|{flag}|{}-{:02}-{:02}|{comment}|",
            fastrand::u32(..200_000),
            fastrand::u32(..100_000),
            fastrand::u32(..100),
            fastrand::i32(1992..=1998),
            fastrand::u32(1..=12),
            fastrand::u32(1..=28),
        );
    }
    out.into_bytes()
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let options = CsvOptions::new(SCHEMA.parse().unwrap())
        .delimiter(b'|')
        .header(false)
        .max_chunk_size(1024 * 1024);

    for rows in [1_000, 10_000, 100_000] {
        let input = lineitem_rows(rows);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("lineitem", rows), &input, |b, input| {
            b.iter(|| {
                let mut total = 0;
                for chunk in ChunkEncoder::new(input, &options).unwrap() {
                    total += chunk.unwrap().num_rows();
                }
                black_box(total)
            })
        });
    }
    group.finish();
}

fn load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(20);
    let options = CsvOptions::new(SCHEMA.parse().unwrap())
        .delimiter(b'|')
        .header(false)
        .max_chunk_size(256 * 1024);
    let input = lineitem_rows(50_000);
    group.throughput(Throughput::Bytes(input.len() as u64));

    for threads in [1, 4] {
        group.bench_with_input(BenchmarkId::new("memory", threads), &threads, |b, &threads| {
            b.iter(|| {
                let pipeline = Pipeline::new(
                    Arc::new(MemoryConnector::default()),
                    PipelineOptions::default().threads(threads),
                )
                .unwrap();
                for chunk in ChunkEncoder::new(&input, &options).unwrap() {
                    let chunk = chunk.unwrap();
                    pipeline
                        .submit(chunk.memory_size(), move |sink| {
                            JobOutcome::from(sink.load_chunk("lineitem", &chunk))
                        })
                        .unwrap();
                }
                black_box(pipeline.shutdown())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, encode, load);
criterion_main!(benches);

/*!
 * Pipe Throughput Benchmarks
 *
 * Drain speed of the fixed-size read loop, and full round trips through cat
 */

use cowpipe::{CommandSpec, ExchangeMode, Harness, HarnessConfig, Pipe, PipeEnd};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs::File;
use std::io::Write;
use std::thread;

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipe_drain");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let payload = vec![0x5au8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let mut pipe = Pipe::new().unwrap();
                let mut writer = File::from(pipe.take(PipeEnd::Write).unwrap());
                let data = payload.clone();

                let handle = thread::spawn(move || writer.write_all(&data).unwrap());
                let output = pipe.read().unwrap();
                handle.join().unwrap();
                black_box(output)
            });
        });
    }

    group.finish();
}

fn bench_cat_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("cat_round_trip");
    group.sample_size(20);

    for mode in [ExchangeMode::Sequential, ExchangeMode::Concurrent] {
        let harness =
            Harness::fork(HarnessConfig::new(CommandSpec::new("cat")).with_mode(mode));
        let input = vec![b'x'; 16 * 1024];

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", mode)),
            &input,
            |b, input| {
                b.iter(|| black_box(harness.run(input).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_drain, bench_cat_round_trip);
criterion_main!(benches);

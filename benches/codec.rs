//! Benchmarks for the OSC codec and SLIP framing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mixer_osc_control::codec::{self, Argument};
use mixer_osc_control::network::slip::{self, SlipDecoder};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_message");
    let mut buffer = [0u8; 256];

    group.bench_function("single_float", |b| {
        b.iter(|| {
            codec::write_message(
                black_box(&mut buffer),
                black_box("/ch1/eq/0/f0"),
                black_box(&[Argument::Float32(1000.0)]),
            )
        })
    });

    group.bench_function("mixed", |b| {
        let args = [
            Argument::Int32(3),
            Argument::from("label"),
            Argument::Float64(0.25),
            Argument::Bool(true),
        ];
        b.iter(|| codec::write_message(black_box(&mut buffer), "/ch1/reverb/reverberators/3/gain", black_box(&args)))
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_message");

    for count in [1usize, 4, 16].iter() {
        let args: Vec<Argument<'_>> = (0..*count).map(|i| Argument::Float32(i as f32)).collect();
        let packet = codec::encode_message("/ch1/eq/0/gain", &args).unwrap_or_default();
        group.throughput(Throughput::Bytes(packet.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &packet, |b, packet| {
            b.iter(|| {
                let msg = codec::parse_message(black_box(packet)).ok()?;
                Some(msg.arguments().count())
            })
        });
    }

    group.finish();
}

fn bench_slip(c: &mut Criterion) {
    let mut group = c.benchmark_group("slip");
    let packet = codec::encode_message("/ch1/eq/0/f0", &[Argument::Float32(1000.0)]).unwrap_or_default();

    let mut stream = Vec::new();
    for _ in 0..64 {
        slip::encode(&packet, &mut stream);
    }
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("decode_64_frames", |b| {
        let mut decoder = SlipDecoder::new(2048);
        b.iter(|| {
            let mut frames = 0;
            decoder.decode(black_box(&stream), |_| frames += 1);
            frames
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_slip);
criterion_main!(benches);

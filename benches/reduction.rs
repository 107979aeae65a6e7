//! Criterion benchmarks for burst reduction.
//!
//! Reduction runs once per pass on the blocking pool; these benchmarks track
//! how it scales with frame size and burst length.
//!
//! Run with: cargo bench --bench reduction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ptc_tools::hardware::Frame;
use ptc_tools::ptc::{reduce, Burst};

fn synthetic_burst(side: u32, frames: usize) -> Burst {
    let pixels = (side * side) as usize;
    let frames = (0..frames)
        .map(|f| {
            let data: Vec<u16> = (0..pixels)
                .map(|p| (100 + (p * 7 + f * 13) % 50) as u16)
                .collect();
            Frame::from_u16(side, side, &data)
        })
        .collect();
    Burst::new(0.1, frames).unwrap()
}

/// Reduction throughput for square frames of increasing size.
fn reduce_frame_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_frame_size");

    for side in [64u32, 256, 512] {
        let burst = synthetic_burst(side, 16);
        group.throughput(Throughput::Elements((side * side) as u64 * 16));
        group.bench_with_input(BenchmarkId::new("16_frames", side), &burst, |b, burst| {
            b.iter(|| reduce(black_box(burst)).unwrap());
        });
    }

    group.finish();
}

/// Reduction cost as the burst grows at a fixed frame size.
fn reduce_burst_lengths(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_burst_length");

    for frames in [2usize, 10, 100] {
        let burst = synthetic_burst(128, frames);
        group.throughput(Throughput::Elements(128 * 128 * frames as u64));
        group.bench_with_input(BenchmarkId::new("128x128", frames), &burst, |b, burst| {
            b.iter(|| reduce(black_box(burst)).unwrap());
        });
    }

    group.finish();
}

/// Scalar statistics over per-frame spatial means.
fn frame_statistics(c: &mut Criterion) {
    let burst = synthetic_burst(256, 32);
    c.bench_function("frame_statistics_256x256x32", |b| {
        b.iter(|| black_box(&burst).frame_statistics());
    });
}

criterion_group!(benches, reduce_frame_sizes, reduce_burst_lengths, frame_statistics);
criterion_main!(benches);

//! PHY throughput benchmarks
//!
//! Run with: cargo bench -p phylink-core --bench phy_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phylink_core::coding::{ConvolutionalEncoder, ViterbiDecoder};
use phylink_core::prelude::*;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

// ============================================================================
// Coding
// ============================================================================

fn bench_viterbi(c: &mut Criterion) {
    let mut group = c.benchmark_group("viterbi");

    for len in [256usize, 4096] {
        let bits = bytes_to_bits(&payload(len / 8));
        let soft: Vec<f64> = ConvolutionalEncoder::new()
            .encode(&bits)
            .iter()
            .map(|&b| if b == 0 { 1.0 } else { -1.0 })
            .collect();
        let decoder = ViterbiDecoder::new();

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("decode", len), &soft, |b, soft| {
            b.iter(|| decoder.decode(black_box(soft), false))
        });
    }

    group.finish();
}

// ============================================================================
// Full frames
// ============================================================================

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("ofdm_frame");
    let phy = OfdmPhy::new();
    let bits = bytes_to_bits(&payload(1500));

    for (label, legacy, selector, bw) in [
        ("legacy_6mbps", true, 12, 20),
        ("legacy_54mbps", true, 108, 20),
        ("ht20_mcs7", false, 7, 20),
        ("ht40_mcs7", false, 7, 40),
    ] {
        let config = PhyConfig::resolve(legacy, selector, bw).unwrap();
        let samples = phy.generate(&bits, &config, 0.0).unwrap();
        group.throughput(Throughput::Bytes(1500));

        group.bench_function(BenchmarkId::new("generate", label), |b| {
            b.iter(|| phy.generate(black_box(&bits), &config, 0.0))
        });
        group.bench_function(BenchmarkId::new("recover", label), |b| {
            b.iter(|| phy.recover(black_box(&samples), &config, 0.0, 0.0))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_viterbi, bench_frames);
criterion_main!(benches);

// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Benchmarks for descriptor assembly and the job ring submit/complete path.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sec4_rust::sim::{SoftDmaMapper, SoftJobRing};
use sec4_rust::{
    AddressWidth, Class, DescriptorBuilder, DmaAddr, HeaderOptions, IpsecAuth, IpsecCipher,
    JobRing, JobStatus, Key, Operation, ProtocolDir, ProtocolOp, RingConfig, SeqPtr,
};

/// Benchmark building an IPsec job descriptor with keys of growing size.
fn bench_build(c: &mut Criterion) {
    let key_sizes: Vec<usize> = vec![
        16, // AES-128
        32, // AES-256
        64, // HMAC split key
    ];

    let mut group = c.benchmark_group("build");

    for size in key_sizes {
        let key = vec![0x5au8; size];
        let op = ProtocolOp::ipsec(ProtocolDir::Encap, IpsecCipher::AesCbc, IpsecAuth::HmacSha1_96)
            .unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("ipsec_encap", size), &key, |b, key| {
            b.iter(|| {
                let mut d = DescriptorBuilder::job(AddressWidth::Narrow);
                d.push(&Key::inline(Class::Class2, key)).unwrap();
                d.push(&SeqPtr::input(DmaAddr(0x1000), 1500)).unwrap();
                d.push(&SeqPtr::output(DmaAddr(0x2000), 1536)).unwrap();
                d.push(&Operation::from(op)).unwrap();
                black_box(d.finish(HeaderOptions::default()).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark one submit, completion and poll on the software ring.
fn bench_ring(c: &mut Criterion) {
    let batches: Vec<usize> = vec![1, 16, 64];

    let mut group = c.benchmark_group("ring");

    for batch in batches {
        let hw = Arc::new(SoftJobRing::new());
        let mut config = RingConfig::new();
        config.set_depth(64).set_budget(64);
        let ring = JobRing::new(0, config, hw.clone(), Arc::new(SoftDmaMapper::new())).unwrap();
        ring.start().unwrap();
        let descs: Vec<_> = (0..batch)
            .map(|_| {
                Arc::new(
                    DescriptorBuilder::job(AddressWidth::Narrow)
                        .finish(HeaderOptions::default())
                        .unwrap(),
                )
            })
            .collect();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("submit_poll", batch), &descs, |b, descs| {
            b.iter(|| {
                for d in descs {
                    ring.submit(d.clone(), Box::new(|_, o| {
                        black_box(o);
                    }))
                    .unwrap();
                }
                hw.complete_all_in_order(JobStatus::OK);
                ring.handle_interrupt();
                black_box(ring.poll(64).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_ring);
criterion_main!(benches);

// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Basic example: build an IPsec shared descriptor and a job descriptor that
//! references it, then run jobs through a ring pool on the software ring.
//!
//! Run with: `cargo run --example basic`

use std::sync::Arc;

use sec4_rust::sim::{SoftDmaMapper, SoftJobRing};
use sec4_rust::{
    AddressWidth, Class, DescriptorBuilder, DmaAddr, HeaderOptions, IpsecAuth, IpsecCipher,
    JobRing, JobStatus, Key, Operation, ProtocolDir, ProtocolOp, RingConfig, RingPool, SecEngine,
    SecError, SeqPtr, SharePolicy,
};

fn build_shared() -> Result<sec4_rust::Descriptor, SecError> {
    let cipher_key = [0x2bu8; 16];
    let auth_key = [0x7eu8; 20];
    let mut b = DescriptorBuilder::shared(AddressWidth::Narrow);
    b.push(&Key::inline(Class::Class1, &cipher_key))?;
    b.push(&Key::inline(Class::Class2, &auth_key))?;
    let op = ProtocolOp::ipsec(ProtocolDir::Encap, IpsecCipher::AesCbc, IpsecAuth::HmacSha1_96)?;
    b.push(&Operation::from(op))?;
    b.finish(HeaderOptions::with_share(SharePolicy::Serial))
}

fn build_job(shared: DmaAddr, shared_len: usize, seq: u32) -> Result<sec4_rust::Descriptor, SecError> {
    let mut b = DescriptorBuilder::job_with_shared(AddressWidth::Narrow, shared, shared_len)?;
    let base = 0x10_0000 + seq * 0x1000;
    b.push(&SeqPtr::output(DmaAddr(u64::from(base) + 0x800), 1536))?;
    b.push(&SeqPtr::input(DmaAddr(u64::from(base)), 1500))?;
    b.finish(HeaderOptions::with_share(SharePolicy::Defer))
}

fn main() {
    println!("SEC4 Basic Example");
    println!("==================\n");

    println!("Building shared descriptor...");
    let shared = match build_shared() {
        Ok(d) => d,
        Err(e) => {
            println!("  Failed: {e}");
            return;
        }
    };
    println!("  {} words:", shared.len());
    for (i, w) in shared.words().iter().enumerate() {
        println!("    [{i:2}] {w:#010x}");
    }
    println!();

    println!("Rejecting an illegal suite...");
    match ProtocolOp::ipsec(ProtocolDir::Decap, IpsecCipher::AesGcm16, IpsecAuth::HmacSha1_96) {
        Ok(_) => println!("  Unexpectedly accepted"),
        Err(e) => println!("  {e} (errno {})", e.errno()),
    }
    println!();

    println!("Opening software job rings...");
    let dma = Arc::new(SoftDmaMapper::new());
    let hws: Vec<_> = (0..2).map(|_| Arc::new(SoftJobRing::new())).collect();
    let mut config = RingConfig::new();
    config.set_depth(16);
    let mut rings = Vec::new();
    for (id, hw) in hws.iter().enumerate() {
        match JobRing::new(id, config, hw.clone(), dma.clone()).and_then(|r| r.start().map(|_| r)) {
            Ok(r) => rings.push(r),
            Err(e) => {
                println!("  Ring {id} failed: {e}");
                return;
            }
        }
    }
    let pool = RingPool::new(rings);
    let engine = match SecEngine::open(&pool, 2) {
        Ok(engine) => engine,
        Err(e) => {
            println!("  Failed to open engine: {e}");
            return;
        }
    };
    println!("  {} rings, {} free\n", pool.len(), pool.free_count());

    println!("Submitting jobs...");
    // Bus address the shared descriptor was mapped at.
    let shared_addr = DmaAddr(0x8000_0000);
    for seq in 0..4 {
        let job = match build_job(shared_addr, shared.len(), seq) {
            Ok(d) => Arc::new(d),
            Err(e) => {
                println!("  Job {seq}: build failed: {e}");
                continue;
            }
        };
        let res = engine.submit(
            job,
            Box::new(move |desc, outcome| {
                println!("  Job {seq} ({} words): {outcome}", desc.len());
            }),
        );
        match res {
            Ok(ring) => println!("  Job {seq} on ring {ring}"),
            Err(e) => println!("  Job {seq} rejected: {e}"),
        }
    }
    println!();

    println!("Completing jobs (ring 1 reports an ICV failure)...");
    hws[0].complete_all_in_order(JobStatus::OK);
    hws[1].complete_all_in_order(JobStatus(0x2000_004a));
    match engine.service() {
        Ok(n) => println!("  Delivered {n} completions"),
        Err(e) => println!("  Service failed: {e}"),
    }
    println!();

    match engine.close(&pool) {
        Ok(()) => println!("Closed, {} rings free", pool.free_count()),
        Err(errs) => {
            for e in errs {
                println!("Ring {} not returned: {}", e.handle.id(), e.error);
            }
        }
    }
    println!("Done!");
}

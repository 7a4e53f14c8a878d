// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Descriptor construction through ring completion on the software ring.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sec4_rust::sim::{SoftDmaMapper, SoftJobRing};
use sec4_rust::{
    AddressWidth, Class, Command, Descriptor, DescriptorBuilder, DmaAddr, HeaderOptions,
    IpsecAuth, IpsecCipher, JobOutcome, JobRing, JobRingRegs, JobStatus, Key, Operation,
    ProtocolDir, ProtocolOp, RingConfig, RingPool, RingState, SecError,
};

fn ring(depth: usize) -> (JobRing, Arc<SoftJobRing>, Arc<SoftDmaMapper>) {
    let hw = Arc::new(SoftJobRing::new());
    let dma = Arc::new(SoftDmaMapper::new());
    let mut config = RingConfig::new();
    config.set_depth(depth);
    let ring = JobRing::new(0, config, hw.clone(), dma.clone()).unwrap();
    ring.start().unwrap();
    (ring, hw, dma)
}

fn bus(desc: &Descriptor) -> DmaAddr {
    DmaAddr(desc.image().as_ptr() as usize as u64)
}

fn minimal_descriptor() -> Arc<Descriptor> {
    let mut b = DescriptorBuilder::job(AddressWidth::Narrow);
    let key = Key::inline(Class::Class2, &[0xa5; 16]);
    assert_eq!(b.push(&key).unwrap(), 1);
    let op = ProtocolOp::ipsec(ProtocolDir::Encap, IpsecCipher::AesCbc, IpsecAuth::HmacSha1_96)
        .unwrap();
    let at = b.push(&Operation::from(op)).unwrap();
    assert_eq!(at, 1 + key.word_count(AddressWidth::Narrow));
    Arc::new(b.finish(HeaderOptions::default()).unwrap())
}

#[test]
fn test_single_job_fifo_completion() {
    let (ring, hw, _dma) = ring(4);
    let desc = minimal_descriptor();
    let header = desc.header().unwrap();
    assert_eq!(header.length, desc.len());
    assert_eq!(header.start_index, 1);

    let seen = Arc::new(spin::Mutex::new(Vec::new()));
    let log = seen.clone();
    ring.submit(desc.clone(), Box::new(move |d, o| log.lock().push((d, o))))
        .unwrap();
    assert_eq!(ring.in_flight(), 1);
    assert_eq!(hw.input_slots_available(), 3);

    assert_eq!(hw.complete_all_in_order(JobStatus::OK), 1);
    let res = ring.poll(4).unwrap();
    assert_eq!(res.processed, 1);
    assert!(res.complete);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(Arc::ptr_eq(&seen[0].0, &desc));
    assert_eq!(seen[0].1, JobOutcome::Completed(JobStatus::OK));
    assert_eq!(ring.in_flight(), 0);
    assert_eq!(hw.input_slots_available(), 4);
    assert!(ring.is_idle());
}

#[test]
fn test_mapped_bytes_carry_inline_key_verbatim() {
    let (ring, hw, _dma) = ring(4);
    let key: Vec<u8> = (0u8..16).collect();
    let mut b = DescriptorBuilder::job(AddressWidth::Narrow);
    b.push(&Key::inline(Class::Class2, &key)).unwrap();
    let desc = Arc::new(b.finish(HeaderOptions::default()).unwrap());

    ring.submit(desc.clone(), Box::new(|_, _| {})).unwrap();
    let addr = hw.fetch().unwrap();

    // The software mapper is the identity, so the bus address is the buffer.
    let device = unsafe {
        std::slice::from_raw_parts(addr.get() as usize as *const u8, desc.byte_len())
    };
    assert_eq!(device, desc.to_be_bytes().as_slice());
    assert_eq!(&device[..4], &desc.words()[0].to_be_bytes());
    assert_eq!(&device[4..8], &desc.words()[1].to_be_bytes());
    assert_eq!(&device[8..24], key.as_slice());

    hw.complete(addr, JobStatus::OK);
    ring.poll(4).unwrap();
    assert!(ring.is_idle());
}

#[test]
fn test_out_of_order_completion_keeps_oldest() {
    let (ring, hw, _dma) = ring(4);
    let order = Arc::new(spin::Mutex::new(Vec::new()));
    let descs: Vec<_> = (0..3).map(|_| minimal_descriptor()).collect();
    for (i, d) in descs.iter().enumerate() {
        let order = order.clone();
        ring.submit(d.clone(), Box::new(move |_, _| order.lock().push(i)))
            .unwrap();
    }
    for d in &descs {
        assert_eq!(hw.fetch(), Some(bus(d)));
    }

    // C completes first: A is still the oldest outstanding entry.
    hw.complete(bus(&descs[2]), JobStatus::OK);
    assert_eq!(ring.poll(8).unwrap().processed, 1);
    assert_eq!(ring.in_flight(), 3);

    // A completes: the tail moves past A and stops at B.
    hw.complete(bus(&descs[0]), JobStatus::OK);
    assert_eq!(ring.poll(8).unwrap().processed, 1);
    assert_eq!(ring.in_flight(), 2);

    // B completes: the tail moves past B and the already matched C.
    hw.complete(bus(&descs[1]), JobStatus::OK);
    assert_eq!(ring.poll(8).unwrap().processed, 1);
    assert_eq!(ring.in_flight(), 0);

    assert_eq!(*order.lock(), vec![2, 0, 1]);
    assert!(ring.is_idle());
}

#[test]
fn test_abandon_aborts_each_job_once() {
    let (ring, hw, dma) = ring(8);
    let aborted = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let aborted = aborted.clone();
        ring.submit(
            minimal_descriptor(),
            Box::new(move |_, o| {
                assert!(o.is_aborted());
                aborted.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    }

    assert_eq!(ring.abandon(), 5);
    assert_eq!(aborted.load(Ordering::SeqCst), 5);
    assert_eq!(ring.state(), RingState::Reset);
    assert_eq!(ring.in_flight(), 0);
    assert_eq!(hw.pending(), 0);
    assert_eq!(dma.live_mappings(), 2);

    assert_eq!(
        ring.submit(minimal_descriptor(), Box::new(|_, _| {})),
        Err(SecError::NotRunning("reset"))
    );
    ring.start().unwrap();
    ring.submit(minimal_descriptor(), Box::new(|_, _| {})).unwrap();
    assert_eq!(aborted.load(Ordering::SeqCst), 5);
}

#[test]
fn test_allocator_exclusion() {
    let hw = Arc::new(SoftJobRing::new());
    let ring = JobRing::new(0, RingConfig::new(), hw.clone(), Arc::new(SoftDmaMapper::new()))
        .unwrap();
    ring.start().unwrap();
    let pool = RingPool::new(vec![ring]);

    let results = std::thread::scope(|s| {
        let a = s.spawn(|| pool.register());
        let b = s.spawn(|| pool.register());
        [a.join().unwrap(), b.join().unwrap()]
    });
    let (ok, err): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    assert_eq!(ok.len(), 1);
    assert_eq!(err.len(), 1);
    assert!(matches!(err[0], Err(SecError::NoDevice)));

    let handle = ok.into_iter().next().unwrap().unwrap();
    handle
        .submit(minimal_descriptor(), Box::new(|_, _| {}))
        .unwrap();
    let err = pool.deregister(handle).unwrap_err();
    assert_eq!(err.error, SecError::RingBusy(0));
    assert_eq!(pool.free_count(), 0);

    hw.complete_all_in_order(JobStatus::OK);
    err.handle.ring().poll(16).unwrap();
    pool.deregister(err.handle).unwrap();
    assert_eq!(pool.free_count(), 1);
}

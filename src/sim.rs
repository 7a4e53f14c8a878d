// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Software-emulated job ring hardware.
//!
//! [`SoftJobRing`] implements [`JobRingRegs`] on plain memory. It does not
//! execute descriptors: the caller plays the accelerator by fetching
//! submitted addresses with [`SoftJobRing::fetch`] and posting completions,
//! in any order, with [`SoftJobRing::complete`]. [`SoftDmaMapper`] maps
//! buffers to their own addresses.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::command::DmaAddr;
use crate::error::{SecError, SecResult};
use crate::hw::{DmaDirection, DmaMapper, IntStatus, JobRingRegs, RingLayout, RingMemory};
use crate::index::RingIndex;
use crate::status::JobStatus;

#[derive(Debug)]
struct SimState {
    memory: Option<Arc<RingMemory>>,
    depth: usize,
    /// Next input entry hardware will read.
    fetch: RingIndex,
    /// Entries added by the driver and not yet fetched.
    pending: usize,
    /// Next output entry hardware will write.
    out_head: RingIndex,
    out_full: usize,
    status: IntStatus,
    masked: bool,
    coalesce_count: u32,
    coalesce_timer: u32,
}

impl SimState {
    fn unconfigured() -> Self {
        Self {
            memory: None,
            depth: 0,
            fetch: RingIndex::zero(1),
            pending: 0,
            out_head: RingIndex::zero(1),
            out_full: 0,
            status: IntStatus::empty(),
            masked: true,
            coalesce_count: 1,
            coalesce_timer: 0,
        }
    }
}

/// Software job ring registers.
#[derive(Debug)]
pub struct SoftJobRing {
    state: spin::Mutex<SimState>,
}

impl Default for SoftJobRing {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftJobRing {
    pub fn new() -> Self {
        Self {
            state: spin::Mutex::new(SimState::unconfigured()),
        }
    }

    /// Take the next submitted descriptor address off the input ring.
    pub fn fetch(&self) -> Option<DmaAddr> {
        let mut s = self.state.lock();
        if s.pending == 0 {
            return None;
        }
        let memory = s.memory.clone()?;
        let addr = memory.input_slot(s.fetch.slot());
        s.fetch = s.fetch.advance(1);
        s.pending -= 1;
        Some(addr)
    }

    /// Post a completion on the output ring.
    ///
    /// Raises the completion interrupt once the coalescing count is reached.
    pub fn complete(&self, addr: DmaAddr, status: JobStatus) {
        let mut s = self.state.lock();
        let Some(memory) = s.memory.clone() else {
            log::warn!("soft job ring: completion before configuration dropped");
            return;
        };
        debug_assert!(s.out_full < s.depth, "output ring overrun");
        memory.set_output_slot(s.out_head.slot(), addr, status);
        s.out_head = s.out_head.advance(1);
        s.out_full += 1;
        if s.out_full >= s.coalesce_count as usize {
            s.status |= IntStatus::JOB;
        }
    }

    /// Fetch everything pending and complete it in submission order.
    pub fn complete_all_in_order(&self, status: JobStatus) -> usize {
        let mut n = 0;
        while let Some(addr) = self.fetch() {
            self.complete(addr, status);
            n += 1;
        }
        n
    }

    /// Signal an unrecoverable ring error.
    pub fn raise_error(&self) {
        self.state.lock().status |= IntStatus::ERROR;
    }

    /// Fire the coalescing timer: raise the completion interrupt for any
    /// completions below the count threshold.
    pub fn tick(&self) {
        let mut s = self.state.lock();
        if s.coalesce_timer > 0 && s.out_full > 0 {
            s.status |= IntStatus::JOB;
        }
    }

    /// An interrupt is raised and not masked away.
    pub fn interrupt_pending(&self) -> bool {
        let s = self.state.lock();
        s.status.contains(IntStatus::ERROR) || (s.status.contains(IntStatus::JOB) && !s.masked)
    }

    pub fn interrupt_masked(&self) -> bool {
        self.state.lock().masked
    }

    pub fn is_configured(&self) -> bool {
        self.state.lock().memory.is_some()
    }

    /// Programmed coalescing thresholds (count, timer).
    pub fn coalescing(&self) -> (u32, u32) {
        let s = self.state.lock();
        (s.coalesce_count, s.coalesce_timer)
    }

    /// Submitted entries not yet fetched.
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }
}

impl JobRingRegs for SoftJobRing {
    fn configure(&self, layout: &RingLayout, memory: &Arc<RingMemory>) {
        let mut s = self.state.lock();
        s.memory = Some(memory.clone());
        s.depth = layout.depth;
        s.fetch = RingIndex::zero(layout.depth);
        s.out_head = RingIndex::zero(layout.depth);
        s.pending = 0;
        s.out_full = 0;
    }

    fn set_coalescing(&self, count: u32, timer: u32) {
        let mut s = self.state.lock();
        s.coalesce_count = count;
        s.coalesce_timer = timer;
    }

    fn input_slots_available(&self) -> usize {
        let s = self.state.lock();
        s.depth - s.pending
    }

    fn add_input_jobs(&self, n: usize) {
        let mut s = self.state.lock();
        debug_assert!(s.pending + n <= s.depth, "input ring overrun");
        s.pending += n;
    }

    fn output_slots_full(&self) -> usize {
        self.state.lock().out_full
    }

    fn remove_output_jobs(&self, n: usize) {
        let mut s = self.state.lock();
        s.out_full = s.out_full.saturating_sub(n);
    }

    fn interrupt_status(&self) -> IntStatus {
        self.state.lock().status
    }

    fn clear_interrupt(&self, bits: IntStatus) {
        self.state.lock().status.remove(bits);
    }

    fn set_interrupt_masked(&self, masked: bool) {
        self.state.lock().masked = masked;
    }

    fn reset(&self) {
        *self.state.lock() = SimState::unconfigured();
    }
}

/// Identity bus mapper with failure injection.
#[derive(Debug, Default)]
pub struct SoftDmaMapper {
    live: AtomicUsize,
    fail_next: AtomicBool,
}

impl SoftDmaMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`map`](DmaMapper::map) call fail.
    pub fn fail_next_map(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }

    /// Mappings made and not yet released.
    pub fn live_mappings(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl DmaMapper for SoftDmaMapper {
    fn map(&self, ptr: *const u8, len: usize, _dir: DmaDirection) -> SecResult<DmaAddr> {
        if self.fail_next.swap(false, Ordering::Relaxed) {
            return Err(SecError::MapFailed(format!("{len} bytes at {ptr:p}")));
        }
        self.live.fetch_add(1, Ordering::Relaxed);
        Ok(DmaAddr(ptr as usize as u64))
    }

    fn unmap(&self, _addr: DmaAddr, _len: usize, _dir: DmaDirection) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

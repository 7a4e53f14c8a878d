// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Hardware interfaces consumed by the job ring.
//!
//! The job ring drives hardware only through [`JobRingRegs`] (the register
//! block of one job ring) and [`DmaMapper`] (bus address translation). Both
//! are supplied by the platform layer; [`crate::sim`] provides software
//! implementations.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bitflags::bitflags;

use crate::command::DmaAddr;
use crate::error::SecResult;
use crate::status::JobStatus;

bitflags! {
    /// Job ring interrupt status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntStatus: u32 {
        /// Completions are waiting on the output ring.
        const JOB = 1 << 0;
        /// The job ring hit an unrecoverable error.
        const ERROR = 1 << 1;
    }
}

/// Base addresses and size the hardware is programmed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    pub depth: usize,
    pub input_base: DmaAddr,
    pub output_base: DmaAddr,
}

/// Register interface of one hardware job ring.
///
/// Implementations must not block: submission calls them with the input
/// lock held and completion processing with the output lock held.
pub trait JobRingRegs: Send + Sync {
    /// Program base addresses and ring size.
    fn configure(&self, layout: &RingLayout, memory: &Arc<RingMemory>);

    /// Interrupt after `count` completions or `timer` ticks, whichever comes first.
    fn set_coalescing(&self, count: u32, timer: u32);

    /// Free input ring slots as counted by hardware.
    fn input_slots_available(&self) -> usize;

    /// Tell hardware that `n` new input entries were written.
    fn add_input_jobs(&self, n: usize);

    /// Completed entries waiting on the output ring.
    fn output_slots_full(&self) -> usize;

    /// Tell hardware that `n` output entries were consumed.
    fn remove_output_jobs(&self, n: usize);

    fn interrupt_status(&self) -> IntStatus;

    /// Acknowledge the given interrupt bits.
    fn clear_interrupt(&self, bits: IntStatus);

    /// Mask or unmask completion interrupts.
    fn set_interrupt_masked(&self, masked: bool);

    /// Drop all queued work and return to the unconfigured state.
    fn reset(&self);
}

/// Direction of a bus mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    ToDevice,
    FromDevice,
}

/// Translates CPU buffers into bus addresses the accelerator can use.
pub trait DmaMapper: Send + Sync {
    /// Map `len` bytes at `ptr`. The buffer must stay alive until unmapped.
    fn map(&self, ptr: *const u8, len: usize, dir: DmaDirection) -> SecResult<DmaAddr>;

    fn unmap(&self, addr: DmaAddr, len: usize, dir: DmaDirection);
}

/// One output ring entry: completed descriptor address and status.
#[derive(Debug, Default)]
#[repr(C)]
pub struct OutputEntry {
    desc: AtomicU64,
    status: AtomicU32,
}

/// Hardware-visible input and output ring arrays.
#[derive(Debug)]
pub struct RingMemory {
    input: Box<[AtomicU64]>,
    output: Box<[OutputEntry]>,
}

impl RingMemory {
    /// Zeroed rings of `depth` entries each.
    pub fn new(depth: usize) -> Self {
        Self {
            input: (0..depth).map(|_| AtomicU64::new(0)).collect(),
            output: (0..depth).map(|_| OutputEntry::default()).collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.input.len()
    }

    /// Descriptor address held in input slot `slot`.
    pub fn input_slot(&self, slot: usize) -> DmaAddr {
        DmaAddr(self.input[slot].load(Ordering::Acquire))
    }

    /// Publish a descriptor address in input slot `slot`.
    pub fn set_input_slot(&self, slot: usize, addr: DmaAddr) {
        self.input[slot].store(addr.get(), Ordering::Release);
    }

    /// Completed descriptor address and status held in output slot `slot`.
    pub fn output_slot(&self, slot: usize) -> (DmaAddr, JobStatus) {
        let entry = &self.output[slot];
        let status = entry.status.load(Ordering::Acquire);
        (
            DmaAddr(entry.desc.load(Ordering::Acquire)),
            JobStatus(status),
        )
    }

    /// Post a completion in output slot `slot`.
    pub fn set_output_slot(&self, slot: usize, addr: DmaAddr, status: JobStatus) {
        let entry = &self.output[slot];
        entry.desc.store(addr.get(), Ordering::Release);
        entry.status.store(status.raw(), Ordering::Release);
    }

    pub(crate) fn input_region(&self) -> (*const u8, usize) {
        (
            self.input.as_ptr().cast(),
            std::mem::size_of_val(&*self.input),
        )
    }

    pub(crate) fn output_region(&self) -> (*const u8, usize) {
        (
            self.output.as_ptr().cast(),
            std::mem::size_of_val(&*self.output),
        )
    }
}

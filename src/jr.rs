// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Job ring driver.
//!
//! A job ring is a pair of hardware rings: the input ring carries bus
//! addresses of submitted descriptors, the output ring carries (address,
//! status) pairs for finished ones. A software shadow array, indexed like the
//! input ring, remembers each submission so that completions can be matched
//! back to their callback.
//!
//! Hardware may finish jobs out of order. The completion path therefore
//! searches the shadow array from the oldest pending entry for the reported
//! address, and the software tail only moves past entries that have been
//! matched.
//!
//! # Locking
//!
//! The input lock guards the producer index and the output lock guards the
//! consumer indices and the shadow scan. Both are spin locks that are never
//! held across a callback, so a callback may submit new work. When both are
//! needed (abandon), the input lock is taken first.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use scopeguard::ScopeGuard;

use crate::builder::Descriptor;
use crate::command::DmaAddr;
use crate::error::{SecError, SecResult};
use crate::hw::{DmaDirection, DmaMapper, IntStatus, JobRingRegs, RingLayout, RingMemory};
use crate::index::RingIndex;
use crate::status::JobOutcome;

/// Default number of entries per ring.
pub const DEFAULT_RING_DEPTH: usize = 512;
/// Largest supported ring depth.
pub const MAX_RING_DEPTH: usize = 1024;
/// Default completions per interrupt.
pub const DEFAULT_COALESCE_COUNT: u32 = 1;
/// Default coalescing timer (disabled).
pub const DEFAULT_COALESCE_TIMER: u32 = 0;
/// Default number of completions handled per poll.
pub const DEFAULT_POLL_BUDGET: usize = 64;

/// Job ring configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    depth: usize,
    coalesce_count: u32,
    coalesce_timer: u32,
    budget: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_RING_DEPTH,
            coalesce_count: DEFAULT_COALESCE_COUNT,
            coalesce_timer: DEFAULT_COALESCE_TIMER,
            budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl RingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ring depth (power of two, at most [`MAX_RING_DEPTH`]).
    pub fn set_depth(&mut self, depth: usize) -> &mut Self {
        self.depth = depth;
        self
    }

    /// Set the interrupt coalescing thresholds.
    pub fn set_coalescing(&mut self, count: u32, timer: u32) -> &mut Self {
        self.coalesce_count = count;
        self.coalesce_timer = timer;
        self
    }

    /// Set the number of completions handled per poll.
    pub fn set_budget(&mut self, budget: usize) -> &mut Self {
        self.budget = budget;
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    fn validate(&self) -> SecResult<()> {
        if !self.depth.is_power_of_two() || self.depth > MAX_RING_DEPTH {
            return Err(SecError::InvalidConfig(format!(
                "depth {} is not a power of two in 1..={MAX_RING_DEPTH}",
                self.depth
            )));
        }
        if self.budget == 0 {
            return Err(SecError::InvalidConfig("poll budget must be non-zero".into()));
        }
        if self.coalesce_count == 0 {
            return Err(SecError::InvalidConfig(
                "coalescing count must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RingState {
    /// Programmed but not accepting work.
    Reset = 0,
    /// Accepting submissions and reporting completions.
    Running = 1,
    /// Abandon sweep in progress.
    Flushing = 2,
}

impl RingState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Flushing,
            _ => Self::Reset,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Running => "running",
            Self::Flushing => "flushing",
        }
    }
}

impl fmt::Display for RingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion callback. Receives the submitted descriptor back together with
/// the outcome; anything else the caller needs travels in the closure.
pub type Callback = Box<dyn FnOnce(Arc<Descriptor>, JobOutcome) + Send + 'static>;

/// What the interrupt glue should do after [`JobRing::handle_interrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqAction {
    /// Not our interrupt.
    None,
    /// Completion interrupts are masked; run [`JobRing::poll`].
    SchedulePoll,
    /// The ring hit a hardware error and was abandoned.
    Halted,
}

/// Result of one [`JobRing::poll`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    /// Completions delivered to callbacks.
    pub processed: usize,
    /// The ring was drained within budget and interrupts were re-armed.
    pub complete: bool,
}

struct Submission {
    desc: Arc<Descriptor>,
    bus: DmaAddr,
    len: usize,
    callback: Callback,
}

/// Consumer-side indices, guarded by the output lock.
struct OutputSide {
    /// Next output ring entry to read.
    out_tail: RingIndex,
    /// Oldest shadow entry not yet matched.
    sw_tail: RingIndex,
}

/// One hardware job ring.
pub struct JobRing {
    id: usize,
    config: RingConfig,
    regs: Arc<dyn JobRingRegs>,
    dma: Arc<dyn DmaMapper>,
    memory: Arc<RingMemory>,
    layout: RingLayout,
    state: AtomicU8,
    input: spin::Mutex<RingIndex>,
    output: spin::Mutex<OutputSide>,
    /// Raw producer index, readable without the input lock.
    head: AtomicUsize,
    /// Raw software tail, readable without the output lock.
    tail: AtomicUsize,
    shadow: Box<[spin::Mutex<Option<Submission>>]>,
}

impl fmt::Debug for JobRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRing")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("depth", &self.config.depth)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl JobRing {
    /// Allocate and map the ring memory and program the hardware.
    ///
    /// The ring starts in [`RingState::Reset`]; call [`start`](Self::start)
    /// before submitting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The ring arrays cannot be mapped for the device
    pub fn new(
        id: usize,
        config: RingConfig,
        regs: Arc<dyn JobRingRegs>,
        dma: Arc<dyn DmaMapper>,
    ) -> SecResult<Self> {
        config.validate()?;
        let depth = config.depth;
        let memory = Arc::new(RingMemory::new(depth));

        let (in_ptr, in_len) = memory.input_region();
        let input_base = dma.map(in_ptr, in_len, DmaDirection::ToDevice)?;
        let input_mapping = scopeguard::guard(input_base, |addr| {
            dma.unmap(addr, in_len, DmaDirection::ToDevice)
        });
        let (out_ptr, out_len) = memory.output_region();
        let output_base = dma.map(out_ptr, out_len, DmaDirection::FromDevice)?;
        let input_base = ScopeGuard::into_inner(input_mapping);

        let ring = Self {
            id,
            config,
            regs,
            dma,
            memory,
            layout: RingLayout {
                depth,
                input_base,
                output_base,
            },
            state: AtomicU8::new(RingState::Reset as u8),
            input: spin::Mutex::new(RingIndex::zero(depth)),
            output: spin::Mutex::new(OutputSide {
                out_tail: RingIndex::zero(depth),
                sw_tail: RingIndex::zero(depth),
            }),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            shadow: (0..depth).map(|_| spin::Mutex::new(None)).collect(),
        };
        ring.program();
        log::debug!(
            "job ring {id}: initialized, depth {depth}, input {input_base}, output {output_base}"
        );
        Ok(ring)
    }

    fn program(&self) {
        self.regs.configure(&self.layout, &self.memory);
        self.regs
            .set_coalescing(self.config.coalesce_count, self.config.coalesce_timer);
        self.regs.set_interrupt_masked(true);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn depth(&self) -> usize {
        self.config.depth
    }

    pub fn state(&self) -> RingState {
        RingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Base addresses the hardware was programmed with.
    pub fn layout(&self) -> RingLayout {
        self.layout
    }

    /// Move from [`RingState::Reset`] to [`RingState::Running`] and enable
    /// completion interrupts. Starting a running ring does nothing.
    pub fn start(&self) -> SecResult<()> {
        match self.state.compare_exchange(
            RingState::Reset as u8,
            RingState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.regs.set_interrupt_masked(false);
                log::debug!("job ring {}: running", self.id);
                Ok(())
            }
            Err(v) if RingState::from_u8(v) == RingState::Running => Ok(()),
            Err(_) => Err(SecError::RingBusy(self.id)),
        }
    }

    /// Submissions accepted and not yet completed or aborted.
    ///
    /// The input lock pins the head, so the tail read after it cannot have
    /// passed it.
    pub fn in_flight(&self) -> usize {
        let head = self.input.lock();
        let tail = RingIndex::from_raw(self.tail.load(Ordering::Acquire), self.config.depth);
        RingIndex::occupied(*head, tail)
    }

    /// Nothing outstanding in software or hardware.
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
            && self.regs.input_slots_available() == self.config.depth
            && self.regs.output_slots_full() == 0
    }

    /// Submit a descriptor.
    ///
    /// The callback runs exactly once: with the hardware status when the job
    /// completes, or with [`JobOutcome::Aborted`] if the ring is abandoned
    /// first. It is dropped without running when `submit` returns an error.
    ///
    /// # Errors
    ///
    /// - [`SecError::MapFailed`] if the descriptor cannot be mapped
    /// - [`SecError::NotRunning`] if the ring is not running
    /// - [`SecError::RingFull`] if no input slot is free
    pub fn submit(&self, desc: Arc<Descriptor>, callback: Callback) -> SecResult<()> {
        let len = desc.byte_len();
        let bus = self
            .dma
            .map(desc.image().as_ptr(), len, DmaDirection::ToDevice)?;
        let mapping = scopeguard::guard(bus, |bus| {
            self.dma.unmap(bus, len, DmaDirection::ToDevice)
        });

        {
            let mut head = self.input.lock();
            let state = self.state();
            if state != RingState::Running {
                return Err(SecError::NotRunning(state.name()));
            }

            let tail = RingIndex::from_raw(self.tail.load(Ordering::Acquire), self.config.depth);
            let hw_free = self.regs.input_slots_available();
            let sw_free = RingIndex::free(*head, tail);
            if hw_free == 0 || sw_free == 0 {
                log::warn!(
                    "job ring {}: full (hardware free {hw_free}, shadow free {sw_free})",
                    self.id
                );
                return Err(SecError::RingFull);
            }

            let slot = head.slot();
            *self.shadow[slot].lock() = Some(Submission {
                desc,
                bus,
                len,
                callback,
            });
            self.memory.set_input_slot(slot, bus);
            *head = head.advance(1);
            self.head.store(head.raw(), Ordering::Release);
            self.regs.add_input_jobs(1);
        }

        ScopeGuard::into_inner(mapping);
        log::debug!("job ring {}: submitted {bus}", self.id);
        Ok(())
    }

    /// Acknowledge a ring interrupt.
    ///
    /// A completion interrupt masks further completion interrupts and asks
    /// for a [`poll`](Self::poll). An error interrupt abandons the ring.
    pub fn handle_interrupt(&self) -> IrqAction {
        let status = self.regs.interrupt_status();
        if status.contains(IntStatus::ERROR) {
            log::error!("job ring {}: hardware error interrupt", self.id);
            self.regs.clear_interrupt(status);
            self.abandon();
            return IrqAction::Halted;
        }
        if status.contains(IntStatus::JOB) {
            self.regs.clear_interrupt(IntStatus::JOB);
            self.regs.set_interrupt_masked(true);
            return IrqAction::SchedulePoll;
        }
        IrqAction::None
    }

    /// Deliver up to `budget` completions to their callbacks.
    ///
    /// Completion interrupts are unmasked again when fewer than `budget`
    /// entries were waiting; otherwise the caller should poll again.
    ///
    /// # Errors
    ///
    /// Returns [`SecError::RingProtocol`] if hardware reports an address that
    /// matches no pending submission. The ring is abandoned in that case.
    pub fn poll(&self, budget: usize) -> SecResult<PollResult> {
        let available = self.regs.output_slots_full().min(budget);
        let mut processed = 0;

        while processed < available {
            let (sub, status) = {
                let mut out = self.output.lock();
                if self.state() != RingState::Running || self.regs.output_slots_full() == 0 {
                    break;
                }
                let (addr, status) = self.memory.output_slot(out.out_tail.slot());
                let Some(sub) = self.take_matching(&mut out, addr) else {
                    drop(out);
                    log::error!(
                        "job ring {}: completion for unknown descriptor {addr}, abandoning",
                        self.id
                    );
                    self.abandon();
                    return Err(SecError::RingProtocol(format!(
                        "completion for unknown descriptor {addr}"
                    )));
                };
                out.out_tail = out.out_tail.advance(1);
                self.regs.remove_output_jobs(1);
                self.dma.unmap(sub.bus, sub.len, DmaDirection::ToDevice);
                (sub, status)
            };

            log::debug!("job ring {}: completed {} ({status})", self.id, sub.bus);
            (sub.callback)(sub.desc, JobOutcome::Completed(status));
            processed += 1;
        }

        let complete = processed < budget;
        if complete && self.state() == RingState::Running {
            self.regs.set_interrupt_masked(false);
        }
        Ok(PollResult {
            processed,
            complete,
        })
    }

    /// Find and remove the oldest live shadow entry for `addr`, then move the
    /// software tail past every matched entry at the front.
    fn take_matching(&self, out: &mut OutputSide, addr: DmaAddr) -> Option<Submission> {
        let head = RingIndex::from_raw(self.head.load(Ordering::Acquire), self.config.depth);

        let mut found = None;
        let mut i = out.sw_tail;
        while i != head {
            let mut entry = self.shadow[i.slot()].lock();
            if matches!(&*entry, Some(s) if s.bus == addr) {
                found = entry.take();
                break;
            }
            drop(entry);
            i = i.advance(1);
        }

        if found.is_some() {
            let mut tail = out.sw_tail;
            while tail != head && self.shadow[tail.slot()].lock().is_none() {
                tail = tail.advance(1);
            }
            out.sw_tail = tail;
            self.tail.store(tail.raw(), Ordering::Release);
        }
        found
    }

    /// Tear the ring down: every outstanding submission completes with
    /// [`JobOutcome::Aborted`], the hardware is reset and reprogrammed, and
    /// the ring is left in [`RingState::Reset`].
    ///
    /// Returns the number of aborted submissions.
    pub fn abandon(&self) -> usize {
        let aborted = {
            let mut head = self.input.lock();
            let mut out = self.output.lock();
            self.state
                .store(RingState::Flushing as u8, Ordering::Release);

            let mut aborted = Vec::new();
            let mut i = out.sw_tail;
            while i != *head {
                if let Some(sub) = self.shadow[i.slot()].lock().take() {
                    self.dma.unmap(sub.bus, sub.len, DmaDirection::ToDevice);
                    aborted.push(sub);
                }
                i = i.advance(1);
            }

            self.regs.reset();
            self.program();
            let depth = self.config.depth;
            *head = RingIndex::zero(depth);
            out.out_tail = RingIndex::zero(depth);
            out.sw_tail = RingIndex::zero(depth);
            self.head.store(0, Ordering::Release);
            self.tail.store(0, Ordering::Release);
            self.state.store(RingState::Reset as u8, Ordering::Release);
            aborted
        };

        let count = aborted.len();
        if count > 0 {
            log::warn!("job ring {}: abandoned {count} jobs", self.id);
        } else {
            log::debug!("job ring {}: reset", self.id);
        }
        for sub in aborted {
            (sub.callback)(sub.desc, JobOutcome::Aborted);
        }
        count
    }
}

impl Drop for JobRing {
    fn drop(&mut self) {
        if self.in_flight() > 0 {
            self.abandon();
        }
        self.regs.reset();
        let (_, in_len) = self.memory.input_region();
        let (_, out_len) = self.memory.output_region();
        self.dma
            .unmap(self.layout.input_base, in_len, DmaDirection::ToDevice);
        self.dma
            .unmap(self.layout.output_base, out_len, DmaDirection::FromDevice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DescriptorBuilder;
    use crate::command::AddressWidth;
    use crate::header::HeaderOptions;
    use crate::sim::{SoftDmaMapper, SoftJobRing};
    use crate::status::JobStatus;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    fn ring(depth: usize) -> (JobRing, Arc<SoftJobRing>, Arc<SoftDmaMapper>) {
        let hw = Arc::new(SoftJobRing::new());
        let dma = Arc::new(SoftDmaMapper::new());
        let mut config = RingConfig::new();
        config.set_depth(depth);
        let ring = JobRing::new(0, config, hw.clone(), dma.clone()).unwrap();
        ring.start().unwrap();
        (ring, hw, dma)
    }

    fn descriptor() -> Arc<Descriptor> {
        Arc::new(
            DescriptorBuilder::job(AddressWidth::Narrow)
                .finish(HeaderOptions::default())
                .unwrap(),
        )
    }

    type Log = Arc<Mutex<Vec<(usize, JobOutcome)>>>;

    fn recorder(log: &Log, tag: usize) -> Callback {
        let log = log.clone();
        Box::new(move |_, outcome| log.lock().unwrap().push((tag, outcome)))
    }

    #[test]
    fn test_config_validation() {
        let hw = Arc::new(SoftJobRing::new());
        let dma = Arc::new(SoftDmaMapper::new());
        for depth in [0, 3, 2048] {
            let mut config = RingConfig::new();
            config.set_depth(depth);
            assert!(matches!(
                JobRing::new(0, config, hw.clone(), dma.clone()),
                Err(SecError::InvalidConfig(_))
            ));
        }
        let mut config = RingConfig::new();
        config.set_budget(0);
        assert!(JobRing::new(0, config, hw, dma).is_err());
    }

    #[test]
    fn test_lifecycle() {
        let hw = Arc::new(SoftJobRing::new());
        let dma = Arc::new(SoftDmaMapper::new());
        let mut config = RingConfig::new();
        config.set_depth(4);
        let ring = JobRing::new(3, config, hw.clone(), dma.clone()).unwrap();
        assert_eq!(ring.state(), RingState::Reset);
        assert!(hw.interrupt_masked());
        assert!(matches!(
            ring.submit(descriptor(), Box::new(|_, _| {})),
            Err(SecError::NotRunning("reset"))
        ));
        assert_eq!(dma.live_mappings(), 2);

        ring.start().unwrap();
        ring.start().unwrap();
        assert_eq!(ring.state(), RingState::Running);
        assert!(!hw.interrupt_masked());
        assert!(ring.is_idle());
    }

    #[test]
    fn test_submit_and_complete_in_order() {
        let (ring, hw, dma) = ring(4);
        let log = Log::default();
        let desc = descriptor();
        ring.submit(desc.clone(), recorder(&log, 1)).unwrap();
        assert_eq!(ring.in_flight(), 1);
        assert_eq!(dma.live_mappings(), 3);

        let addr = hw.fetch().unwrap();
        hw.complete(addr, JobStatus::OK);
        assert_eq!(ring.handle_interrupt(), IrqAction::SchedulePoll);
        assert!(hw.interrupt_masked());

        let res = ring.poll(8).unwrap();
        assert_eq!(res, PollResult { processed: 1, complete: true });
        assert!(!hw.interrupt_masked());
        assert_eq!(*log.lock().unwrap(), vec![(1, JobOutcome::Completed(JobStatus::OK))]);
        assert_eq!(ring.in_flight(), 0);
        assert_eq!(dma.live_mappings(), 2);
        assert!(ring.is_idle());
    }

    #[test]
    fn test_out_of_order_tail_tracking() {
        let (ring, hw, _dma) = ring(4);
        let log = Log::default();
        let descs: Vec<_> = (0..3).map(|_| descriptor()).collect();
        for (tag, d) in descs.iter().enumerate() {
            ring.submit(d.clone(), recorder(&log, tag)).unwrap();
        }
        let a = hw.fetch().unwrap();
        let b = hw.fetch().unwrap();
        let c = hw.fetch().unwrap();

        hw.complete(c, JobStatus::OK);
        ring.poll(8).unwrap();
        assert_eq!(ring.in_flight(), 3, "tail stays at A");

        hw.complete(b, JobStatus(0x3000_0001));
        ring.poll(8).unwrap();
        assert_eq!(ring.in_flight(), 3, "tail still at A");

        hw.complete(a, JobStatus::OK);
        ring.poll(8).unwrap();
        assert_eq!(ring.in_flight(), 0, "tail moved past A, B and C");

        let tags: Vec<usize> = log.lock().unwrap().iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![2, 1, 0]);
        assert_eq!(log.lock().unwrap()[1].1, JobOutcome::Completed(JobStatus(0x3000_0001)));
    }

    #[test]
    fn test_full_ring_rejects_and_recovers() {
        let (ring, hw, dma) = ring(2);
        let log = Log::default();
        ring.submit(descriptor(), recorder(&log, 0)).unwrap();
        ring.submit(descriptor(), recorder(&log, 1)).unwrap();
        let mapped = dma.live_mappings();
        assert_eq!(
            ring.submit(descriptor(), recorder(&log, 2)),
            Err(SecError::RingFull)
        );
        assert_eq!(dma.live_mappings(), mapped, "rejected submit unmapped");

        let first = hw.fetch().unwrap();
        hw.complete(first, JobStatus::OK);
        ring.poll(8).unwrap();
        ring.submit(descriptor(), recorder(&log, 2)).unwrap();
        assert_eq!(ring.in_flight(), 2);
    }

    #[test]
    fn test_shadow_full_while_hardware_has_room() {
        // Hardware fetched both entries and frees its input slots, but
        // neither has completed: the shadow array is still full.
        let (ring, hw, _dma) = ring(2);
        ring.submit(descriptor(), Box::new(|_, _| {})).unwrap();
        ring.submit(descriptor(), Box::new(|_, _| {})).unwrap();
        hw.fetch().unwrap();
        hw.fetch().unwrap();
        assert_eq!(hw.input_slots_available(), 2);
        assert_eq!(
            ring.submit(descriptor(), Box::new(|_, _| {})),
            Err(SecError::RingFull)
        );
    }

    #[test]
    fn test_map_failure_leaves_ring_untouched() {
        let (ring, _hw, dma) = ring(4);
        dma.fail_next_map();
        assert!(matches!(
            ring.submit(descriptor(), Box::new(|_, _| {})),
            Err(SecError::MapFailed(_))
        ));
        assert_eq!(ring.in_flight(), 0);
        assert!(ring.is_idle());
    }

    #[test]
    fn test_poll_budget_keeps_interrupt_masked() {
        let (ring, hw, _dma) = ring(8);
        let log = Log::default();
        for tag in 0..5 {
            ring.submit(descriptor(), recorder(&log, tag)).unwrap();
        }
        hw.complete_all_in_order(JobStatus::OK);
        assert_eq!(ring.handle_interrupt(), IrqAction::SchedulePoll);

        let res = ring.poll(2).unwrap();
        assert_eq!(res, PollResult { processed: 2, complete: false });
        assert!(hw.interrupt_masked());
        let res = ring.poll(2).unwrap();
        assert_eq!(res.processed, 2);
        let res = ring.poll(2).unwrap();
        assert_eq!(res, PollResult { processed: 1, complete: true });
        assert!(!hw.interrupt_masked());
        assert_eq!(log.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_abandon_aborts_each_once() {
        let (ring, hw, dma) = ring(8);
        let log = Log::default();
        for tag in 0..5 {
            ring.submit(descriptor(), recorder(&log, tag)).unwrap();
        }
        hw.fetch().unwrap();
        assert_eq!(ring.abandon(), 5);
        assert_eq!(ring.state(), RingState::Reset);
        assert_eq!(ring.in_flight(), 0);
        assert_eq!(dma.live_mappings(), 2);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 5);
        assert!(log.iter().all(|(_, o)| *o == JobOutcome::Aborted));
        let mut tags: Vec<usize> = log.iter().map(|(t, _)| *t).collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_abandon_skips_already_matched() {
        let (ring, hw, _dma) = ring(4);
        let log = Log::default();
        for tag in 0..3 {
            ring.submit(descriptor(), recorder(&log, tag)).unwrap();
        }
        let _a = hw.fetch().unwrap();
        let b = hw.fetch().unwrap();
        hw.complete(b, JobStatus::OK);
        ring.poll(8).unwrap();
        assert_eq!(ring.abandon(), 2);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().filter(|(_, o)| o.is_aborted()).count(), 2);
    }

    #[test]
    fn test_restart_after_abandon() {
        let (ring, hw, _dma) = ring(4);
        ring.submit(descriptor(), Box::new(|_, _| {})).unwrap();
        ring.abandon();
        assert!(matches!(
            ring.submit(descriptor(), Box::new(|_, _| {})),
            Err(SecError::NotRunning(_))
        ));
        ring.start().unwrap();
        let log = Log::default();
        ring.submit(descriptor(), recorder(&log, 7)).unwrap();
        let addr = hw.fetch().unwrap();
        hw.complete(addr, JobStatus::OK);
        ring.poll(4).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_error_interrupt_abandons() {
        let (ring, hw, _dma) = ring(4);
        let log = Log::default();
        ring.submit(descriptor(), recorder(&log, 0)).unwrap();
        hw.raise_error();
        assert_eq!(ring.handle_interrupt(), IrqAction::Halted);
        assert_eq!(ring.state(), RingState::Reset);
        assert_eq!(*log.lock().unwrap(), vec![(0, JobOutcome::Aborted)]);
        assert_eq!(ring.handle_interrupt(), IrqAction::None);
    }

    #[test]
    fn test_unknown_completion_is_protocol_error() {
        let (ring, hw, _dma) = ring(4);
        let log = Log::default();
        ring.submit(descriptor(), recorder(&log, 0)).unwrap();
        hw.fetch().unwrap();
        hw.complete(DmaAddr(0xdead_0000), JobStatus::OK);
        assert!(matches!(ring.poll(4), Err(SecError::RingProtocol(_))));
        assert_eq!(ring.state(), RingState::Reset);
        assert_eq!(*log.lock().unwrap(), vec![(0, JobOutcome::Aborted)]);
    }

    #[test]
    fn test_callback_may_resubmit() {
        let (ring, hw, _dma) = ring(4);
        let ring = Arc::new(ring);
        let log = Log::default();
        let inner = ring.clone();
        let inner_log = log.clone();
        ring.submit(
            descriptor(),
            Box::new(move |desc, _| {
                inner.submit(desc, recorder(&inner_log, 1)).unwrap();
            }),
        )
        .unwrap();

        let addr = hw.fetch().unwrap();
        hw.complete(addr, JobStatus::OK);
        ring.poll(4).unwrap();
        assert_eq!(ring.in_flight(), 1);

        let again = hw.fetch().unwrap();
        assert_eq!(again, addr, "same descriptor resubmitted");
        hw.complete(again, JobStatus::OK);
        ring.poll(4).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(ring.is_idle());
    }

    #[derive(Debug, Default)]
    struct DirectionLog {
        inner: SoftDmaMapper,
        maps: Mutex<Vec<DmaDirection>>,
        unmaps: Mutex<Vec<DmaDirection>>,
    }

    impl DmaMapper for DirectionLog {
        fn map(&self, ptr: *const u8, len: usize, dir: DmaDirection) -> SecResult<DmaAddr> {
            self.maps.lock().unwrap().push(dir);
            self.inner.map(ptr, len, dir)
        }

        fn unmap(&self, addr: DmaAddr, len: usize, dir: DmaDirection) {
            self.unmaps.lock().unwrap().push(dir);
            self.inner.unmap(addr, len, dir)
        }
    }

    #[test]
    fn test_mapping_directions() {
        let hw = Arc::new(SoftJobRing::new());
        let dma = Arc::new(DirectionLog::default());
        let ring = JobRing::new(0, RingConfig::new(), hw.clone(), dma.clone()).unwrap();
        ring.start().unwrap();
        assert_eq!(
            *dma.maps.lock().unwrap(),
            vec![DmaDirection::ToDevice, DmaDirection::FromDevice]
        );

        ring.submit(descriptor(), Box::new(|_, _| {})).unwrap();
        hw.complete_all_in_order(JobStatus::OK);
        ring.poll(4).unwrap();
        drop(ring);

        assert_eq!(dma.maps.lock().unwrap()[2], DmaDirection::ToDevice);
        assert_eq!(
            *dma.unmaps.lock().unwrap(),
            vec![
                DmaDirection::ToDevice,
                DmaDirection::ToDevice,
                DmaDirection::FromDevice
            ]
        );
        assert_eq!(dma.inner.live_mappings(), 0);
    }

    #[test]
    fn test_in_flight_bounded_while_sampled_concurrently() {
        let (ring, hw, _dma) = ring(4);
        let stop = AtomicBool::new(false);
        let max_seen = std::thread::scope(|s| {
            let samplers: Vec<_> = (0..3)
                .map(|_| {
                    s.spawn(|| {
                        let mut max = 0;
                        while !stop.load(Ordering::Acquire) {
                            max = max.max(ring.in_flight());
                        }
                        max
                    })
                })
                .collect();
            for _ in 0..5_000 {
                while ring.submit(descriptor(), Box::new(|_, _| {})).is_ok() {}
                hw.complete_all_in_order(JobStatus::OK);
                ring.poll(4).unwrap();
            }
            stop.store(true, Ordering::Release);
            samplers
                .into_iter()
                .map(|h| h.join().unwrap())
                .max()
                .unwrap_or(0)
        });
        assert!(max_seen <= 4, "in_flight reported {max_seen} on a ring of 4");
        assert!(ring.is_idle());
    }

    #[test]
    fn test_concurrent_submitters_each_fire_once() {
        let (ring, hw, _dma) = ring(8);
        let fired = Arc::new(AtomicUsize::new(0));
        let accepted = AtomicUsize::new(0);
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            let completer = s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    hw.complete_all_in_order(JobStatus::OK);
                    ring.poll(8).unwrap();
                }
            });
            let submitters: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        for _ in 0..500 {
                            let fired = fired.clone();
                            let res = ring.submit(
                                descriptor(),
                                Box::new(move |_, o| {
                                    assert!(o.is_success());
                                    fired.fetch_add(1, Ordering::SeqCst);
                                }),
                            );
                            match res {
                                Ok(()) => {
                                    accepted.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(e) => assert_eq!(e, SecError::RingFull),
                            }
                        }
                    })
                })
                .collect();
            for h in submitters {
                h.join().unwrap();
            }
            done.store(true, Ordering::Release);
            completer.join().unwrap();
        });

        hw.complete_all_in_order(JobStatus::OK);
        while ring.poll(8).unwrap().processed > 0 {}
        let accepted = accepted.load(Ordering::SeqCst);
        assert!(accepted > 0);
        assert_eq!(fired.load(Ordering::SeqCst), accepted);
        assert!(ring.is_idle());
    }

    #[derive(Debug, Clone)]
    enum RingOp {
        Submit,
        Fetch,
        Complete(proptest::sample::Index),
        Poll(usize),
        Abandon,
    }

    fn ring_op() -> impl Strategy<Value = RingOp> {
        prop_oneof![
            4 => Just(RingOp::Submit),
            3 => Just(RingOp::Fetch),
            3 => any::<proptest::sample::Index>().prop_map(RingOp::Complete),
            2 => (1usize..6).prop_map(RingOp::Poll),
            1 => Just(RingOp::Abandon),
        ]
    }

    proptest! {
        /// Any interleaving of submissions, hardware fetches, out-of-order
        /// completions, polls and abandons keeps the ring within its depth
        /// and resolves every accepted job exactly once.
        #[test]
        fn prop_random_ops_respect_capacity(
            shift in 0u32..4,
            ops in proptest::collection::vec(ring_op(), 1..200),
        ) {
            let depth = 1usize << shift;
            let (ring, hw, dma) = ring(depth);
            let fired: Arc<Mutex<Vec<usize>>> = Arc::default();
            let mut accepted = 0usize;
            let mut fetched: Vec<DmaAddr> = Vec::new();

            for op in ops {
                match op {
                    RingOp::Submit => {
                        let hw_room = hw.input_slots_available() > 0;
                        let sw_room = ring.in_flight() < depth;
                        // Unfetched entries are a subset of the shadow entries.
                        prop_assert!(hw_room || !sw_room);
                        let fired = fired.clone();
                        let id = accepted;
                        let res = ring.submit(
                            descriptor(),
                            Box::new(move |_, _| fired.lock().unwrap().push(id)),
                        );
                        if hw_room && sw_room {
                            prop_assert!(res.is_ok());
                            accepted += 1;
                        } else {
                            prop_assert_eq!(res, Err(SecError::RingFull));
                        }
                    }
                    RingOp::Fetch => {
                        if let Some(addr) = hw.fetch() {
                            fetched.push(addr);
                        }
                    }
                    RingOp::Complete(i) => {
                        if !fetched.is_empty() {
                            let addr = fetched.swap_remove(i.index(fetched.len()));
                            hw.complete(addr, JobStatus::OK);
                        }
                    }
                    RingOp::Poll(budget) => {
                        ring.poll(budget).unwrap();
                    }
                    RingOp::Abandon => {
                        ring.abandon();
                        ring.start().unwrap();
                        fetched.clear();
                    }
                }
                let in_flight = ring.in_flight();
                let outstanding = accepted - fired.lock().unwrap().len();
                prop_assert!(in_flight <= depth);
                prop_assert!(in_flight >= outstanding);
            }

            while let Some(addr) = hw.fetch() {
                fetched.push(addr);
            }
            for addr in fetched.drain(..) {
                hw.complete(addr, JobStatus::OK);
            }
            while ring.poll(depth).unwrap().processed > 0 {}

            let mut fired = fired.lock().unwrap().clone();
            fired.sort_unstable();
            prop_assert_eq!(fired, (0..accepted).collect::<Vec<_>>());
            prop_assert!(ring.is_idle());
            prop_assert_eq!(dma.live_mappings(), 2);
        }
    }
}

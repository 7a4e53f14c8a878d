// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Job ring allocator.
//!
//! A [`RingPool`] owns a fixed set of job rings and gives each to at most one
//! caller at a time. The caller's [`RingHandle`] is the ownership token; it
//! goes back to the pool through [`RingPool::deregister`], which refuses while
//! the ring still has work outstanding.
//!
//! Only the handle can submit. Interrupt glue that services every ring gets a
//! [`RingIrq`] per ring from [`RingPool::irqs`], which acknowledges and drains
//! completions and nothing else.

use std::sync::Arc;

use thiserror::Error;

use crate::builder::Descriptor;
use crate::error::{SecError, SecResult};
use crate::jr::{Callback, IrqAction, JobRing, PollResult};

/// A failed deregistration. The handle is returned so the caller keeps
/// ownership of the still-assigned ring.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DeregisterError {
    pub handle: RingHandle,
    pub error: SecError,
}

/// Exclusive use of one job ring.
///
/// Dropping a handle without deregistering keeps the ring assigned.
#[derive(Debug)]
pub struct RingHandle {
    ring: Arc<JobRing>,
    index: usize,
}

impl RingHandle {
    /// Id of the assigned ring.
    pub fn id(&self) -> usize {
        self.ring.id()
    }

    /// The assigned ring, borrowed for as long as the handle is held.
    ///
    /// ```compile_fail
    /// # use sec4_rust::{RingPool, SecError};
    /// # fn f(pool: &RingPool) -> Result<(), SecError> {
    /// let handle = pool.register()?;
    /// let ring = handle.ring();
    /// pool.deregister(handle).map_err(|e| e.error)?;
    /// ring.abandon();
    /// # Ok(())
    /// # }
    /// ```
    pub fn ring(&self) -> &JobRing {
        &self.ring
    }

    /// Submit a descriptor on the assigned ring. See [`JobRing::submit`].
    pub fn submit(&self, desc: Arc<Descriptor>, callback: Callback) -> SecResult<()> {
        self.ring.submit(desc, callback)
    }
}

/// Interrupt-side view of one pooled ring.
///
/// It cannot submit:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use sec4_rust::{Descriptor, RingPool};
/// # fn f(pool: &RingPool, desc: Arc<Descriptor>) {
/// for irq in pool.irqs() {
///     let _ = irq.submit(desc.clone(), Box::new(|_, _| {}));
/// }
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RingIrq<'a> {
    ring: &'a JobRing,
}

impl RingIrq<'_> {
    pub fn id(&self) -> usize {
        self.ring.id()
    }

    /// See [`JobRing::handle_interrupt`].
    pub fn handle_interrupt(&self) -> IrqAction {
        self.ring.handle_interrupt()
    }

    /// See [`JobRing::poll`].
    ///
    /// # Errors
    ///
    /// Returns [`SecError::RingProtocol`] when the ring reports a completion
    /// it cannot match.
    pub fn poll(&self, budget: usize) -> SecResult<PollResult> {
        self.ring.poll(budget)
    }

    /// Poll budget from the ring's configuration.
    pub fn budget(&self) -> usize {
        self.ring.config().budget()
    }

    pub fn is_idle(&self) -> bool {
        self.ring.is_idle()
    }
}

/// Fixed set of job rings with exclusive assignment.
#[derive(Debug)]
pub struct RingPool {
    rings: Vec<Arc<JobRing>>,
    assigned: spin::Mutex<Vec<bool>>,
}

impl RingPool {
    pub fn new(rings: Vec<JobRing>) -> Self {
        let assigned = vec![false; rings.len()];
        Self {
            rings: rings.into_iter().map(Arc::new).collect(),
            assigned: spin::Mutex::new(assigned),
        }
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Interrupt views of all rings, assigned or not.
    pub fn irqs(&self) -> impl Iterator<Item = RingIrq<'_>> {
        self.rings.iter().map(|ring| RingIrq { ring })
    }

    /// Rings currently unassigned.
    pub fn free_count(&self) -> usize {
        self.assigned.lock().iter().filter(|a| !**a).count()
    }

    /// Claim the first unassigned ring.
    ///
    /// # Errors
    ///
    /// Returns [`SecError::NoDevice`] if every ring is assigned.
    pub fn register(&self) -> SecResult<RingHandle> {
        let mut assigned = self.assigned.lock();
        let index = assigned
            .iter()
            .position(|a| !*a)
            .ok_or(SecError::NoDevice)?;
        assigned[index] = true;
        let ring = self.rings[index].clone();
        log::info!("job ring {}: registered", ring.id());
        Ok(RingHandle { ring, index })
    }

    /// Give a ring back.
    ///
    /// # Errors
    ///
    /// Fails with [`SecError::RingBusy`] if the ring has work outstanding,
    /// and with [`SecError::InvalidConfig`] if the handle belongs to another
    /// pool. The ring stays assigned and the handle is returned.
    pub fn deregister(&self, handle: RingHandle) -> Result<(), DeregisterError> {
        let mut assigned = self.assigned.lock();
        let ours = self
            .rings
            .get(handle.index)
            .is_some_and(|r| Arc::ptr_eq(r, &handle.ring));
        if !ours {
            return Err(DeregisterError {
                error: SecError::InvalidConfig(format!(
                    "job ring {} does not belong to this pool",
                    handle.id()
                )),
                handle,
            });
        }
        if !handle.ring.is_idle() {
            log::warn!("job ring {}: deregister refused, work outstanding", handle.id());
            return Err(DeregisterError {
                error: SecError::RingBusy(handle.id()),
                handle,
            });
        }
        assigned[handle.index] = false;
        log::info!("job ring {}: deregistered", handle.id());
        Ok(())
    }
}

// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! High-level engine API.

use std::sync::Arc;

use crate::builder::Descriptor;
use crate::error::{SecError, SecResult};
use crate::jr::{Callback, IrqAction};
use crate::pool::{DeregisterError, RingHandle, RingPool};
use crate::router::RoundRobin;
#[cfg(feature = "async")]
use crate::status::JobOutcome;

/// A set of job rings used together, with round-robin submission.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sec4_rust::sim::{SoftDmaMapper, SoftJobRing};
/// use sec4_rust::{
///     AddressWidth, DescriptorBuilder, HeaderOptions, JobRing, JobStatus, RingConfig,
///     RingPool, SecEngine, SecError,
/// };
///
/// fn main() -> Result<(), SecError> {
///     let hw = Arc::new(SoftJobRing::new());
///     let ring = JobRing::new(0, RingConfig::new(), hw.clone(), Arc::new(SoftDmaMapper::new()))?;
///     ring.start()?;
///     let pool = RingPool::new(vec![ring]);
///     let engine = SecEngine::open(&pool, 1)?;
///
///     let desc = DescriptorBuilder::job(AddressWidth::Narrow).finish(HeaderOptions::default())?;
///     engine.submit(Arc::new(desc), Box::new(|_, outcome| println!("done: {outcome}")))?;
///
///     hw.complete_all_in_order(JobStatus::OK);
///     engine.service()?;
///     engine.close(&pool).map_err(|mut e| e.remove(0).error)?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SecEngine {
    router: RoundRobin<RingHandle>,
}

impl SecEngine {
    /// Register `count` rings from `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero or the pool has fewer than
    /// `count` free rings. Rings registered before the failure go back to
    /// the pool.
    pub fn open(pool: &RingPool, count: usize) -> SecResult<Self> {
        if count == 0 {
            return Err(SecError::InvalidConfig("engine needs at least one ring".into()));
        }
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            match pool.register() {
                Ok(h) => handles.push(h),
                Err(e) => {
                    for h in handles {
                        // Freshly registered rings carry no work of ours.
                        if let Err(e) = pool.deregister(h) {
                            log::warn!("job ring {}: not returned: {e}", e.handle.id());
                        }
                    }
                    return Err(e);
                }
            }
        }
        log::info!("engine opened with {count} job ring(s)");
        Ok(Self {
            router: RoundRobin::new(handles)?,
        })
    }

    /// Rings owned by this engine.
    pub fn handles(&self) -> &[RingHandle] {
        self.router.items()
    }

    /// Submit on the next ring in turn. Returns the id of the ring used.
    ///
    /// # Errors
    ///
    /// See [`JobRing::submit`](crate::jr::JobRing::submit).
    pub fn submit(&self, desc: Arc<Descriptor>, callback: Callback) -> SecResult<usize> {
        let handle = self.router.pick();
        handle.submit(desc, callback)?;
        Ok(handle.id())
    }

    /// Submit and wait for the outcome asynchronously.
    ///
    /// Submission errors are returned immediately; the future resolves once
    /// the ring reports the job completed or aborted.
    #[cfg(feature = "async")]
    pub fn submit_async(
        &self,
        desc: Arc<Descriptor>,
    ) -> SecResult<impl std::future::Future<Output = SecResult<(Arc<Descriptor>, JobOutcome)>>>
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.submit(
            desc,
            Box::new(move |desc, outcome| {
                let _ = tx.send((desc, outcome));
            }),
        )?;
        Ok(async move {
            rx.await
                .map_err(|_| SecError::RingProtocol("completion callback dropped".into()))
        })
    }

    /// Interrupt glue for every owned ring: acknowledge pending interrupts
    /// and poll until each ring is drained. Returns the completions delivered.
    ///
    /// # Errors
    ///
    /// Returns the first ring-protocol error; the affected ring has been
    /// abandoned by then.
    pub fn service(&self) -> SecResult<usize> {
        let mut delivered = 0;
        for handle in self.handles() {
            let ring = handle.ring();
            if ring.handle_interrupt() != IrqAction::SchedulePoll {
                continue;
            }
            loop {
                let res = ring.poll(ring.config().budget())?;
                delivered += res.processed;
                if res.complete {
                    break;
                }
            }
        }
        Ok(delivered)
    }

    /// Give all rings back to `pool`.
    ///
    /// # Errors
    ///
    /// Returns the deregistration failures; those rings stay assigned and
    /// their handles are inside the errors.
    pub fn close(self, pool: &RingPool) -> Result<(), Vec<DeregisterError>> {
        let failed: Vec<_> = self
            .router
            .into_inner()
            .into_iter()
            .filter_map(|h| pool.deregister(h).err())
            .collect();
        if failed.is_empty() {
            log::info!("engine closed");
            Ok(())
        } else {
            Err(failed)
        }
    }
}

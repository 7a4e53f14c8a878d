// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Round-robin selection over a fixed set of targets.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SecError, SecResult};

/// Hands out its items in turn. Safe to share between submitters.
#[derive(Debug)]
pub struct RoundRobin<T> {
    items: Vec<T>,
    next: AtomicUsize,
}

impl<T> RoundRobin<T> {
    /// # Errors
    ///
    /// Returns [`SecError::InvalidConfig`] if `items` is empty.
    pub fn new(items: Vec<T>) -> SecResult<Self> {
        if items.is_empty() {
            return Err(SecError::InvalidConfig(
                "round robin needs at least one target".into(),
            ));
        }
        Ok(Self {
            items,
            next: AtomicUsize::new(0),
        })
    }

    /// The next item in turn.
    #[inline]
    pub fn pick(&self) -> &T {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        &self.items[n % self.items.len()]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

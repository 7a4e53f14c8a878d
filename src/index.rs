// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Extra-bit ring indices.
//!
//! An index over a ring of power-of-two depth `D` runs through `[0, 2D)`.
//! The slot is the index modulo `D`; the extra bit tells a full ring
//! (`head - tail == D`) from an empty one (`head == tail`) without a
//! separate counter.

/// Position in a ring of power-of-two depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingIndex {
    raw: usize,
    depth: usize,
}

impl RingIndex {
    /// Index zero of a ring of `depth` entries. `depth` must be a power of two.
    pub(crate) fn zero(depth: usize) -> Self {
        debug_assert!(depth.is_power_of_two());
        Self { raw: 0, depth }
    }

    /// Rebuild an index from its raw value.
    pub(crate) fn from_raw(raw: usize, depth: usize) -> Self {
        debug_assert!(depth.is_power_of_two());
        Self {
            raw: raw & (2 * depth - 1),
            depth,
        }
    }

    #[inline]
    pub(crate) fn raw(self) -> usize {
        self.raw
    }

    /// Array slot this index refers to.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.raw & (self.depth - 1)
    }

    /// The index `n` positions further on.
    #[inline]
    pub(crate) fn advance(self, n: usize) -> Self {
        Self {
            raw: (self.raw + n) & (2 * self.depth - 1),
            depth: self.depth,
        }
    }

    /// Ring depth.
    pub fn depth(self) -> usize {
        self.depth
    }

    /// Entries between `tail` (oldest) and `head` (next free).
    #[inline]
    pub fn occupied(head: Self, tail: Self) -> usize {
        debug_assert_eq!(head.depth, tail.depth);
        head.raw.wrapping_sub(tail.raw) & (2 * head.depth - 1)
    }

    /// Slots still free for producers.
    #[inline]
    pub fn free(head: Self, tail: Self) -> usize {
        head.depth - Self::occupied(head, tail)
    }

    pub fn is_full(head: Self, tail: Self) -> bool {
        Self::occupied(head, tail) == head.depth
    }

    pub fn is_empty(head: Self, tail: Self) -> bool {
        head.raw == tail.raw
    }
}

// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Error types for descriptor construction and job ring operations.

use thiserror::Error;

/// Errors that can occur while building descriptors or driving a job ring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecError {
    /// Two or more command fields that the hardware cannot execute together.
    #[error("illegal field combination: {0}")]
    IllegalCombination(&'static str),

    /// A value does not fit the bit-field reserved for it.
    #[error("field `{field}` overflow: {value} exceeds {max}")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A raw selector value outside its closed enumeration.
    #[error("unknown {field} selector {value:#x}")]
    UnknownSelector { field: &'static str, value: u32 },

    /// Appending would push the descriptor past the hardware maximum.
    #[error("descriptor too long: {needed} words needed, {max} allowed")]
    DescriptorTooLong { needed: usize, max: usize },

    /// Local jump target falls outside the descriptor buffer.
    #[error("local jump from word {from} by {offset} leaves the descriptor")]
    JumpOutOfRange { from: usize, offset: i8 },

    /// Ring configuration rejected at construction.
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(String),

    /// Bus mapping of a buffer failed.
    #[error("DMA mapping failed: {0}")]
    MapFailed(String),

    /// No free slot in the input ring or the shadow array.
    #[error("job ring full")]
    RingFull,

    /// Every physical job ring is already assigned.
    #[error("no free job ring")]
    NoDevice,

    /// The ring still has work outstanding.
    #[error("job ring {0} has outstanding work")]
    RingBusy(usize),

    /// The ring is not accepting submissions.
    #[error("job ring not running (state: {0})")]
    NotRunning(&'static str),

    /// Hardware and software ring bookkeeping disagree; the ring was abandoned.
    #[error("job ring protocol error: {0}")]
    RingProtocol(String),
}

impl SecError {
    /// POSIX error number a C caller of the same API would see.
    pub fn errno(&self) -> i32 {
        match self {
            Self::MapFailed(_) | Self::RingProtocol(_) => 5, // EIO
            Self::RingFull | Self::RingBusy(_) => 16,        // EBUSY
            Self::NoDevice => 19,                            // ENODEV
            Self::NotRunning(_) => 108,                      // ESHUTDOWN
            _ => 22,                                         // EINVAL
        }
    }
}

/// Result type alias for SEC4 operations.
pub type SecResult<T> = Result<T, SecError>;

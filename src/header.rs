// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Job and shared descriptor headers.
//!
//! The header is always word 0 of a descriptor. It records the total length
//! in words and the start index, the word at which execution resumes after a
//! prefix such as a shared descriptor pointer or inline protocol data.
//!
//! # Layout
//!
//! | Bits    | Field                                          |
//! |---------|------------------------------------------------|
//! | 31:27   | command type (`HEADER` or `SHR_HEADER`)        |
//! | 24      | do not run                                     |
//! | 23      | always one                                     |
//! | 21:16   | start index                                    |
//! | 14      | trusted (job)                                  |
//! | 13      | make trusted (job)                             |
//! | 12      | shared pointer follows (job) / save context (shared) |
//! | 11      | reverse execution order (job)                  |
//! | 10:8    | share policy (shared descriptors use 9:8)      |
//! | 6:0     | descriptor length (shared descriptors use 5:0) |

use bitflags::bitflags;

use crate::error::{SecError, SecResult};
use crate::opcode::CommandType;

/// Position of the start index field.
pub const HDR_START_IDX_SHIFT: u32 = 16;
/// Width mask of the start index field.
pub const HDR_START_IDX_MASK: u32 = 0x3f;
/// Position of the share policy field.
pub const HDR_SHARE_SHIFT: u32 = 8;
/// Width mask of the job header share field.
pub const HDR_JD_SHARE_MASK: u32 = 0x07;
/// Width mask of the shared header share field.
pub const HDR_SD_SHARE_MASK: u32 = 0x03;
/// Width mask of the job header length field.
pub const HDR_DESCLEN_MASK: u32 = 0x7f;
/// Width mask of the shared header length field.
pub const HDR_DESCLEN_SHR_MASK: u32 = 0x3f;

bitflags! {
    /// Single-bit header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        /// Descriptor is loaded but not executed.
        const DO_NOT_RUN = 1 << 24;
        /// Fixed bit, always set.
        const ONE = 1 << 23;
        /// Run as a trusted descriptor (job header).
        const TRUSTED = 1 << 14;
        /// Sign into a trusted descriptor (job header).
        const MAKE_TRUSTED = 1 << 13;
        /// Job header: next word is a shared descriptor pointer.
        const SHARED = 1 << 12;
        /// Job header: run the job descriptor before the shared descriptor.
        const REVERSE = 1 << 11;
    }
}

/// Shared header: keep the context after the descriptor finishes.
/// Occupies the same bit as [`HeaderFlags::SHARED`].
pub const HDR_SAVECTX: u32 = 1 << 12;

/// Which kind of descriptor a header starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescKind {
    /// Per-invocation job descriptor.
    Job,
    /// Shared descriptor referenced by many job descriptors.
    Shared,
}

impl DescKind {
    fn command_type(self) -> CommandType {
        match self {
            Self::Job => CommandType::DescHeader,
            Self::Shared => CommandType::SharedDescHeader,
        }
    }

    /// Largest length the header can record.
    pub const fn max_len(self) -> usize {
        match self {
            Self::Job => HDR_DESCLEN_MASK as usize,
            Self::Shared => HDR_DESCLEN_SHR_MASK as usize,
        }
    }
}

/// How a shared descriptor is shared between jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SharePolicy {
    /// Always reload the shared descriptor.
    #[default]
    Never = 0,
    /// Share once the previous job has finished with it.
    Wait = 1,
    /// Share only between jobs serialized on the same engine.
    Serial = 2,
    /// Share freely.
    Always = 3,
    /// Job header only: use the policy of the referenced shared descriptor.
    Defer = 4,
}

impl SharePolicy {
    /// Decode a raw share field.
    pub fn from_raw(raw: u32) -> SecResult<Self> {
        Ok(match raw {
            0 => Self::Never,
            1 => Self::Wait,
            2 => Self::Serial,
            3 => Self::Always,
            4 => Self::Defer,
            _ => {
                return Err(SecError::UnknownSelector {
                    field: "share policy",
                    value: raw,
                })
            }
        })
    }
}

/// Order of execution between a job descriptor and its shared descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecOrder {
    /// Shared descriptor runs first (normal).
    #[default]
    SharedFirst,
    /// Job descriptor runs first.
    JobFirst,
}

/// Trust marking requested by the header.
///
/// Kept as an explicit caller choice: the encoder never derives it from
/// other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trust {
    /// Ordinary descriptor.
    #[default]
    Untrusted,
    /// Ask the job ring to sign the descriptor as trusted.
    MakeTrusted,
    /// Execute as an already signed trusted descriptor.
    Trusted,
}

/// Caller-selected header options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderOptions {
    pub share: SharePolicy,
    /// Shared headers only: keep context (save) instead of erasing it.
    pub save_context: bool,
    pub order: ExecOrder,
    pub trust: Trust,
    pub do_not_run: bool,
}

impl HeaderOptions {
    /// Options with the given share policy and everything else default.
    pub fn with_share(share: SharePolicy) -> Self {
        Self {
            share,
            ..Self::default()
        }
    }
}

/// Decoded header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: DescKind,
    pub start_index: usize,
    pub length: usize,
    pub share: SharePolicy,
    pub options: HeaderOptions,
    /// Job header: a shared descriptor pointer follows the header.
    pub shared_pointer: bool,
}

impl Header {
    /// Encode a header word.
    ///
    /// `length` counts every word of the descriptor including the header.
    pub fn encode(
        kind: DescKind,
        start_index: usize,
        length: usize,
        options: &HeaderOptions,
        shared_pointer: bool,
    ) -> SecResult<u32> {
        crate::command::check_field("length", length as u64, kind.max_len() as u64)?;
        crate::command::check_field(
            "start index",
            start_index as u64,
            HDR_START_IDX_MASK as u64,
        )?;
        if start_index > length {
            return Err(SecError::IllegalCombination(
                "start index beyond descriptor length",
            ));
        }

        let mut word = kind.command_type().bits() | HeaderFlags::ONE.bits();
        word |= (start_index as u32) << HDR_START_IDX_SHIFT;
        word |= length as u32;
        if options.do_not_run {
            word |= HeaderFlags::DO_NOT_RUN.bits();
        }

        match kind {
            DescKind::Shared => {
                if options.share == SharePolicy::Defer {
                    return Err(SecError::IllegalCombination(
                        "shared header cannot defer its share policy",
                    ));
                }
                if options.order == ExecOrder::JobFirst {
                    return Err(SecError::IllegalCombination(
                        "execution order only applies to job headers",
                    ));
                }
                if options.trust != Trust::Untrusted {
                    return Err(SecError::IllegalCombination(
                        "trust marking only applies to job headers",
                    ));
                }
                if shared_pointer {
                    return Err(SecError::IllegalCombination(
                        "shared descriptor cannot reference another shared descriptor",
                    ));
                }
                if options.save_context {
                    word |= HDR_SAVECTX;
                }
            }
            DescKind::Job => {
                if options.save_context {
                    return Err(SecError::IllegalCombination(
                        "context save only applies to shared headers",
                    ));
                }
                if options.order == ExecOrder::JobFirst && !shared_pointer {
                    return Err(SecError::IllegalCombination(
                        "execution order needs a shared descriptor pointer",
                    ));
                }
                if shared_pointer {
                    word |= HeaderFlags::SHARED.bits();
                }
                if options.order == ExecOrder::JobFirst {
                    word |= HeaderFlags::REVERSE.bits();
                }
                word |= match options.trust {
                    Trust::Untrusted => 0,
                    Trust::MakeTrusted => HeaderFlags::MAKE_TRUSTED.bits(),
                    Trust::Trusted => HeaderFlags::TRUSTED.bits(),
                };
            }
        }

        word |= (options.share as u32) << HDR_SHARE_SHIFT;
        Ok(word)
    }

    /// Decode a header word.
    pub fn decode(word: u32) -> SecResult<Self> {
        let kind = match CommandType::from_word(word) {
            Some(CommandType::DescHeader) => DescKind::Job,
            Some(CommandType::SharedDescHeader) => DescKind::Shared,
            _ => {
                return Err(SecError::UnknownSelector {
                    field: "header command",
                    value: word >> crate::opcode::CMD_SHIFT,
                })
            }
        };
        if word & HeaderFlags::ONE.bits() == 0 {
            return Err(SecError::IllegalCombination("header fixed bit clear"));
        }

        let (share_mask, len_mask) = match kind {
            DescKind::Job => (HDR_JD_SHARE_MASK, HDR_DESCLEN_MASK),
            DescKind::Shared => (HDR_SD_SHARE_MASK, HDR_DESCLEN_SHR_MASK),
        };
        let share = SharePolicy::from_raw((word >> HDR_SHARE_SHIFT) & share_mask)?;
        let flags = HeaderFlags::from_bits_truncate(word);

        let (shared_pointer, save_context, order, trust) = match kind {
            DescKind::Shared => (
                false,
                word & HDR_SAVECTX != 0,
                ExecOrder::SharedFirst,
                Trust::Untrusted,
            ),
            DescKind::Job => {
                let trust = if flags.contains(HeaderFlags::TRUSTED) {
                    Trust::Trusted
                } else if flags.contains(HeaderFlags::MAKE_TRUSTED) {
                    Trust::MakeTrusted
                } else {
                    Trust::Untrusted
                };
                let order = if flags.contains(HeaderFlags::REVERSE) {
                    ExecOrder::JobFirst
                } else {
                    ExecOrder::SharedFirst
                };
                (flags.contains(HeaderFlags::SHARED), false, order, trust)
            }
        };

        Ok(Self {
            kind,
            start_index: ((word >> HDR_START_IDX_SHIFT) & HDR_START_IDX_MASK) as usize,
            length: (word & len_mask) as usize,
            share,
            options: HeaderOptions {
                share,
                save_context,
                order,
                trust,
                do_not_run: flags.contains(HeaderFlags::DO_NOT_RUN),
            },
            shared_pointer,
        })
    }
}

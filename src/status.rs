// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Job completion status.
//!
//! The job ring passes the raw status word from the output ring to the
//! submitter untouched. [`JobStatus`] decodes it on demand; [`JobOutcome`]
//! tells a hardware completion apart from an entry aborted by ring teardown.

use std::fmt;

/// Position of the status source field.
pub const STATUS_SRC_SHIFT: u32 = 28;
/// Error was raised while the sequencer was executing a jump.
pub const STATUS_JUMP: u32 = 1 << 27;
/// CCB error: channel (accelerator) id position.
pub const CCB_CHAID_SHIFT: u32 = 4;
/// CCB error id reported for an integrity check value mismatch.
pub const CCB_ERRID_ICV_CHECK: u8 = 0xa;
/// DECO error: index of the failing command.
pub const DECO_INDEX_SHIFT: u32 = 8;

/// Which block reported the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// No error.
    None,
    /// A class accelerator (CHA) reported an error.
    Ccb,
    /// A JUMP halted the job with a user status.
    JumpHaltUser,
    /// The descriptor controller (sequencer) reported an error.
    Deco,
    /// The job ring rejected the job.
    JobRing,
    /// A JUMP halted the job on condition codes.
    JumpHaltCond,
    /// Reserved source value.
    Unknown(u8),
}

impl From<u8> for StatusSource {
    fn from(src: u8) -> Self {
        match src {
            0x0 => Self::None,
            0x2 => Self::Ccb,
            0x3 => Self::JumpHaltUser,
            0x4 => Self::Deco,
            0x6 => Self::JobRing,
            0x7 => Self::JumpHaltCond,
            _ => Self::Unknown(src),
        }
    }
}

/// Error reported by a class accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcbError {
    /// Accelerator (CHA) id.
    pub channel: u8,
    /// Error id within the accelerator.
    pub id: u8,
}

impl CcbError {
    /// Name of the accelerator that failed.
    pub fn channel_name(&self) -> &'static str {
        match self.channel {
            0x1 => "AES",
            0x2 => "DES",
            0x3 => "ARC4",
            0x4 => "MDHA",
            0x5 => "RNG",
            0x6 => "SNOW",
            0x7 => "KASUMI",
            0x8 => "PKHA",
            0x9 => "CRC",
            _ => "unknown",
        }
    }
}

/// Error reported by the descriptor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoError {
    /// Word index of the failing command.
    pub index: u8,
    pub code: u8,
}

/// Raw completion status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JobStatus(pub u32);

impl JobStatus {
    /// Status of a job that finished without error.
    pub const OK: Self = Self(0);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns true if the job finished without error.
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn source(self) -> StatusSource {
        StatusSource::from((self.0 >> STATUS_SRC_SHIFT) as u8)
    }

    /// The error happened inside a jump.
    pub fn during_jump(self) -> bool {
        self.0 & STATUS_JUMP != 0
    }

    pub fn ccb_error(self) -> Option<CcbError> {
        (self.source() == StatusSource::Ccb).then(|| CcbError {
            channel: ((self.0 >> CCB_CHAID_SHIFT) & 0xf) as u8,
            id: (self.0 & 0xf) as u8,
        })
    }

    /// Integrity check failed, e.g. an authentication tag mismatch on
    /// decapsulation.
    pub fn is_icv_failure(self) -> bool {
        self.ccb_error()
            .is_some_and(|e| e.id == CCB_ERRID_ICV_CHECK)
    }

    pub fn deco_error(self) -> Option<DecoError> {
        (self.source() == StatusSource::Deco).then(|| DecoError {
            index: (self.0 >> DECO_INDEX_SHIFT) as u8,
            code: self.0 as u8,
        })
    }

    /// Status byte of a user halt.
    pub fn user_status(self) -> Option<u8> {
        (self.source() == StatusSource::JumpHaltUser).then_some(self.0 as u8)
    }

    /// Error code reported by the job ring itself.
    pub fn job_ring_error(self) -> Option<u8> {
        (self.source() == StatusSource::JobRing).then_some(self.0 as u8)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            StatusSource::None => write!(f, "ok"),
            StatusSource::Ccb => {
                let e = self.ccb_error().unwrap_or(CcbError { channel: 0, id: 0 });
                if e.id == CCB_ERRID_ICV_CHECK {
                    write!(f, "{} integrity check failed", e.channel_name())
                } else {
                    write!(f, "{} error {:#x}", e.channel_name(), e.id)
                }
            }
            StatusSource::JumpHaltUser => write!(f, "halted by user status {:#04x}", self.0 as u8),
            StatusSource::Deco => write!(
                f,
                "DECO error {:#04x} at word {}",
                self.0 as u8,
                (self.0 >> DECO_INDEX_SHIFT) as u8
            ),
            StatusSource::JobRing => write!(f, "job ring error {:#04x}", self.0 as u8),
            StatusSource::JumpHaltCond => write!(f, "halted on condition {:#04x}", self.0 as u8),
            StatusSource::Unknown(src) => write!(f, "unknown source {src} ({:#010x})", self.0),
        }
    }
}

/// Final outcome of a submission, as seen by its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Hardware reported the job on the output ring.
    Completed(JobStatus),
    /// The ring was torn down before hardware reported the job.
    Aborted,
}

impl JobOutcome {
    /// Returns true if hardware completed the job without error.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(s) if s.is_success())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Hardware status, if hardware reported one.
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            Self::Completed(s) => Some(*s),
            Self::Aborted => None,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(s) => write!(f, "{s}"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        assert!(JobStatus::OK.is_success());
        assert_eq!(JobStatus::OK.source(), StatusSource::None);
        assert!(JobOutcome::Completed(JobStatus(0)).is_success());
    }

    #[test]
    fn test_aborted_differs_from_zero_status() {
        let aborted = JobOutcome::Aborted;
        assert!(!aborted.is_success());
        assert_eq!(aborted.status(), None);
        assert_ne!(aborted, JobOutcome::Completed(JobStatus::OK));
    }

    #[test]
    fn test_icv_failure() {
        // MDHA reporting an ICV mismatch.
        let status = JobStatus(0x2000_004a);
        assert_eq!(status.source(), StatusSource::Ccb);
        assert_eq!(status.ccb_error(), Some(CcbError { channel: 4, id: 0xa }));
        assert!(status.is_icv_failure());
        assert_eq!(status.to_string(), "MDHA integrity check failed");
    }

    #[test]
    fn test_deco_and_user_status() {
        let deco = JobStatus(0x4000_0583);
        assert_eq!(deco.deco_error(), Some(DecoError { index: 5, code: 0x83 }));
        assert!(!deco.is_icv_failure());

        let user = JobStatus(0x3000_0042);
        assert_eq!(user.user_status(), Some(0x42));
        assert_eq!(user.deco_error(), None);

        let jump = JobStatus(0x4800_0101);
        assert!(jump.during_jump());
        assert_eq!(jump.source(), StatusSource::Deco);
    }

    #[test]
    fn test_unknown_source() {
        let status = JobStatus(0x5000_0001);
        assert_eq!(status.source(), StatusSource::Unknown(5));
        assert!(!status.is_success());
    }
}

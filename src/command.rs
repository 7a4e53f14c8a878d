// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Typed descriptor commands.
//!
//! Each command type implements [`Command`]: it validates its own field
//! combination, reports how many words it occupies (the command word plus
//! any trailing pointer, length or immediate words) and appends exactly that
//! many words. [`DescriptorBuilder`](crate::builder::DescriptorBuilder) relies
//! on the three agreeing so that the header length always matches what was
//! written.

use crate::error::{SecError, SecResult};
use crate::opcode::CommandType;

/// Bytes per descriptor word.
pub const WORD_BYTES: usize = 4;

/// Largest length that fits the 16-bit inline length field of FIFO and
/// sequence commands. Longer transfers need an extended-length trailer.
pub const INLINE_LEN_MAX: u32 = 0xffff;

/// Bus address of a buffer as seen by the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DmaAddr(pub u64);

impl DmaAddr {
    /// Returns the raw address.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Upper 32 bits.
    #[inline]
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Lower 32 bits.
    #[inline]
    pub const fn low(self) -> u32 {
        self.0 as u32
    }
}

impl std::fmt::Display for DmaAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Number of words a bus address occupies inside a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// 32-bit bus addresses, one pointer word.
    Narrow,
    /// Bus addresses wider than 32 bits, two pointer words (high, low).
    Wide,
}

impl AddressWidth {
    /// Words used by one pointer.
    #[inline]
    pub const fn words(self) -> usize {
        match self {
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }
}

impl Default for AddressWidth {
    #[cfg(feature = "wide-addr")]
    fn default() -> Self {
        Self::Wide
    }

    #[cfg(not(feature = "wide-addr"))]
    fn default() -> Self {
        Self::Narrow
    }
}

/// A descriptor command that can be appended to a descriptor.
pub trait Command {
    /// Command type written in bits [31:27] of the first word.
    fn command_type(&self) -> CommandType;

    /// Total words this command occupies, trailers included.
    fn word_count(&self, width: AddressWidth) -> usize;

    /// Reject illegal field combinations before anything is written.
    ///
    /// `position` is the word index the command word will occupy.
    fn validate(&self, _position: usize, _width: AddressWidth) -> SecResult<()> {
        Ok(())
    }

    /// Append the command word and its trailers to `out`.
    ///
    /// Only called after [`validate`](Command::validate) succeeded, and must
    /// push exactly [`word_count`](Command::word_count) words.
    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>);
}

/// Source of an operand that is either copied into the descriptor or fetched
/// by the accelerator from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand<'a> {
    /// Bytes copied verbatim into the descriptor.
    Inline(&'a [u8]),
    /// Bytes the accelerator reads from a bus address.
    Pointer(DmaAddr),
}

impl Operand<'_> {
    /// Words of trailer this operand adds after the command word.
    pub(crate) fn trailer_words(&self, width: AddressWidth) -> usize {
        match self {
            Self::Inline(bytes) => words_for(bytes.len()),
            Self::Pointer(_) => width.words(),
        }
    }

    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    pub(crate) fn check(&self, width: AddressWidth) -> SecResult<()> {
        match self {
            Self::Inline(_) => Ok(()),
            Self::Pointer(addr) => check_addr(*addr, width),
        }
    }

    pub(crate) fn push(&self, width: AddressWidth, out: &mut Vec<u32>) {
        match self {
            Self::Inline(bytes) => push_bytes(out, bytes),
            Self::Pointer(addr) => push_addr(out, *addr, width),
        }
    }
}

/// Words needed to hold `len` bytes.
#[inline]
pub const fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BYTES)
}

/// Check that a value fits a field of `max`.
pub(crate) fn check_field(field: &'static str, value: u64, max: u64) -> SecResult<()> {
    if value > max {
        return Err(SecError::FieldOverflow { field, value, max });
    }
    Ok(())
}

/// Narrow builds can only express 32-bit bus addresses.
pub(crate) fn check_addr(addr: DmaAddr, width: AddressWidth) -> SecResult<()> {
    match width {
        AddressWidth::Narrow => check_field("address", addr.get(), u32::MAX as u64),
        AddressWidth::Wide => Ok(()),
    }
}

/// Append a bus address as one word or as (high, low).
pub(crate) fn push_addr(out: &mut Vec<u32>, addr: DmaAddr, width: AddressWidth) {
    if width == AddressWidth::Wide {
        out.push(addr.high());
    }
    out.push(addr.low());
}

/// Append raw bytes, packed big-endian into words and zero padded, so that
/// the big-endian image of the descriptor carries them verbatim.
pub(crate) fn push_bytes(out: &mut Vec<u32>, bytes: &[u8]) {
    for chunk in bytes.chunks(WORD_BYTES) {
        let mut word = [0u8; WORD_BYTES];
        word[..chunk.len()].copy_from_slice(chunk);
        out.push(u32::from_be_bytes(word));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_for() {
        assert_eq!(words_for(0), 0);
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(4), 1);
        assert_eq!(words_for(5), 2);
        assert_eq!(words_for(16), 4);
    }

    #[test]
    fn test_push_addr_widths() {
        let addr = DmaAddr(0x0000_0012_3456_7890);
        let mut narrow = Vec::new();
        push_addr(&mut narrow, addr, AddressWidth::Narrow);
        assert_eq!(narrow, vec![0x3456_7890]);

        let mut wide = Vec::new();
        push_addr(&mut wide, addr, AddressWidth::Wide);
        assert_eq!(wide, vec![0x0000_0012, 0x3456_7890]);
    }

    #[test]
    fn test_narrow_rejects_high_address() {
        assert!(check_addr(DmaAddr(0xffff_ffff), AddressWidth::Narrow).is_ok());
        assert!(matches!(
            check_addr(DmaAddr(0x1_0000_0000), AddressWidth::Narrow),
            Err(SecError::FieldOverflow { field: "address", .. })
        ));
        assert!(check_addr(DmaAddr(0x1_0000_0000), AddressWidth::Wide).is_ok());
    }

    #[test]
    fn test_push_bytes_is_verbatim_big_endian() {
        let mut out = Vec::new();
        push_bytes(&mut out, &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(out, vec![0x0102_0304, 0x0500_0000]);
    }

    #[test]
    fn test_operand_trailer_words() {
        let key = [0u8; 16];
        assert_eq!(Operand::Inline(&key).trailer_words(AddressWidth::Narrow), 4);
        assert_eq!(
            Operand::Pointer(DmaAddr(0x1000)).trailer_words(AddressWidth::Narrow),
            1
        );
        assert_eq!(
            Operand::Pointer(DmaAddr(0x1000)).trailer_words(AddressWidth::Wide),
            2
        );
    }
}

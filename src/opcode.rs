// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Command types and class selectors.
//!
//! Every descriptor word starts with a five-bit command type in bits [31:27].
//! Most commands carry a two-bit class selector in bits [26:25] that routes
//! the command to the class-1 (cipher) or class-2 (hash) accelerator.

/// Position of the command type field.
pub const CMD_SHIFT: u32 = 27;
/// Mask of the command type field.
pub const CMD_MASK: u32 = 0x1f << CMD_SHIFT;

/// Position of the class selector field.
pub const CLASS_SHIFT: u32 = 25;
/// Mask of the class selector field.
pub const CLASS_MASK: u32 = 0x03 << CLASS_SHIFT;

/// Descriptor command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Load key material into a key register.
    Key = 0x00,
    /// Load key material from the input sequence.
    SeqKey = 0x01,
    /// Load data into a register or context.
    Load = 0x02,
    /// Load data from the input sequence into a register or context.
    SeqLoad = 0x03,
    /// Feed data into an input FIFO.
    FifoLoad = 0x04,
    /// Feed input sequence data into an input FIFO.
    SeqFifoLoad = 0x05,
    /// Store a register or context to memory.
    Store = 0x0a,
    /// Store a register or context to the output sequence.
    SeqStore = 0x0b,
    /// Drain the output FIFO to memory.
    FifoStore = 0x0c,
    /// Drain the output FIFO to the output sequence.
    SeqFifoStore = 0x0d,
    /// Move with length taken from a math register.
    MoveLen = 0x0e,
    /// Move data between internal locations.
    Move = 0x0f,
    /// Select an algorithm or protocol to run.
    Operation = 0x10,
    /// Verify a descriptor signature.
    Signature = 0x12,
    /// Conditional or unconditional control transfer.
    Jump = 0x14,
    /// Arithmetic on math registers.
    Math = 0x15,
    /// Job descriptor header.
    DescHeader = 0x16,
    /// Shared descriptor header.
    SharedDescHeader = 0x17,
    /// Define the input sequence.
    SeqInPtr = 0x1e,
    /// Define the output sequence.
    SeqOutPtr = 0x1f,
}

impl CommandType {
    /// Returns the raw five-bit command type.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the command type positioned in bits [31:27].
    #[inline]
    pub const fn bits(self) -> u32 {
        (self as u32) << CMD_SHIFT
    }

    /// Decode the command type of a descriptor word.
    pub fn from_word(word: u32) -> Option<Self> {
        let raw = (word & CMD_MASK) >> CMD_SHIFT;
        Some(match raw {
            0x00 => Self::Key,
            0x01 => Self::SeqKey,
            0x02 => Self::Load,
            0x03 => Self::SeqLoad,
            0x04 => Self::FifoLoad,
            0x05 => Self::SeqFifoLoad,
            0x0a => Self::Store,
            0x0b => Self::SeqStore,
            0x0c => Self::FifoStore,
            0x0d => Self::SeqFifoStore,
            0x0e => Self::MoveLen,
            0x0f => Self::Move,
            0x10 => Self::Operation,
            0x12 => Self::Signature,
            0x14 => Self::Jump,
            0x15 => Self::Math,
            0x16 => Self::DescHeader,
            0x17 => Self::SharedDescHeader,
            0x1e => Self::SeqInPtr,
            0x1f => Self::SeqOutPtr,
            _ => return None,
        })
    }

    /// Returns a human-readable name for the command.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Key => "KEY",
            Self::SeqKey => "SEQ_KEY",
            Self::Load => "LOAD",
            Self::SeqLoad => "SEQ_LOAD",
            Self::FifoLoad => "FIFO_LOAD",
            Self::SeqFifoLoad => "SEQ_FIFO_LOAD",
            Self::Store => "STORE",
            Self::SeqStore => "SEQ_STORE",
            Self::FifoStore => "FIFO_STORE",
            Self::SeqFifoStore => "SEQ_FIFO_STORE",
            Self::MoveLen => "MOVE_LEN",
            Self::Move => "MOVE",
            Self::Operation => "OPERATION",
            Self::Signature => "SIGNATURE",
            Self::Jump => "JUMP",
            Self::Math => "MATH",
            Self::DescHeader => "HEADER",
            Self::SharedDescHeader => "SHR_HEADER",
            Self::SeqInPtr => "SEQ_IN_PTR",
            Self::SeqOutPtr => "SEQ_OUT_PTR",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.as_u8())
    }
}

/// Class selector carried by key, load, store, FIFO and jump commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Class {
    /// Not bound to a class accelerator.
    #[default]
    Independent = 0,
    /// Class-1 (cipher) accelerator.
    Class1 = 1,
    /// Class-2 (authentication) accelerator.
    Class2 = 2,
    /// Both class accelerators.
    Both = 3,
}

impl Class {
    /// Returns the class positioned in bits [26:25].
    #[inline]
    pub const fn bits(self) -> u32 {
        (self as u32) << CLASS_SHIFT
    }

    /// Decode the class selector of a descriptor word.
    pub const fn from_word(word: u32) -> Self {
        match (word & CLASS_MASK) >> CLASS_SHIFT {
            0 => Self::Independent,
            1 => Self::Class1,
            2 => Self::Class2,
            _ => Self::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_values() {
        assert_eq!(CommandType::Key.bits(), 0x0000_0000);
        assert_eq!(CommandType::Load.bits(), 0x1000_0000);
        assert_eq!(CommandType::Operation.bits(), 0x8000_0000);
        assert_eq!(CommandType::Jump.bits(), 0xa000_0000);
        assert_eq!(CommandType::DescHeader.bits(), 0xb000_0000);
        assert_eq!(CommandType::SharedDescHeader.bits(), 0xb800_0000);
        assert_eq!(CommandType::SeqInPtr.bits(), 0xf000_0000);
        assert_eq!(CommandType::SeqOutPtr.bits(), 0xf800_0000);
    }

    #[test]
    fn test_from_word() {
        assert_eq!(
            CommandType::from_word(0xb080_0003),
            Some(CommandType::DescHeader)
        );
        assert_eq!(CommandType::from_word(0x4000_0000), None);
        assert_eq!(Class::from_word(0x0400_0000), Class::Class2);
        assert_eq!(Class::from_word(0x0200_0000), Class::Class1);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(format!("{}", CommandType::Operation), "OPERATION (0x10)");
        assert_eq!(format!("{}", CommandType::Jump), "JUMP (0x14)");
    }
}

// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! JUMP and MATH commands for loops and arithmetic inside a descriptor.

use bitflags::bitflags;

use crate::builder::MAX_DESC_WORDS;
use crate::command::{check_addr, check_field, push_addr, AddressWidth, Command, DmaAddr};
use crate::error::{SecError, SecResult};
use crate::opcode::{Class, CommandType};

/// Condition bits select the shared-state set instead of the math set.
pub const JUMP_JSL: u32 = 1 << 24;
/// Position of the jump type.
pub const JUMP_TYPE_SHIFT: u32 = 22;
/// Position of the jump test.
pub const JUMP_TEST_SHIFT: u32 = 16;

/// Ignore the math result, only set flags.
pub const MATH_NFU: u32 = 1 << 25;
/// Immediate operand follows in the descriptor.
pub const MATH_IFB: u32 = 1 << 26;
/// Stall until the operation completes.
pub const MATH_STL: u32 = 1 << 24;
/// Position of the math function.
pub const MATH_FUN_SHIFT: u32 = 20;
/// Position of source 0.
pub const MATH_SRC0_SHIFT: u32 = 16;
/// Position of source 1.
pub const MATH_SRC1_SHIFT: u32 = 12;
/// Position of the destination.
pub const MATH_DEST_SHIFT: u32 = 8;

bitflags! {
    /// Math and public-key conditions tested by a jump.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MathCond: u32 {
        const PK_ZERO = 0x80 << 8;
        const PK_GCD_ONE = 0x40 << 8;
        const PK_PRIME = 0x20 << 8;
        const NEGATIVE = 0x08 << 8;
        const ZERO = 0x04 << 8;
        const CARRY = 0x02 << 8;
        const NOT_VALID = 0x01 << 8;
    }
}

bitflags! {
    /// Shared-state conditions tested by a jump.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShareCond: u32 {
        /// Job queue is in a pending state.
        const JOB_QUEUE_PENDING = 0x80 << 8;
        /// Shared descriptor was shared (not reloaded).
        const SHARED = 0x40 << 8;
        const SELF = 0x20 << 8;
        /// Class accelerators done.
        const CALM = 0x10 << 8;
        /// No input pending.
        const NO_INPUT_PENDING = 0x08 << 8;
        /// No input FIFO pending.
        const NO_INFIFO_PENDING = 0x04 << 8;
        /// No output pending.
        const NO_OUTPUT_PENDING = 0x02 << 8;
        /// Class-2 context not pending.
        const NO_CONTEXT_PENDING = 0x01 << 8;
    }
}

/// Condition evaluated by a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCond {
    /// Always taken.
    Always,
    Math(MathCond),
    Share(ShareCond),
}

/// How the selected conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum JumpTest {
    #[default]
    All = 0,
    NotAll = 1,
    Any = 2,
    NotAny = 3,
}

/// Where a jump goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// Signed word offset from the jump command.
    Local(i8),
    /// Continue with another descriptor.
    NonLocal(DmaAddr),
    /// Stop the job.
    Halt,
    /// Stop the job and report a user status byte.
    HaltUser(u8),
}

/// A JUMP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jump {
    pub class: Class,
    pub target: JumpTarget,
    pub cond: JumpCond,
    pub test: JumpTest,
}

impl Jump {
    /// Unconditional local jump.
    pub fn local(offset: i8) -> Self {
        Self {
            class: Class::Independent,
            target: JumpTarget::Local(offset),
            cond: JumpCond::Always,
            test: JumpTest::All,
        }
    }

    /// Conditional jump.
    pub fn when(target: JumpTarget, cond: JumpCond, test: JumpTest) -> Self {
        Self {
            class: Class::Independent,
            target,
            cond,
            test,
        }
    }
}

impl Command for Jump {
    fn command_type(&self) -> CommandType {
        CommandType::Jump
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        match self.target {
            JumpTarget::NonLocal(_) => 1 + width.words(),
            _ => 1,
        }
    }

    fn validate(&self, position: usize, width: AddressWidth) -> SecResult<()> {
        match self.target {
            JumpTarget::Local(offset) => {
                let dest = position as i64 + offset as i64;
                if dest < 0 || dest >= MAX_DESC_WORDS as i64 {
                    return Err(SecError::JumpOutOfRange {
                        from: position,
                        offset,
                    });
                }
                Ok(())
            }
            JumpTarget::NonLocal(addr) => check_addr(addr, width),
            JumpTarget::Halt | JumpTarget::HaltUser(_) => Ok(()),
        }
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let (kind, low) = match self.target {
            JumpTarget::Local(offset) => (0u32, offset as u8 as u32),
            JumpTarget::NonLocal(_) => (1, 0),
            JumpTarget::Halt => (2, 0),
            JumpTarget::HaltUser(status) => (3, status as u32),
        };
        let mut word = CommandType::Jump.bits() | self.class.bits();
        word |= kind << JUMP_TYPE_SHIFT;
        word |= (self.test as u32) << JUMP_TEST_SHIFT;
        word |= match self.cond {
            JumpCond::Always => 0,
            JumpCond::Math(c) => c.bits(),
            JumpCond::Share(c) => JUMP_JSL | c.bits(),
        };
        word |= low;
        out.push(word);
        if let JumpTarget::NonLocal(addr) = self.target {
            push_addr(out, addr, width);
        }
    }
}

/// Math function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MathFn {
    Add = 0x0,
    AddCarry = 0x1,
    Sub = 0x2,
    SubBorrow = 0x3,
    Or = 0x4,
    And = 0x5,
    Xor = 0x6,
    ShiftLeft = 0x7,
    ShiftRight = 0x8,
    ShiftLeftDouble = 0x9,
    ZeroByte = 0xa,
}

/// First math operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MathSrc0 {
    Reg0 = 0x0,
    Reg1 = 0x1,
    Reg2 = 0x2,
    Reg3 = 0x3,
    Imm = 0x4,
    ProtocolOverride = 0x7,
    SeqInLen = 0x8,
    SeqOutLen = 0x9,
    VarSeqInLen = 0xa,
    VarSeqOutLen = 0xb,
    Zero = 0xc,
    One = 0xf,
}

/// Second math operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MathSrc1 {
    Reg0 = 0x0,
    Reg1 = 0x1,
    Reg2 = 0x2,
    Reg3 = 0x3,
    Imm = 0x4,
    ProtocolOverride = 0x7,
    InputFifo = 0xa,
    OutputFifo = 0xb,
    One = 0xc,
    JobSource = 0xd,
    Zero = 0xf,
}

/// Math result destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MathDest {
    Reg0 = 0x0,
    Reg1 = 0x1,
    Reg2 = 0x2,
    Reg3 = 0x3,
    ProtocolOverride = 0x7,
    SeqInLen = 0x8,
    SeqOutLen = 0x9,
    VarSeqInLen = 0xa,
    VarSeqOutLen = 0xb,
    None = 0xf,
}

/// Operand width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MathLen {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

bitflags! {
    /// Optional MATH flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MathFlags: u32 {
        const NO_UPDATE = MATH_NFU;
        const STALL = MATH_STL;
    }
}

/// A MATH command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Math {
    pub func: MathFn,
    pub src0: MathSrc0,
    pub src1: MathSrc1,
    pub dest: MathDest,
    pub len: MathLen,
    /// Value for an immediate source.
    pub imm: Option<u64>,
    pub flags: MathFlags,
}

impl Math {
    /// `dest = src0 <func> src1` on four-byte operands.
    pub fn new(func: MathFn, src0: MathSrc0, src1: MathSrc1, dest: MathDest) -> Self {
        Self {
            func,
            src0,
            src1,
            dest,
            len: MathLen::Four,
            imm: None,
            flags: MathFlags::empty(),
        }
    }

    /// Sets the immediate operand value.
    pub fn with_imm(mut self, value: u64) -> Self {
        self.imm = Some(value);
        self
    }

    fn imm_words(&self) -> usize {
        match (self.imm, self.len) {
            (None, _) => 0,
            (Some(_), MathLen::Eight) => 2,
            (Some(_), _) => 1,
        }
    }
}

impl Command for Math {
    fn command_type(&self) -> CommandType {
        CommandType::Math
    }

    fn word_count(&self, _width: AddressWidth) -> usize {
        1 + self.imm_words()
    }

    fn validate(&self, _position: usize, _width: AddressWidth) -> SecResult<()> {
        let imm0 = self.src0 == MathSrc0::Imm;
        let imm1 = self.src1 == MathSrc1::Imm;
        if imm0 && imm1 {
            return Err(SecError::IllegalCombination(
                "only one math source can be immediate",
            ));
        }
        match self.imm {
            Some(_) if !(imm0 || imm1) => Err(SecError::IllegalCombination(
                "immediate value without an immediate source",
            )),
            None if imm0 || imm1 => Err(SecError::IllegalCombination(
                "immediate source without a value",
            )),
            Some(value) if self.len != MathLen::Eight => {
                let bits = 8 * self.len as u32;
                check_field("math immediate", value, (1u64 << bits) - 1)
            }
            _ => Ok(()),
        }
    }

    fn encode(&self, _width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = CommandType::Math.bits() | self.flags.bits();
        if self.imm.is_some() {
            word |= MATH_IFB;
        }
        word |= (self.func as u32) << MATH_FUN_SHIFT;
        word |= (self.src0 as u32) << MATH_SRC0_SHIFT;
        word |= (self.src1 as u32) << MATH_SRC1_SHIFT;
        word |= (self.dest as u32) << MATH_DEST_SHIFT;
        word |= self.len as u32;
        out.push(word);
        match (self.imm, self.len) {
            (Some(value), MathLen::Eight) => {
                out.push((value >> 32) as u32);
                out.push(value as u32);
            }
            (Some(value), _) => out.push(value as u32),
            (None, _) => {}
        }
    }
}

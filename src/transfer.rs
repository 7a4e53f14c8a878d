// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Data transfer commands: LOAD, STORE, FIFO LOAD, FIFO STORE, SEQ IN PTR,
//! SEQ OUT PTR and MOVE.
//!
//! Commands with a 16-bit length field switch to an extended-length trailer
//! word when the length does not fit. The trailer order is always command
//! word, pointer (if any), extended length (if any), inline data (if any).

use bitflags::bitflags;

use crate::command::{
    check_addr, check_field, push_addr, push_bytes, words_for, AddressWidth, Command, DmaAddr,
    INLINE_LEN_MAX,
};
use crate::error::{SecError, SecResult};
use crate::opcode::{Class, CommandType};

/// LOAD/STORE: pointer is a scatter-gather table.
pub const LDST_SGF: u32 = 1 << 24;
/// LOAD: data is inline.
pub const LDST_IMM: u32 = 1 << 23;
/// LOAD/STORE register selector position.
pub const LDST_SRCDST_SHIFT: u32 = 16;
/// LOAD/STORE byte offset position.
pub const LDST_OFFSET_SHIFT: u32 = 8;
/// LOAD/STORE length mask.
pub const LDST_LEN_MASK: u32 = 0xff;

/// FIFO LOAD/STORE: pointer is a scatter-gather table.
pub const FIFO_SGF: u32 = 1 << 24;
/// FIFO LOAD: data is inline.
pub const FIFOLD_IMM: u32 = 1 << 23;
/// FIFO STORE: continue, more data for this type follows.
pub const FIFOST_CONT: u32 = 1 << 23;
/// FIFO LOAD/STORE: length is in a trailing word.
pub const FIFO_EXT: u32 = 1 << 22;
/// FIFO data type position.
pub const FIFO_TYPE_SHIFT: u32 = 16;

/// MOVE: wait for the source to be complete.
pub const MOVE_WAITCOMP: u32 = 1 << 24;
/// MOVE source position.
pub const MOVE_SRC_SHIFT: u32 = 20;
/// MOVE destination position.
pub const MOVE_DEST_SHIFT: u32 = 16;
/// MOVE offset position.
pub const MOVE_OFFSET_SHIFT: u32 = 8;

/// Where transferred data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource<'a> {
    /// Copied into the descriptor after the command.
    Inline(&'a [u8]),
    /// Fetched from a bus address.
    Pointer(DmaAddr),
    /// Taken from the job's input sequence.
    Sequence,
}

impl DataSource<'_> {
    fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence)
    }
}

/// Where transferred data goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSink {
    /// Written to a bus address.
    Pointer(DmaAddr),
    /// Appended to the job's output sequence.
    Sequence,
}

/// Internal register addressed by LOAD and STORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Mode = 0x00,
    KeySize = 0x01,
    DataSize = 0x02,
    IcvSize = 0x03,
    ChangeControl = 0x06,
    IrqControl = 0x07,
    ClearWritten = 0x08,
    Context = 0x20,
    Key = 0x40,
    InfoFifo = 0x7a,
    InputFifo = 0x7c,
    OutputFifo = 0x7e,
}

impl Register {
    /// Registers that belong to a class accelerator.
    fn is_class_register(self) -> bool {
        matches!(
            self,
            Self::Mode | Self::KeySize | Self::DataSize | Self::IcvSize | Self::Context | Self::Key
        )
    }

    fn check_class(self, class: Class) -> SecResult<()> {
        let class_bound = matches!(class, Class::Class1 | Class::Class2);
        if self.is_class_register() != class_bound {
            return Err(SecError::IllegalCombination(
                "register does not match the command class",
            ));
        }
        Ok(())
    }
}

/// A LOAD (or SEQ LOAD) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Load<'a> {
    pub class: Class,
    pub dest: Register,
    pub offset: u8,
    /// Bytes to load. Must equal the slice length for inline data.
    pub len: u32,
    pub source: DataSource<'a>,
    pub scatter_gather: bool,
}

impl<'a> Load<'a> {
    /// Inline immediate load.
    pub fn immediate(class: Class, dest: Register, offset: u8, data: &'a [u8]) -> Self {
        Self {
            class,
            dest,
            offset,
            len: data.len() as u32,
            source: DataSource::Inline(data),
            scatter_gather: false,
        }
    }
}

impl Command for Load<'_> {
    fn command_type(&self) -> CommandType {
        match self.source {
            DataSource::Sequence => CommandType::SeqLoad,
            _ => CommandType::Load,
        }
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        1 + match self.source {
            DataSource::Inline(bytes) => words_for(bytes.len()),
            DataSource::Pointer(_) => width.words(),
            DataSource::Sequence => 0,
        }
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        self.dest.check_class(self.class)?;
        check_field("load length", self.len as u64, LDST_LEN_MASK as u64)?;
        if self.scatter_gather && !matches!(self.source, DataSource::Pointer(_)) {
            return Err(SecError::IllegalCombination(
                "scatter-gather load needs a pointer",
            ));
        }
        match self.source {
            DataSource::Inline(bytes) if bytes.len() != self.len as usize => Err(
                SecError::IllegalCombination("inline load bytes do not match the length"),
            ),
            DataSource::Pointer(addr) => check_addr(addr, width),
            _ => Ok(()),
        }
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits() | self.class.bits();
        if self.scatter_gather {
            word |= LDST_SGF;
        }
        if matches!(self.source, DataSource::Inline(_)) {
            word |= LDST_IMM;
        }
        word |= (self.dest as u32) << LDST_SRCDST_SHIFT;
        word |= (self.offset as u32) << LDST_OFFSET_SHIFT;
        word |= self.len;
        out.push(word);
        match self.source {
            DataSource::Inline(bytes) => push_bytes(out, bytes),
            DataSource::Pointer(addr) => push_addr(out, addr, width),
            DataSource::Sequence => {}
        }
    }
}

/// A STORE (or SEQ STORE) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Store {
    pub class: Class,
    pub source: Register,
    pub offset: u8,
    pub len: u32,
    pub sink: DataSink,
    pub scatter_gather: bool,
}

impl Command for Store {
    fn command_type(&self) -> CommandType {
        match self.sink {
            DataSink::Sequence => CommandType::SeqStore,
            DataSink::Pointer(_) => CommandType::Store,
        }
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        match self.sink {
            DataSink::Pointer(_) => 1 + width.words(),
            DataSink::Sequence => 1,
        }
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        self.source.check_class(self.class)?;
        if matches!(
            self.source,
            Register::Key | Register::InfoFifo | Register::InputFifo
        ) {
            return Err(SecError::IllegalCombination("register cannot be stored"));
        }
        check_field("store length", self.len as u64, LDST_LEN_MASK as u64)?;
        match self.sink {
            DataSink::Pointer(addr) => check_addr(addr, width),
            DataSink::Sequence if self.scatter_gather => Err(SecError::IllegalCombination(
                "scatter-gather store needs a pointer",
            )),
            DataSink::Sequence => Ok(()),
        }
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits() | self.class.bits();
        if self.scatter_gather {
            word |= LDST_SGF;
        }
        word |= (self.source as u32) << LDST_SRCDST_SHIFT;
        word |= (self.offset as u32) << LDST_OFFSET_SHIFT;
        word |= self.len;
        out.push(word);
        if let DataSink::Pointer(addr) = self.sink {
            push_addr(out, addr, width);
        }
    }
}

/// Input data type of a FIFO LOAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FifoLoadType {
    /// Message data.
    Message = 0x10,
    /// Message to class 1, output copied to class 2.
    Message1Out2 = 0x18,
    /// Initialization vector.
    Iv = 0x20,
    /// Bit-length message data.
    BitData = 0x2c,
    /// Additional authenticated data.
    Aad = 0x30,
    /// Integrity check value to verify.
    Icv = 0x38,
}

/// Last/flush marking of a FIFO LOAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FifoLast {
    #[default]
    None = 0x00,
    Flush1 = 0x01,
    Last1 = 0x02,
    Last2Flush = 0x03,
    Last2 = 0x04,
    Last2Flush1 = 0x05,
    LastBoth = 0x06,
    LastBothFlush = 0x07,
}

/// A FIFO LOAD (or SEQ FIFO LOAD) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoLoad<'a> {
    pub class: Class,
    pub kind: FifoLoadType,
    pub last: FifoLast,
    pub source: DataSource<'a>,
    pub len: u32,
    pub scatter_gather: bool,
}

impl<'a> FifoLoad<'a> {
    /// Load `len` bytes of the input sequence.
    pub fn sequence(class: Class, kind: FifoLoadType, last: FifoLast, len: u32) -> Self {
        Self {
            class,
            kind,
            last,
            source: DataSource::Sequence,
            len,
            scatter_gather: false,
        }
    }

    /// Load bytes from a bus address.
    pub fn pointer(class: Class, kind: FifoLoadType, addr: DmaAddr, len: u32) -> Self {
        Self {
            class,
            kind,
            last: FifoLast::None,
            source: DataSource::Pointer(addr),
            len,
            scatter_gather: false,
        }
    }

    /// Load bytes copied into the descriptor.
    pub fn immediate(class: Class, kind: FifoLoadType, data: &'a [u8]) -> Self {
        Self {
            class,
            kind,
            last: FifoLast::None,
            source: DataSource::Inline(data),
            len: data.len() as u32,
            scatter_gather: false,
        }
    }

    fn extended(&self) -> bool {
        !matches!(self.source, DataSource::Inline(_)) && self.len > INLINE_LEN_MAX
    }
}

impl Command for FifoLoad<'_> {
    fn command_type(&self) -> CommandType {
        if self.source.is_sequence() {
            CommandType::SeqFifoLoad
        } else {
            CommandType::FifoLoad
        }
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        let body = match self.source {
            DataSource::Inline(bytes) => words_for(bytes.len()),
            DataSource::Pointer(_) => width.words(),
            DataSource::Sequence => 0,
        };
        1 + body + usize::from(self.extended())
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        if self.class == Class::Independent {
            return Err(SecError::IllegalCombination("FIFO load needs a class"));
        }
        if self.scatter_gather && !matches!(self.source, DataSource::Pointer(_)) {
            return Err(SecError::IllegalCombination(
                "scatter-gather FIFO load needs a pointer",
            ));
        }
        match self.source {
            DataSource::Inline(bytes) => {
                check_field("inline FIFO length", bytes.len() as u64, INLINE_LEN_MAX as u64)?;
                if bytes.len() != self.len as usize {
                    return Err(SecError::IllegalCombination(
                        "inline FIFO bytes do not match the length",
                    ));
                }
                Ok(())
            }
            DataSource::Pointer(addr) => check_addr(addr, width),
            DataSource::Sequence => Ok(()),
        }
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits() | self.class.bits();
        if self.scatter_gather {
            word |= FIFO_SGF;
        }
        if matches!(self.source, DataSource::Inline(_)) {
            word |= FIFOLD_IMM;
        }
        word |= ((self.kind as u32) | (self.last as u32)) << FIFO_TYPE_SHIFT;
        if self.extended() {
            word |= FIFO_EXT;
        } else {
            word |= self.len;
        }
        out.push(word);
        match self.source {
            DataSource::Inline(bytes) => push_bytes(out, bytes),
            DataSource::Pointer(addr) => push_addr(out, addr, width),
            DataSource::Sequence => {}
        }
        if self.extended() {
            out.push(self.len);
        }
    }
}

/// Output data type of a FIFO STORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FifoStoreType {
    /// Key register encrypted with the key-encryption key.
    KeyKek = 0x24,
    /// Key register encrypted with the trusted key-encryption key.
    KeyTkek = 0x25,
    /// Output message data.
    Message = 0x30,
    /// Random number generator output.
    Rng = 0x34,
    /// Discard output FIFO data.
    Skip = 0x3f,
}

/// A FIFO STORE (or SEQ FIFO STORE) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStore {
    pub class: Class,
    pub kind: FifoStoreType,
    pub sink: DataSink,
    pub len: u32,
    pub scatter_gather: bool,
    /// More data of this type follows in another command.
    pub cont: bool,
}

impl FifoStore {
    /// Store `len` message bytes to the output sequence.
    pub fn sequence(len: u32) -> Self {
        Self {
            class: Class::Independent,
            kind: FifoStoreType::Message,
            sink: DataSink::Sequence,
            len,
            scatter_gather: false,
            cont: false,
        }
    }

    fn extended(&self) -> bool {
        self.len > INLINE_LEN_MAX
    }
}

impl Command for FifoStore {
    fn command_type(&self) -> CommandType {
        match self.sink {
            DataSink::Sequence => CommandType::SeqFifoStore,
            DataSink::Pointer(_) => CommandType::FifoStore,
        }
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        let ptr = match self.sink {
            DataSink::Pointer(_) => width.words(),
            DataSink::Sequence => 0,
        };
        1 + ptr + usize::from(self.extended())
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        let key_store = matches!(self.kind, FifoStoreType::KeyKek | FifoStoreType::KeyTkek);
        let class_bound = matches!(self.class, Class::Class1 | Class::Class2);
        if key_store != class_bound {
            return Err(SecError::IllegalCombination(
                "only key stores select a class key register",
            ));
        }
        match self.sink {
            DataSink::Pointer(addr) => check_addr(addr, width),
            DataSink::Sequence if self.scatter_gather => Err(SecError::IllegalCombination(
                "scatter-gather FIFO store needs a pointer",
            )),
            DataSink::Sequence => Ok(()),
        }
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits() | self.class.bits();
        if self.scatter_gather {
            word |= FIFO_SGF;
        }
        if self.cont {
            word |= FIFOST_CONT;
        }
        word |= (self.kind as u32) << FIFO_TYPE_SHIFT;
        if self.extended() {
            word |= FIFO_EXT;
        } else {
            word |= self.len;
        }
        out.push(word);
        if let DataSink::Pointer(addr) = self.sink {
            push_addr(out, addr, width);
        }
        if self.extended() {
            out.push(self.len);
        }
    }
}

/// Direction of a sequence pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqDir {
    In,
    Out,
}

bitflags! {
    /// Optional SEQ IN/OUT PTR flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SeqFlags: u32 {
        /// Pointer is a scatter-gather table.
        const SCATTER_GATHER = 1 << 24;
        /// Restore a previously saved sequence (input only).
        const RESTORE = 1 << 21;
    }
}

/// Extended length flag of the sequence pointer commands.
pub const SEQ_EXT: u32 = 1 << 22;

/// A SEQ IN PTR or SEQ OUT PTR command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqPtr {
    pub dir: SeqDir,
    pub addr: DmaAddr,
    pub len: u32,
    pub flags: SeqFlags,
}

impl SeqPtr {
    /// Direct input sequence.
    pub fn input(addr: DmaAddr, len: u32) -> Self {
        Self {
            dir: SeqDir::In,
            addr,
            len,
            flags: SeqFlags::empty(),
        }
    }

    /// Direct output sequence.
    pub fn output(addr: DmaAddr, len: u32) -> Self {
        Self {
            dir: SeqDir::Out,
            addr,
            len,
            flags: SeqFlags::empty(),
        }
    }

    /// Treat the address as a scatter-gather table.
    pub fn scatter_gather(mut self) -> Self {
        self.flags |= SeqFlags::SCATTER_GATHER;
        self
    }

    fn extended(&self) -> bool {
        self.len > INLINE_LEN_MAX
    }
}

impl Command for SeqPtr {
    fn command_type(&self) -> CommandType {
        match self.dir {
            SeqDir::In => CommandType::SeqInPtr,
            SeqDir::Out => CommandType::SeqOutPtr,
        }
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        1 + width.words() + usize::from(self.extended())
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        if self.dir == SeqDir::Out && self.flags.contains(SeqFlags::RESTORE) {
            return Err(SecError::IllegalCombination(
                "restore only applies to the input sequence",
            ));
        }
        check_addr(self.addr, width)
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits() | self.flags.bits();
        if self.extended() {
            word |= SEQ_EXT;
        } else {
            word |= self.len;
        }
        out.push(word);
        push_addr(out, self.addr, width);
        if self.extended() {
            out.push(self.len);
        }
    }
}

/// MOVE source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveSrc {
    Class1Context = 0x0,
    Class2Context = 0x1,
    OutputFifo = 0x2,
    DescBuf = 0x3,
    Math0 = 0x4,
    Math1 = 0x5,
    Math2 = 0x6,
    Math3 = 0x7,
    InputFifo = 0x8,
}

/// MOVE destination location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveDst {
    Class1Context = 0x0,
    Class2Context = 0x1,
    OutputFifo = 0x2,
    DescBuf = 0x3,
    Math0 = 0x4,
    Math1 = 0x5,
    Math2 = 0x6,
    Math3 = 0x7,
    Class1InputFifo = 0x8,
    Class2InputFifo = 0x9,
    PkhaA = 0xc,
    Class1Key = 0xd,
    Class2Key = 0xe,
}

/// Length of a MOVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveLen {
    /// Fixed byte count.
    Bytes(u8),
    /// Byte count held in math register 0..=3 (MOVE_LEN command).
    MathReg(u8),
}

/// A MOVE or MOVE_LEN command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub src: MoveSrc,
    pub dst: MoveDst,
    pub offset: u8,
    pub len: MoveLen,
    pub wait_complete: bool,
}

impl Command for Move {
    fn command_type(&self) -> CommandType {
        match self.len {
            MoveLen::Bytes(_) => CommandType::Move,
            MoveLen::MathReg(_) => CommandType::MoveLen,
        }
    }

    fn word_count(&self, _width: AddressWidth) -> usize {
        1
    }

    fn validate(&self, _position: usize, _width: AddressWidth) -> SecResult<()> {
        // Locations 0x0..=0x7 mean the same thing on both sides.
        if (self.src as u8) < 0x8 && self.src as u8 == self.dst as u8 {
            return Err(SecError::IllegalCombination(
                "move source and destination are the same location",
            ));
        }
        match self.len {
            MoveLen::Bytes(_) => Ok(()),
            MoveLen::MathReg(reg) => check_field("move length register", reg as u64, 3),
        }
    }

    fn encode(&self, _width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = self.command_type().bits();
        if self.wait_complete {
            word |= MOVE_WAITCOMP;
        }
        word |= (self.src as u32) << MOVE_SRC_SHIFT;
        word |= (self.dst as u32) << MOVE_DEST_SHIFT;
        word |= (self.offset as u32) << MOVE_OFFSET_SHIFT;
        word |= match self.len {
            MoveLen::Bytes(n) => n as u32,
            MoveLen::MathReg(reg) => reg as u32,
        };
        out.push(word);
    }
}

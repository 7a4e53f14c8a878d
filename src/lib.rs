// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! # SEC4 Crypto Accelerator Rust Bindings
//!
//! This crate builds command descriptors for SEC4-family crypto accelerators
//! (CAAM) and drives the job rings that execute them.
//!
//! ## Layers
//!
//! - **Descriptor encoding**: typed commands ([`Key`], [`Load`], [`FifoLoad`],
//!   [`SeqPtr`], [`Operation`], [`Jump`], [`Math`], ...) assembled by a
//!   bounded [`DescriptorBuilder`] into a [`Descriptor`] of 32-bit words.
//! - **Job rings**: [`JobRing`] submits descriptors through a
//!   hardware-agnostic register interface ([`JobRingRegs`]) and matches
//!   completions to submissions even when the accelerator finishes them out
//!   of order.
//! - **Allocation**: [`RingPool`] hands rings out exclusively and
//!   [`SecEngine`] spreads submissions over several of them.
//!
//! ## Platform Support
//!
//! Register access and bus address mapping are traits. The [`sim`] module
//! implements both in software, which is what the tests, benchmarks and demo
//! run against.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sec4_rust::sim::{SoftDmaMapper, SoftJobRing};
//! use sec4_rust::{
//!     AddressWidth, Class, DescriptorBuilder, HeaderOptions, JobRing, JobStatus, Key,
//!     Operation, ProtocolDir, ProtocolOp, IpsecAuth, IpsecCipher, RingConfig, SecError,
//! };
//!
//! fn main() -> Result<(), SecError> {
//!     let mut b = DescriptorBuilder::shared(AddressWidth::Narrow);
//!     b.push(&Key::inline(Class::Class2, &[0u8; 20]))?;
//!     let op = ProtocolOp::ipsec(ProtocolDir::Encap, IpsecCipher::AesCbc, IpsecAuth::HmacSha1_96)?;
//!     b.push(&Operation::from(op))?;
//!     let desc = Arc::new(b.finish(HeaderOptions::default())?);
//!
//!     let hw = Arc::new(SoftJobRing::new());
//!     let ring = JobRing::new(0, RingConfig::new(), hw.clone(), Arc::new(SoftDmaMapper::new()))?;
//!     ring.start()?;
//!     ring.submit(desc, Box::new(|_, outcome| println!("{outcome}")))?;
//!
//!     hw.complete_all_in_order(JobStatus::OK);
//!     ring.handle_interrupt();
//!     let res = ring.poll(16)?;
//!     assert_eq!(res.processed, 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `wide-addr`: default to two-word bus addresses.
//! - `async`: [`SecEngine::submit_async`] on top of tokio.

// Module declarations
pub mod builder;
pub mod command;
pub mod engine;
pub mod error;
pub mod flow;
pub mod header;
pub mod hw;
pub mod index;
pub mod jr;
pub mod key;
pub mod opcode;
pub mod pool;
pub mod protocol;
pub mod router;
pub mod sim;
pub mod status;
pub mod transfer;

// Re-exports for convenient access
pub use builder::{Descriptor, DescriptorBuilder, MAX_DESC_WORDS};
pub use command::{AddressWidth, Command, DmaAddr, Operand};
pub use engine::SecEngine;
pub use error::{SecError, SecResult};
pub use flow::{Jump, JumpCond, JumpTarget, JumpTest, Math};
pub use header::{DescKind, ExecOrder, Header, HeaderOptions, SharePolicy, Trust};
pub use hw::{DmaDirection, DmaMapper, IntStatus, JobRingRegs, RingLayout, RingMemory};
pub use index::RingIndex;
pub use jr::{Callback, IrqAction, JobRing, PollResult, RingConfig, RingState};
pub use key::{Key, KeyDest};
pub use opcode::{Class, CommandType};
pub use pool::{DeregisterError, RingHandle, RingIrq, RingPool};
pub use protocol::{
    AlgMode, Algorithm, AlgorithmOp, CipherDir, IpsecAuth, IpsecCipher, Operation, ProtocolDir,
    ProtocolOp,
};
pub use router::RoundRobin;
pub use status::{JobOutcome, JobStatus};
pub use transfer::{
    DataSink, DataSource, FifoLoad, FifoStore, Load, Move, Register, SeqPtr, Store,
};

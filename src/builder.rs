// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Bounded descriptor writer.
//!
//! A [`DescriptorBuilder`] owns the word buffer of one descriptor. Word 0 is
//! reserved for the header, which is written by [`DescriptorBuilder::finish`]
//! once the body length and start index are known. Every push is checked
//! against the hardware maximum descriptor size before any word is written.
//!
//! ```
//! use sec4_rust::{AddressWidth, Class, DescriptorBuilder, HeaderOptions, Key, SharePolicy};
//!
//! let key = [0u8; 16];
//! let mut b = DescriptorBuilder::shared(AddressWidth::Narrow);
//! b.push(&Key::inline(Class::Class2, &key))?;
//! let desc = b.finish(HeaderOptions::with_share(SharePolicy::Serial))?;
//! assert_eq!(desc.len(), 5);
//! # Ok::<(), sec4_rust::SecError>(())
//! ```

use crate::command::{check_addr, push_addr, AddressWidth, Command, DmaAddr};
use crate::error::{SecError, SecResult};
use crate::header::{DescKind, Header, HeaderOptions};

/// Hardware maximum descriptor size in words, header included.
pub const MAX_DESC_WORDS: usize = 64;

/// Incrementally assembles one descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    kind: DescKind,
    width: AddressWidth,
    words: Vec<u32>,
    start_index: usize,
    shared_pointer: bool,
    shared_len: usize,
}

impl DescriptorBuilder {
    fn with_kind(kind: DescKind, width: AddressWidth) -> Self {
        let mut words = Vec::with_capacity(MAX_DESC_WORDS);
        words.push(0);
        Self {
            kind,
            width,
            words,
            start_index: 1,
            shared_pointer: false,
            shared_len: 0,
        }
    }

    /// Shared descriptor. Execution starts right after the header unless
    /// [`mark_start`](Self::mark_start) moves it.
    pub fn shared(width: AddressWidth) -> Self {
        Self::with_kind(DescKind::Shared, width)
    }

    /// Stand-alone job descriptor.
    pub fn job(width: AddressWidth) -> Self {
        Self::with_kind(DescKind::Job, width)
    }

    /// Job descriptor that references a shared descriptor of `shared_len`
    /// words. The pointer follows the header and the job body starts after it.
    ///
    /// The accelerator loads the shared descriptor into the same descriptor
    /// buffer as the job, so the job body only gets what the shared words
    /// leave of [`MAX_DESC_WORDS`].
    pub fn job_with_shared(
        width: AddressWidth,
        shared: DmaAddr,
        shared_len: usize,
    ) -> SecResult<Self> {
        check_addr(shared, width)?;
        if shared_len == 0 || shared_len > DescKind::Shared.max_len() {
            return Err(SecError::FieldOverflow {
                field: "shared descriptor length",
                value: shared_len as u64,
                max: DescKind::Shared.max_len() as u64,
            });
        }
        let mut b = Self::with_kind(DescKind::Job, width);
        let job_min = b.words.len() + width.words();
        if shared_len + job_min > MAX_DESC_WORDS {
            return Err(SecError::DescriptorTooLong {
                needed: shared_len + job_min,
                max: MAX_DESC_WORDS,
            });
        }
        push_addr(&mut b.words, shared, width);
        b.start_index = b.words.len();
        b.shared_pointer = true;
        b.shared_len = shared_len;
        Ok(b)
    }

    /// Address width used for pointer trailers.
    pub fn width(&self) -> AddressWidth {
        self.width
    }

    /// Words written so far, header slot included.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false: the header slot is reserved from the start.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Length of the referenced shared descriptor, 0 when there is none.
    pub fn shared_len(&self) -> usize {
        self.shared_len
    }

    /// Words that can still be pushed.
    pub fn remaining(&self) -> usize {
        MAX_DESC_WORDS.saturating_sub(self.shared_len + self.words.len())
    }

    /// Current start index.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Make execution begin at the next pushed word. Words pushed before
    /// this call (inline keys, constants) are skipped by the sequencer.
    pub fn mark_start(&mut self) {
        self.start_index = self.words.len();
    }

    /// Append one command. Returns the word index of the command word.
    ///
    /// Nothing is written when the command is illegal or does not fit.
    pub fn push<C: Command + ?Sized>(&mut self, cmd: &C) -> SecResult<usize> {
        let position = self.words.len();
        cmd.validate(position, self.width)?;
        let needed = cmd.word_count(self.width);
        if needed > self.remaining() {
            return Err(SecError::DescriptorTooLong {
                needed: self.shared_len + position + needed,
                max: MAX_DESC_WORDS,
            });
        }
        cmd.encode(self.width, &mut self.words);
        debug_assert_eq!(
            self.words.len() - position,
            needed,
            "{} wrote a different word count than it reported",
            cmd.command_type()
        );
        Ok(position)
    }

    /// Write the header and hand out the finished descriptor.
    pub fn finish(mut self, options: HeaderOptions) -> SecResult<Descriptor> {
        self.words[0] = Header::encode(
            self.kind,
            self.start_index,
            self.words.len(),
            &options,
            self.shared_pointer,
        )?;
        let image = self.words.iter().flat_map(|w| w.to_be_bytes()).collect();
        Ok(Descriptor {
            words: self.words,
            image,
        })
    }
}

/// A finished descriptor.
///
/// Holds the instruction words for inspection and the big-endian image that
/// is mapped for the accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    words: Vec<u32>,
    image: Box<[u8]>,
}

impl Descriptor {
    /// Instruction words, header first.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Size in bytes.
    pub fn byte_len(&self) -> usize {
        self.image.len()
    }

    /// The decoded header.
    pub fn header(&self) -> SecResult<Header> {
        Header::decode(self.words[0])
    }

    /// Big-endian image as the accelerator reads it. This is the buffer a
    /// job ring maps on submission.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Owned copy of [`image`](Self::image).
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.image.to_vec()
    }
}

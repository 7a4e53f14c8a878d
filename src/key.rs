// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! KEY command.
//!
//! Loads key material into a class-1 or class-2 key register, either copied
//! inline after the command word or fetched from a bus address.

use bitflags::bitflags;

use crate::command::{check_field, AddressWidth, Command, Operand};
use crate::error::{SecError, SecResult};
use crate::opcode::{Class, CommandType};

/// Position of the key destination field.
pub const KEY_DEST_SHIFT: u32 = 16;
/// Key length field mask (bytes).
pub const KEY_LENGTH_MASK: u32 = 0x3ff;
/// Key material is inline.
pub const KEY_IMM: u32 = 1 << 23;

bitflags! {
    /// Optional KEY command flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyFlags: u32 {
        /// The referenced pointer is a scatter-gather table.
        const SCATTER_GATHER = 1 << 24;
        /// Key is covered (encrypted with the key-encryption key).
        const ENCRYPTED = 1 << 22;
        /// Do not write the key back after use.
        const NO_WRITEBACK = 1 << 21;
        /// Enhanced (CCM) key encryption.
        const ENHANCED = 1 << 20;
        /// Key is encrypted with the trusted-descriptor key.
        const TRUSTED_KEY = 1 << 15;
    }
}

/// Register the key is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum KeyDest {
    /// Class key register.
    #[default]
    KeyRegister = 0,
    /// Public-key exponent register (class 1 only).
    PkhaExponent = 1,
    /// ARC4 S-box (class 1 only).
    Sbox = 2,
    /// Split HMAC digest register (class 2 only).
    SplitDigest = 3,
}

/// A KEY command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key<'a> {
    pub class: Class,
    pub dest: KeyDest,
    pub key: Operand<'a>,
    /// Key size in bits.
    pub len_bits: u32,
    pub flags: KeyFlags,
}

impl<'a> Key<'a> {
    /// Clear inline key for a class key register.
    pub fn inline(class: Class, key: &'a [u8]) -> Self {
        Self {
            class,
            dest: KeyDest::KeyRegister,
            key: Operand::Inline(key),
            len_bits: (key.len() * 8) as u32,
            flags: KeyFlags::empty(),
        }
    }

    /// Clear key fetched from a bus address.
    pub fn referenced(class: Class, addr: crate::command::DmaAddr, len_bits: u32) -> Self {
        Self {
            class,
            dest: KeyDest::KeyRegister,
            key: Operand::Pointer(addr),
            len_bits,
            flags: KeyFlags::empty(),
        }
    }

    /// Key size rounded up to whole bytes.
    pub fn len_bytes(&self) -> u32 {
        self.len_bits.div_ceil(8)
    }
}

impl Command for Key<'_> {
    fn command_type(&self) -> CommandType {
        CommandType::Key
    }

    fn word_count(&self, width: AddressWidth) -> usize {
        1 + self.key.trailer_words(width)
    }

    fn validate(&self, _position: usize, width: AddressWidth) -> SecResult<()> {
        if !matches!(self.class, Class::Class1 | Class::Class2) {
            return Err(SecError::IllegalCombination(
                "key must target class 1 or class 2",
            ));
        }
        match self.dest {
            KeyDest::PkhaExponent | KeyDest::Sbox if self.class != Class::Class1 => {
                return Err(SecError::IllegalCombination(
                    "exponent and S-box keys are class 1 only",
                ));
            }
            KeyDest::SplitDigest if self.class != Class::Class2 => {
                return Err(SecError::IllegalCombination(
                    "split digest keys are class 2 only",
                ));
            }
            _ => {}
        }
        if self.key.is_inline() && self.flags.contains(KeyFlags::SCATTER_GATHER) {
            return Err(SecError::IllegalCombination(
                "inline key cannot be a scatter-gather reference",
            ));
        }
        if self.flags.contains(KeyFlags::ENHANCED) && !self.flags.contains(KeyFlags::ENCRYPTED) {
            return Err(SecError::IllegalCombination(
                "enhanced key encryption needs an encrypted key",
            ));
        }
        if self.len_bits == 0 {
            return Err(SecError::IllegalCombination("empty key"));
        }
        check_field("key length", self.len_bytes() as u64, KEY_LENGTH_MASK as u64)?;
        if let Operand::Inline(bytes) = self.key {
            if bytes.len() != self.len_bytes() as usize {
                return Err(SecError::IllegalCombination(
                    "inline key bytes do not match the key length",
                ));
            }
        }
        self.key.check(width)
    }

    fn encode(&self, width: AddressWidth, out: &mut Vec<u32>) {
        let mut word = CommandType::Key.bits() | self.class.bits() | self.flags.bits();
        if self.key.is_inline() {
            word |= KEY_IMM;
        }
        word |= (self.dest as u32) << KEY_DEST_SHIFT;
        word |= self.len_bytes();
        out.push(word);
        self.key.push(width, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DmaAddr;

    fn encode(key: &Key<'_>, width: AddressWidth) -> SecResult<Vec<u32>> {
        key.validate(1, width)?;
        let mut out = Vec::new();
        key.encode(width, &mut out);
        assert_eq!(out.len(), key.word_count(width));
        Ok(out)
    }

    #[test]
    fn test_inline_class2_key() {
        let material: Vec<u8> = (0u8..16).collect();
        let words = encode(&Key::inline(Class::Class2, &material), AddressWidth::Narrow).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], 0x0480_0010);
        assert_eq!(words[1], 0x0001_0203);
        assert_eq!(words[4], 0x0c0d_0e0f);
    }

    #[test]
    fn test_referenced_key_widths() {
        let key = Key::referenced(Class::Class1, DmaAddr(0x8000_1000), 256);
        let narrow = encode(&key, AddressWidth::Narrow).unwrap();
        assert_eq!(narrow, vec![0x0200_0020, 0x8000_1000]);
        let wide = encode(&key, AddressWidth::Wide).unwrap();
        assert_eq!(wide, vec![0x0200_0020, 0, 0x8000_1000]);
    }

    #[test]
    fn test_inline_scatter_gather_is_illegal() {
        let material = [0u8; 16];
        let mut key = Key::inline(Class::Class1, &material);
        key.flags |= KeyFlags::SCATTER_GATHER;
        assert!(matches!(
            encode(&key, AddressWidth::Narrow),
            Err(SecError::IllegalCombination(_))
        ));
    }

    #[test]
    fn test_sbox_and_exponent_class1_only() {
        let material = [0u8; 16];
        for dest in [KeyDest::Sbox, KeyDest::PkhaExponent] {
            let mut key = Key::inline(Class::Class2, &material);
            key.dest = dest;
            assert!(encode(&key, AddressWidth::Narrow).is_err());
            key.class = Class::Class1;
            assert!(encode(&key, AddressWidth::Narrow).is_ok());
        }
    }

    #[test]
    fn test_key_length_checks() {
        let material = [0u8; 16];
        let mut key = Key::inline(Class::Class1, &material);
        key.len_bits = 64;
        assert!(encode(&key, AddressWidth::Narrow).is_err());

        let key = Key::referenced(Class::Class1, DmaAddr(0), 8 * 1024 + 8);
        assert!(matches!(
            encode(&key, AddressWidth::Narrow),
            Err(SecError::FieldOverflow { .. })
        ));

        let key = Key::referenced(Class::Independent, DmaAddr(0), 128);
        assert!(encode(&key, AddressWidth::Narrow).is_err());
    }

    #[test]
    fn test_odd_bit_length_rounds_up() {
        let material = [0xffu8; 3];
        let mut key = Key::inline(Class::Class1, &material);
        key.len_bits = 17;
        let words = encode(&key, AddressWidth::Narrow).unwrap();
        assert_eq!(words[0] & KEY_LENGTH_MASK, 3);
        assert_eq!(words.len(), 2);
    }
}

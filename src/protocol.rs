// SEC4 Crypto Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! OPERATION command.
//!
//! Two forms share the opcode: a protocol operation (IPsec encapsulation or
//! decapsulation with a cipher/authentication suite) and a single algorithm
//! operation on the class-1 or class-2 accelerator. The class of an algorithm
//! operation follows from the algorithm, so a mismatched class cannot be
//! expressed.

use crate::command::{AddressWidth, Command};
use crate::error::{SecError, SecResult};
use crate::opcode::{Class, CommandType};

/// Position of the operation type field.
pub const OP_TYPE_SHIFT: u32 = 24;
/// Position of the protocol identifier.
pub const OP_PCLID_SHIFT: u32 = 16;
/// IPsec protocol identifier.
pub const OP_PCLID_IPSEC: u32 = 0x01;
/// Position of the IPsec cipher selector.
pub const OP_PCL_IPSEC_CIPHER_SHIFT: u32 = 8;

/// Position of the algorithm selector.
pub const OP_ALG_ALGSEL_SHIFT: u32 = 16;
/// Position of the additional algorithm information (mode).
pub const OP_ALG_AAI_SHIFT: u32 = 4;
/// Position of the algorithm state field.
pub const OP_ALG_AS_SHIFT: u32 = 2;
/// Check the integrity value.
pub const OP_ALG_ICV_ON: u32 = 1 << 1;
/// Encrypt (as opposed to decrypt).
pub const OP_ALG_ENCRYPT: u32 = 1;

const OP_TYPE_CLASS1_ALG: u32 = 0x02;
const OP_TYPE_CLASS2_ALG: u32 = 0x04;
const OP_TYPE_DECAP_PROTOCOL: u32 = 0x06;
const OP_TYPE_ENCAP_PROTOCOL: u32 = 0x07;

/// Direction of a protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolDir {
    Encap,
    Decap,
}

/// IPsec cipher suite selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IpsecCipher {
    Des = 0x02,
    TripleDes = 0x03,
    Null = 0x0b,
    AesCbc = 0x0c,
    AesCtr = 0x0d,
    AesCcm8 = 0x0e,
    AesCcm12 = 0x0f,
    AesCcm16 = 0x10,
    AesGcm8 = 0x12,
    AesGcm12 = 0x13,
    AesGcm16 = 0x14,
    NullWithGmac = 0x15,
}

impl IpsecCipher {
    /// Combined-mode ciphers authenticate on their own.
    pub const fn is_combined(self) -> bool {
        matches!(
            self,
            Self::AesCcm8
                | Self::AesCcm12
                | Self::AesCcm16
                | Self::AesGcm8
                | Self::AesGcm12
                | Self::AesGcm16
                | Self::NullWithGmac
        )
    }
}

impl TryFrom<u8> for IpsecCipher {
    type Error = SecError;

    fn try_from(value: u8) -> SecResult<Self> {
        Ok(match value {
            0x02 => Self::Des,
            0x03 => Self::TripleDes,
            0x0b => Self::Null,
            0x0c => Self::AesCbc,
            0x0d => Self::AesCtr,
            0x0e => Self::AesCcm8,
            0x0f => Self::AesCcm12,
            0x10 => Self::AesCcm16,
            0x12 => Self::AesGcm8,
            0x13 => Self::AesGcm12,
            0x14 => Self::AesGcm16,
            0x15 => Self::NullWithGmac,
            _ => {
                return Err(SecError::UnknownSelector {
                    field: "ipsec cipher",
                    value: value as u32,
                })
            }
        })
    }
}

/// IPsec authentication selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IpsecAuth {
    Null = 0x00,
    HmacMd5_96 = 0x01,
    HmacSha1_96 = 0x02,
    AesXcbcMac96 = 0x05,
    HmacMd5_128 = 0x06,
    HmacSha1_160 = 0x07,
    AesCmac96 = 0x08,
    HmacSha2_256_128 = 0x0c,
    HmacSha2_384_192 = 0x0d,
    HmacSha2_512_256 = 0x0e,
}

impl TryFrom<u8> for IpsecAuth {
    type Error = SecError;

    fn try_from(value: u8) -> SecResult<Self> {
        Ok(match value {
            0x00 => Self::Null,
            0x01 => Self::HmacMd5_96,
            0x02 => Self::HmacSha1_96,
            0x05 => Self::AesXcbcMac96,
            0x06 => Self::HmacMd5_128,
            0x07 => Self::HmacSha1_160,
            0x08 => Self::AesCmac96,
            0x0c => Self::HmacSha2_256_128,
            0x0d => Self::HmacSha2_384_192,
            0x0e => Self::HmacSha2_512_256,
            _ => {
                return Err(SecError::UnknownSelector {
                    field: "ipsec authentication",
                    value: value as u32,
                })
            }
        })
    }
}

/// IPsec protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolOp {
    pub dir: ProtocolDir,
    pub cipher: IpsecCipher,
    pub auth: IpsecAuth,
}

impl ProtocolOp {
    /// Typed IPsec suite, checked for a legal cipher/authentication pairing.
    pub fn ipsec(dir: ProtocolDir, cipher: IpsecCipher, auth: IpsecAuth) -> SecResult<Self> {
        let op = Self { dir, cipher, auth };
        op.check()?;
        Ok(op)
    }

    /// IPsec suite from raw selector values, as found in a security association.
    pub fn from_raw(dir: ProtocolDir, cipher: u8, auth: u8) -> SecResult<Self> {
        Self::ipsec(dir, IpsecCipher::try_from(cipher)?, IpsecAuth::try_from(auth)?)
    }

    fn check(&self) -> SecResult<()> {
        if self.cipher.is_combined() && self.auth != IpsecAuth::Null {
            return Err(SecError::IllegalCombination(
                "combined-mode cipher takes no separate authentication",
            ));
        }
        if self.cipher == IpsecCipher::Null && self.auth == IpsecAuth::Null {
            return Err(SecError::IllegalCombination(
                "null cipher needs an authentication algorithm",
            ));
        }
        Ok(())
    }

    fn word(&self) -> u32 {
        let op_type = match self.dir {
            ProtocolDir::Encap => OP_TYPE_ENCAP_PROTOCOL,
            ProtocolDir::Decap => OP_TYPE_DECAP_PROTOCOL,
        };
        CommandType::Operation.bits()
            | op_type << OP_TYPE_SHIFT
            | OP_PCLID_IPSEC << OP_PCLID_SHIFT
            | (self.cipher as u32) << OP_PCL_IPSEC_CIPHER_SHIFT
            | self.auth as u32
    }
}

/// Algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    Aes = 0x10,
    Des = 0x20,
    TripleDes = 0x21,
    Arc4 = 0x30,
    Md5 = 0x40,
    Sha1 = 0x41,
    Sha224 = 0x42,
    Sha256 = 0x43,
    Sha384 = 0x44,
    Sha512 = 0x45,
}

impl Algorithm {
    /// Accelerator class that runs this algorithm.
    pub const fn class(self) -> Class {
        match self {
            Self::Aes | Self::Des | Self::TripleDes | Self::Arc4 => Class::Class1,
            _ => Class::Class2,
        }
    }
}

/// AES modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AesMode {
    Ctr = 0x00,
    Cbc = 0x10,
    Ecb = 0x20,
    Cfb = 0x30,
    Ofb = 0x40,
    Xts = 0x50,
    Cmac = 0x60,
    XcbcMac = 0x70,
    Ccm = 0x80,
    Gcm = 0x90,
}

/// DES and triple-DES modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DesMode {
    Cbc = 0x10,
    Ecb = 0x20,
    Cfb = 0x30,
    Ofb = 0x40,
}

/// Hash modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HashMode {
    Plain = 0x00,
    Hmac = 0x01,
    Smac = 0x02,
    /// HMAC with a precomputed split key.
    HmacPrecomputed = 0x04,
}

/// Additional algorithm information, per algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgMode {
    Aes(AesMode),
    Des(DesMode),
    Hash(HashMode),
    /// ARC4 has no mode.
    Stream,
}

impl AlgMode {
    fn aai(self) -> u32 {
        match self {
            Self::Aes(m) => m as u32,
            Self::Des(m) => m as u32,
            Self::Hash(m) => m as u32,
            Self::Stream => 0,
        }
    }

    fn fits(self, alg: Algorithm) -> bool {
        match self {
            Self::Aes(_) => alg == Algorithm::Aes,
            Self::Des(_) => matches!(alg, Algorithm::Des | Algorithm::TripleDes),
            Self::Hash(_) => alg.class() == Class::Class2,
            Self::Stream => alg == Algorithm::Arc4,
        }
    }
}

/// Algorithm state for multi-part operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlgState {
    Update = 0,
    Init = 1,
    Finalize = 2,
    #[default]
    InitFinal = 3,
}

/// Cipher direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDir {
    Encrypt,
    Decrypt,
}

/// Single class-1 or class-2 algorithm operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmOp {
    pub alg: Algorithm,
    pub mode: AlgMode,
    pub state: AlgState,
    pub dir: CipherDir,
    pub icv_check: bool,
}

impl AlgorithmOp {
    /// One-shot operation (init and finalize in one go).
    pub fn new(alg: Algorithm, mode: AlgMode, dir: CipherDir) -> Self {
        Self {
            alg,
            mode,
            state: AlgState::InitFinal,
            dir,
            icv_check: false,
        }
    }

    fn check(&self) -> SecResult<()> {
        if !self.mode.fits(self.alg) {
            return Err(SecError::IllegalCombination(
                "mode does not belong to the algorithm",
            ));
        }
        if self.icv_check && self.dir != CipherDir::Decrypt {
            return Err(SecError::IllegalCombination(
                "integrity check only applies when decrypting",
            ));
        }
        Ok(())
    }

    fn word(&self) -> u32 {
        let op_type = match self.alg.class() {
            Class::Class1 => OP_TYPE_CLASS1_ALG,
            _ => OP_TYPE_CLASS2_ALG,
        };
        let mut word = CommandType::Operation.bits()
            | op_type << OP_TYPE_SHIFT
            | (self.alg as u32) << OP_ALG_ALGSEL_SHIFT
            | self.mode.aai() << OP_ALG_AAI_SHIFT
            | (self.state as u32) << OP_ALG_AS_SHIFT;
        if self.icv_check {
            word |= OP_ALG_ICV_ON;
        }
        if self.dir == CipherDir::Encrypt {
            word |= OP_ALG_ENCRYPT;
        }
        word
    }
}

/// An OPERATION command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Protocol(ProtocolOp),
    Algorithm(AlgorithmOp),
}

impl Operation {
    /// The encoded operation word.
    pub fn word(&self) -> SecResult<u32> {
        self.validate(0, AddressWidth::default())?;
        Ok(match self {
            Self::Protocol(p) => p.word(),
            Self::Algorithm(a) => a.word(),
        })
    }
}

impl From<ProtocolOp> for Operation {
    fn from(op: ProtocolOp) -> Self {
        Self::Protocol(op)
    }
}

impl From<AlgorithmOp> for Operation {
    fn from(op: AlgorithmOp) -> Self {
        Self::Algorithm(op)
    }
}

impl Command for Operation {
    fn command_type(&self) -> CommandType {
        CommandType::Operation
    }

    fn word_count(&self, _width: AddressWidth) -> usize {
        1
    }

    fn validate(&self, _position: usize, _width: AddressWidth) -> SecResult<()> {
        match self {
            Self::Protocol(p) => p.check(),
            Self::Algorithm(a) => a.check(),
        }
    }

    fn encode(&self, _width: AddressWidth, out: &mut Vec<u32>) {
        out.push(match self {
            Self::Protocol(p) => p.word(),
            Self::Algorithm(a) => a.word(),
        });
    }
}

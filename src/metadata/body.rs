//! Method body headers and the delta IL stream.
//!
//! Every body in a delta is prefixed with a tiny or fat header (ECMA-335 II.25.4) and
//! written to the delta's IL stream. A method row's RVA is the offset of its header in
//! that stream, so the stream starts with four zero bytes to keep offset 0 free for
//! methods without a body.
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use bitflags::bitflags;

use crate::{metadata::token::Token, utils::align_to, Error::OutOfBounds, Result};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    /// Method header flags
    pub struct MethodBodyFlags: u16 {
        /// Tiny header, code size in the upper six bits of the single header byte
        const TINY_FORMAT = 0x2;
        /// Fat header
        const FAT_FORMAT = 0x3;
        /// Extra data sections follow the code
        const MORE_SECTS = 0x8;
        /// Zero-initialize locals
        const INIT_LOCALS = 0x10;
    }
}

/// Size of a fat header in 4-byte units, stored in the upper nibble of the flags word.
const FAT_HEADER_DWORDS: u16 = 3;

/// Largest code size a tiny header can describe.
pub const MAX_TINY_CODE_SIZE: usize = 63;

/// Largest evaluation stack a tiny header implies.
pub const MAX_TINY_STACK: u16 = 8;

/// CIL opcodes used by generated stub bodies.
#[allow(non_snake_case)]
pub mod OPCODE {
    /// `ldstr <token>`
    pub const LDSTR: u8 = 0x72;
    /// `newobj <token>`
    pub const NEWOBJ: u8 = 0x73;
    /// `throw`
    pub const THROW: u8 = 0x7A;
}

/// Decoded header of a method body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodBodyHeader {
    /// Size of the header in bytes
    pub size_header: usize,
    /// Size of the IL code in bytes
    pub size_code: usize,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// `StandAloneSig` token of the local signature, null without locals
    pub local_signature: Token,
    /// True for fat headers
    pub is_fat: bool,
    /// True if locals are zero-initialized
    pub init_locals: bool,
}

impl MethodBodyHeader {
    /// Returns true if a body with these properties fits a tiny header.
    #[must_use]
    pub fn fits_tiny(code_size: usize, max_stack: u16, local_signature: Token) -> bool {
        code_size <= MAX_TINY_CODE_SIZE && max_stack <= MAX_TINY_STACK && local_signature.is_null()
    }

    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the data is empty, truncated, or neither tiny nor fat.
    pub fn parse(data: &[u8]) -> Result<MethodBodyHeader> {
        let Some(&first_byte) = data.first() else {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        };

        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_0000_0011)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBodyHeader {
                    size_header: 1,
                    size_code,
                    max_stack: MAX_TINY_STACK,
                    local_signature: Token::NULL,
                    is_fat: false,
                    init_locals: false,
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = u16::from_le_bytes([data[0], data[1]]);
                let size_header = ((first_duo >> 12) * 4) as usize;
                let max_stack = u16::from_le_bytes([data[2], data[3]]);
                let size_code = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
                let local_signature =
                    Token::new(u32::from_le_bytes([data[8], data[9], data[10], data[11]]));
                if data.len() < size_header + size_code {
                    return Err(OutOfBounds);
                }

                let flags = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);
                Ok(MethodBodyHeader {
                    size_header,
                    size_code,
                    max_stack,
                    local_signature,
                    is_fat: true,
                    init_locals: flags.contains(MethodBodyFlags::INIT_LOCALS),
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }
}

/// Encodes a header followed by `il`. A tiny header is used whenever the body allows it.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the code does not fit the 32-bit size field.
pub fn encode_method_body(
    il: &[u8],
    max_stack: u16,
    local_signature: Token,
    init_locals: bool,
) -> Result<Vec<u8>> {
    if MethodBodyHeader::fits_tiny(il.len(), max_stack, local_signature) {
        let mut body = Vec::with_capacity(il.len() + 1);
        body.push(((il.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
        body.extend_from_slice(il);
        return Ok(body);
    }

    let code_size = u32::try_from(il.len())
        .map_err(|_| malformed_error!("Method body of {} bytes is too large", il.len()))?;

    let mut flags = MethodBodyFlags::FAT_FORMAT;
    if init_locals {
        flags |= MethodBodyFlags::INIT_LOCALS;
    }

    let mut body = Vec::with_capacity(il.len() + 12);
    body.extend_from_slice(&((FAT_HEADER_DWORDS << 12) | flags.bits()).to_le_bytes());
    body.extend_from_slice(&max_stack.to_le_bytes());
    body.extend_from_slice(&code_size.to_le_bytes());
    body.extend_from_slice(&local_signature.value().to_le_bytes());
    body.extend_from_slice(il);
    Ok(body)
}

/// The IL stream of one delta.
#[derive(Debug)]
pub struct IlStreamBuilder {
    data: Vec<u8>,
}

impl IlStreamBuilder {
    /// Creates a stream holding only the four leading zero bytes.
    #[must_use]
    pub fn new() -> Self {
        IlStreamBuilder { data: vec![0; 4] }
    }

    /// Appends an encoded body and returns its RVA. Fat bodies are 4-byte aligned.
    pub fn add_body(&mut self, body: &[u8]) -> u32 {
        let is_fat = body
            .first()
            .is_some_and(|byte| byte & 0b_0000_0011 == MethodBodyFlags::FAT_FORMAT.bits() as u8);
        if is_fat {
            let aligned = align_to(self.data.len() as u32, 4) as usize;
            self.data.resize(aligned, 0);
        }

        let rva = self.data.len() as u32;
        self.data.extend_from_slice(body);
        rva
    }

    /// Returns the current stream length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no body was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 4
    }

    /// Consumes the builder into the stream bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Default for IlStreamBuilder {
    fn default() -> Self {
        IlStreamBuilder::new()
    }
}

/// IL of a body that throws: `ldstr <message>; newobj <ctor>; throw`.
///
/// Returns the code together with the offsets of the two token operands.
#[must_use]
pub fn throwing_stub_il() -> (Vec<u8>, u32, u32) {
    let il = vec![
        OPCODE::LDSTR,
        0,
        0,
        0,
        0,
        OPCODE::NEWOBJ,
        0,
        0,
        0,
        0,
        OPCODE::THROW,
    ];
    (il, 1, 6)
}

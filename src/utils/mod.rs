//! Byte-level helpers shared by the signature, heap and method body encoders.

mod parser;

pub use parser::Parser;

use sha1::{Digest, Sha1};
use uguid::Guid;

use crate::metadata::{tables::TableId, token::Token};

/// Writes an ECMA-335 compressed unsigned integer (II.23.2).
///
/// Values up to `0x7F` take one byte, up to `0x3FFF` two bytes and up to `0x1FFF_FFFF`
/// four bytes. Larger values cannot be represented; callers validate their inputs
/// (row numbers are limited to 24 bits and blob lengths to the heap size).
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) {
    if value < 0x80 {
        buffer.push(value as u8);
    } else if value < 0x4000 {
        buffer.push(((value >> 8) as u8) | 0x80);
        buffer.push(value as u8);
    } else {
        buffer.push(((value >> 24) as u8 & 0x1F) | 0xC0);
        buffer.push((value >> 16) as u8);
        buffer.push((value >> 8) as u8);
        buffer.push(value as u8);
    }
}

/// Returns the number of bytes [`write_compressed_uint`] produces for `value`.
#[must_use]
pub fn compressed_uint_size(value: u32) -> usize {
    if value < 0x80 {
        1
    } else if value < 0x4000 {
        2
    } else {
        4
    }
}

/// Writes a `TypeDefOrRef` coded token as used inside signatures (II.23.2.8).
///
/// # Errors
///
/// Returns [`crate::Error::Signature`] if the token is not a `TypeDef`, `TypeRef` or
/// `TypeSpec` token.
pub fn write_compressed_token(token: Token, buffer: &mut Vec<u8>) -> crate::Result<()> {
    let tag = match token.table_id() {
        Some(TableId::TypeDef) => 0,
        Some(TableId::TypeRef) => 1,
        Some(TableId::TypeSpec) => 2,
        _ => {
            return Err(crate::Error::Signature(format!(
                "Token {} cannot be encoded as TypeDefOrRef",
                token
            )))
        }
    };

    write_compressed_uint((token.row() << 2) | tag, buffer);
    Ok(())
}

/// Aligns `value` up to the next multiple of `alignment`, which must be a power of two.
#[must_use]
pub fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Derives a GUID from the SHA-1 of `parts`, with the version bits set to 5 and the
/// variant bits to RFC 4122.
#[must_use]
pub fn name_based_guid(parts: &[&[u8]]) -> Guid {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0F) | 0x50;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Guid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_compressed_uint() {
        let cases: [(u32, &[u8]); 6] = [
            (0x03, &[0x03]),
            (0x7F, &[0x7F]),
            (0x80, &[0x80, 0x80]),
            (0x2E57, &[0xAE, 0x57]),
            (0x3FFF, &[0xBF, 0xFF]),
            (0x4000, &[0xC0, 0x00, 0x40, 0x00]),
        ];

        for (value, expected) in cases {
            let mut buffer = Vec::new();
            write_compressed_uint(value, &mut buffer);
            assert_eq!(buffer, expected, "value 0x{:x}", value);
            assert_eq!(compressed_uint_size(value), expected.len());
        }
    }

    #[test]
    fn test_write_compressed_token() {
        let mut buffer = Vec::new();
        write_compressed_token(Token::from_parts(TableId::TypeRef, 1), &mut buffer).unwrap();
        write_compressed_token(Token::from_parts(TableId::TypeDef, 2), &mut buffer).unwrap();
        write_compressed_token(Token::from_parts(TableId::TypeSpec, 3), &mut buffer).unwrap();
        assert_eq!(buffer, vec![0x05, 0x08, 0x0E]);

        let invalid = write_compressed_token(Token::from_parts(TableId::MethodDef, 1), &mut buffer);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_name_based_guid_is_deterministic() {
        let first = name_based_guid(&[b"App".as_slice(), 1u32.to_le_bytes().as_slice()]);
        let second = name_based_guid(&[b"App".as_slice(), 1u32.to_le_bytes().as_slice()]);
        let other = name_based_guid(&[b"App".as_slice(), 2u32.to_le_bytes().as_slice()]);

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(!first.is_zero());

        let bytes = first.to_bytes();
        assert_eq!(bytes[6] & 0xF0, 0x50);
        assert_eq!(bytes[8] & 0xC0, 0x80);
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(13, 4), 16);
    }
}

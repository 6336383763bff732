//! Cursor over a byte slice for reading signature blobs.
//!
//! Every read is bounds-checked and returns [`crate::Error::OutOfBounds`] instead of
//! panicking, since the blobs come from previous generations and debug information that
//! may be stale or corrupt.

use crate::{
    metadata::{tables::TableId, token::Token},
    Error, Result,
};

/// Bounds-checked reader over a signature blob.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the current position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns true while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Returns the bytes between `start` and the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `start` lies past the current position.
    pub fn slice_from(&self, start: usize) -> Result<&'a [u8]> {
        self.data.get(start..self.position).ok_or(Error::OutOfBounds)
    }

    /// Returns the next byte without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(Error::OutOfBounds)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] at the end of the data.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.peek_byte()?;
        self.position += 1;
        Ok(value)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the encoding is truncated or
    /// [`Error::Malformed`] for an invalid lead byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_u8()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_u8()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 4-byte encoding: 11xxxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_u8()?);
            let b2 = u32::from(self.read_u8()?);
            let b3 = u32::from(self.read_u8()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Reads a `TypeDefOrRef` coded token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for the reserved tag value.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;

        let table = match compressed_token & 0x3 {
            0x0 => TableId::TypeDef,
            0x1 => TableId::TypeRef,
            0x2 => TableId::TypeSpec,
            _ => {
                return Err(malformed_error!(
                    "Invalid compressed token - {}",
                    compressed_token
                ))
            }
        };

        Ok(Token::from_parts(table, compressed_token >> 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_compressed_uint() -> Result<()> {
        let data = [0x03, 0x80, 0x80, 0xAE, 0x57, 0xC0, 0x00, 0x40, 0x00];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_compressed_uint()?, 0x03);
        assert_eq!(parser.read_compressed_uint()?, 0x80);
        assert_eq!(parser.read_compressed_uint()?, 0x2E57);
        assert_eq!(parser.read_compressed_uint()?, 0x4000);
        assert!(!parser.has_more_data());
        Ok(())
    }

    #[test]
    fn test_truncated_input() {
        let mut parser = Parser::new(&[0x80]);
        assert!(matches!(parser.read_compressed_uint(), Err(Error::OutOfBounds)));

        let mut parser = Parser::new(&[0xFF]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_read_compressed_token() -> Result<()> {
        let mut parser = Parser::new(&[0x05, 0x0E]);
        assert_eq!(
            parser.read_compressed_token()?,
            Token::from_parts(TableId::TypeRef, 1)
        );
        assert_eq!(
            parser.read_compressed_token()?,
            Token::from_parts(TableId::TypeSpec, 3)
        );
        Ok(())
    }

    #[test]
    fn test_slice_from() -> Result<()> {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);
        parser.read_u8()?;
        let start = parser.pos();
        parser.read_u8()?;
        parser.read_u8()?;
        assert_eq!(parser.slice_from(start)?, &[0x02, 0x03]);
        Ok(())
    }
}

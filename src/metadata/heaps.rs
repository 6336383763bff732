//! Append-only metadata heap builders.
//!
//! Every generation appends to the `#Strings`, `#Blob`, `#US` and `#GUID` heaps of the
//! module. A delta only carries the bytes it adds: each builder starts at the cumulative
//! size of all previous generations, so the offsets it hands out can be stored directly
//! in table rows and stay valid once the runtime concatenates the heaps.
//!
//! Generation 0 heaps start with the empty entry at offset 0. Delta heaps start at a
//! non-zero offset and reuse offset 0 for the empty string and the empty blob.
//!
//! # Reference
//! * [ECMA-335 II.24.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Streams

use std::collections::HashMap;

use uguid::Guid;
use widestring::{U16Str, U16String};

use crate::{
    utils::{align_to, write_compressed_uint, Parser},
    Result,
};

/// Largest heap offset a `ldstr` token can address.
const MAX_USER_STRING_OFFSET: u32 = 0x00FF_FFFF;

/// Sizes of the four metadata heaps in bytes, each padded to a 4-byte boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapSizes {
    /// `#Strings` heap size
    pub strings: u32,
    /// `#Blob` heap size
    pub blobs: u32,
    /// `#US` heap size
    pub user_strings: u32,
    /// `#GUID` heap size
    pub guids: u32,
}

impl HeapSizes {
    /// Adds two size sets heap by heap.
    #[must_use]
    pub fn plus(&self, other: &HeapSizes) -> HeapSizes {
        HeapSizes {
            strings: self.strings + other.strings,
            blobs: self.blobs + other.blobs,
            user_strings: self.user_strings + other.user_strings,
            guids: self.guids + other.guids,
        }
    }
}

/// Builder for the `#Strings` heap.
#[derive(Debug)]
pub struct StringHeapBuilder {
    start: u32,
    data: Vec<u8>,
    lookup: HashMap<String, u32>,
}

impl StringHeapBuilder {
    /// Creates a builder whose first entry lands at offset `start`.
    #[must_use]
    pub fn new(start: u32) -> Self {
        let data = if start == 0 { vec![0] } else { Vec::new() };
        StringHeapBuilder {
            start,
            data,
            lookup: HashMap::new(),
        }
    }

    /// Adds a string and returns its heap offset. Identical strings share one entry.
    pub fn add(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.lookup.get(value) {
            return *offset;
        }

        let offset = self.start + self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.lookup.insert(value.to_string(), offset);
        offset
    }

    /// Returns the string stored at `offset`, if it was added through this builder.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&str> {
        if offset == 0 {
            return Some("");
        }
        let start = offset.checked_sub(self.start)? as usize;
        let tail = self.data.get(start..)?;
        let end = tail.iter().position(|byte| *byte == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }

    /// Returns the padded size of the heap bytes produced so far.
    #[must_use]
    pub fn size(&self) -> u32 {
        align_to(self.data.len() as u32, 4)
    }

    /// Consumes the builder and returns the padded heap bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let size = self.size() as usize;
        let mut data = self.data;
        data.resize(size, 0);
        data
    }
}

/// Builder for the `#Blob` heap.
#[derive(Debug)]
pub struct BlobHeapBuilder {
    start: u32,
    data: Vec<u8>,
    lookup: HashMap<Vec<u8>, u32>,
}

impl BlobHeapBuilder {
    /// Creates a builder whose first entry lands at offset `start`.
    #[must_use]
    pub fn new(start: u32) -> Self {
        let data = if start == 0 { vec![0] } else { Vec::new() };
        BlobHeapBuilder {
            start,
            data,
            lookup: HashMap::new(),
        }
    }

    /// Adds a blob and returns its heap offset. Identical blobs share one entry.
    pub fn add(&mut self, value: &[u8]) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.lookup.get(value) {
            return *offset;
        }

        let offset = self.start + self.data.len() as u32;
        write_compressed_uint(value.len() as u32, &mut self.data);
        self.data.extend_from_slice(value);
        self.lookup.insert(value.to_vec(), offset);
        offset
    }

    /// Returns the blob stored at `offset`, if it was added through this builder.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&[u8]> {
        if offset == 0 {
            return Some(&[]);
        }
        let start = offset.checked_sub(self.start)? as usize;
        let tail = self.data.get(start..)?;
        let mut parser = Parser::new(tail);
        let length = parser.read_compressed_uint().ok()? as usize;
        tail.get(parser.pos()..parser.pos() + length)
    }

    /// Returns the padded size of the heap bytes produced so far.
    #[must_use]
    pub fn size(&self) -> u32 {
        align_to(self.data.len() as u32, 4)
    }

    /// Consumes the builder and returns the padded heap bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let size = self.size() as usize;
        let mut data = self.data;
        data.resize(size, 0);
        data
    }
}

/// Builder for the `#US` heap holding `ldstr` literals.
#[derive(Debug)]
pub struct UserStringHeapBuilder {
    start: u32,
    data: Vec<u8>,
    lookup: HashMap<String, u32>,
}

impl UserStringHeapBuilder {
    /// Creates a builder whose first entry lands at offset `start`.
    #[must_use]
    pub fn new(start: u32) -> Self {
        let data = if start == 0 { vec![0] } else { Vec::new() };
        UserStringHeapBuilder {
            start,
            data,
            lookup: HashMap::new(),
        }
    }

    /// Adds a literal and returns its heap offset.
    ///
    /// The entry is the compressed byte length, the UTF-16LE code units and the trailing
    /// flag byte of ECMA-335 II.24.2.4.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] once the heap outgrows the 24-bit offsets `ldstr`
    /// tokens can express.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if let Some(offset) = self.lookup.get(value) {
            return Ok(*offset);
        }

        let offset = self.start + self.data.len() as u32;
        if offset > MAX_USER_STRING_OFFSET {
            return Err(malformed_error!(
                "User string heap offset 0x{:x} exceeds the token range",
                offset
            ));
        }

        let wide = U16String::from_str(value);
        let units = wide.as_slice();
        let needs_flag = units.iter().any(|unit| Self::requires_special_handling(*unit));

        write_compressed_uint((units.len() * 2 + 1) as u32, &mut self.data);
        for unit in units {
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        self.data.push(u8::from(needs_flag));
        self.lookup.insert(value.to_string(), offset);
        Ok(offset)
    }

    /// Returns the literal stored at `offset`, if it was added through this builder.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<String> {
        let start = offset.checked_sub(self.start)? as usize;
        let tail = self.data.get(start..)?;
        let mut parser = Parser::new(tail);
        let length = parser.read_compressed_uint().ok()? as usize;
        let bytes = tail.get(parser.pos()..parser.pos() + length.checked_sub(1)?)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(U16Str::from_slice(&units).to_string_lossy())
    }

    /// Returns the padded size of the heap bytes produced so far.
    #[must_use]
    pub fn size(&self) -> u32 {
        align_to(self.data.len() as u32, 4)
    }

    /// Consumes the builder and returns the padded heap bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let size = self.size() as usize;
        let mut data = self.data;
        data.resize(size, 0);
        data
    }

    fn requires_special_handling(unit: u16) -> bool {
        unit > 0x7F
            || matches!(unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F)
    }
}

/// Builder for the `#GUID` heap.
///
/// Unlike the other heaps, `#GUID` is indexed by 1-based entry number rather than by byte
/// offset.
#[derive(Debug)]
pub struct GuidHeapBuilder {
    first_index: u32,
    entries: Vec<Guid>,
}

impl GuidHeapBuilder {
    /// Creates a builder for a heap that already holds `start` bytes.
    #[must_use]
    pub fn new(start: u32) -> Self {
        GuidHeapBuilder {
            first_index: start / 16 + 1,
            entries: Vec::new(),
        }
    }

    /// Adds a GUID and returns its index. The zero GUID maps to index 0.
    pub fn add(&mut self, value: Guid) -> u32 {
        if value.is_zero() {
            return 0;
        }
        if let Some(position) = self.entries.iter().position(|entry| *entry == value) {
            return self.first_index + position as u32;
        }
        self.entries.push(value);
        self.first_index + (self.entries.len() as u32 - 1)
    }

    /// Returns the GUID stored at `index`, if it was added through this builder.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<Guid> {
        let position = index.checked_sub(self.first_index)? as usize;
        self.entries.get(position).copied()
    }

    /// Returns the heap size in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.entries.len() as u32 * 16
    }

    /// Consumes the builder and returns the heap bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.entries
            .iter()
            .flat_map(|guid| guid.to_bytes())
            .collect()
    }
}

/// The four heap builders of one generation.
#[derive(Debug)]
pub struct HeapBuilders {
    /// `#Strings` builder
    pub strings: StringHeapBuilder,
    /// `#Blob` builder
    pub blobs: BlobHeapBuilder,
    /// `#US` builder
    pub user_strings: UserStringHeapBuilder,
    /// `#GUID` builder
    pub guids: GuidHeapBuilder,
}

impl HeapBuilders {
    /// Creates builders that continue heaps of the given cumulative sizes.
    #[must_use]
    pub fn new(start: HeapSizes) -> Self {
        HeapBuilders {
            strings: StringHeapBuilder::new(start.strings),
            blobs: BlobHeapBuilder::new(start.blobs),
            user_strings: UserStringHeapBuilder::new(start.user_strings),
            guids: GuidHeapBuilder::new(start.guids),
        }
    }

    /// Returns the padded sizes of the bytes added through these builders.
    #[must_use]
    pub fn sizes(&self) -> HeapSizes {
        HeapSizes {
            strings: self.strings.size(),
            blobs: self.blobs.size(),
            user_strings: self.user_strings.size(),
            guids: self.guids.size(),
        }
    }

    /// Consumes the builders into serialized heaps.
    #[must_use]
    pub fn into_heaps(self) -> DeltaHeaps {
        DeltaHeaps {
            strings: self.strings.into_bytes(),
            blobs: self.blobs.into_bytes(),
            user_strings: self.user_strings.into_bytes(),
            guids: self.guids.into_bytes(),
        }
    }
}

/// Serialized heap bytes of one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaHeaps {
    /// `#Strings` bytes
    pub strings: Vec<u8>,
    /// `#Blob` bytes
    pub blobs: Vec<u8>,
    /// `#US` bytes
    pub user_strings: Vec<u8>,
    /// `#GUID` bytes
    pub guids: Vec<u8>,
}

impl DeltaHeaps {
    /// Returns the sizes of the serialized heaps.
    #[must_use]
    pub fn sizes(&self) -> HeapSizes {
        HeapSizes {
            strings: self.strings.len() as u32,
            blobs: self.blobs.len() as u32,
            user_strings: self.user_strings.len() as u32,
            guids: self.guids.len() as u32,
        }
    }
}

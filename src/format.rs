// SPDX-License-Identifier: MIT
//! Wire format building blocks
//!
//! ```text
//! Root value:     [2-bit frame tag] payload
//!                  00 null            (no payload)
//!                  01 exclusive       [prefixed type name][prefixed payload]
//!                  10 inclusive opaque    [prefixed payload]
//!                  11 inclusive primitive [prefixed payload]
//!
//! Length prefix:  [2-bit size class c][c + 1 little-endian length bytes]
//! Bits are written least-significant first within each byte.
//! ```

use crate::builder::BinaryCodeBuilder;
use crate::error::{ConverterError, Result};
use crate::reader::BinaryCodeReader;
use crate::source::ByteSource;

/// Two-bit tag opening every framed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    Null,
    Exclusive,
    InclusiveOpaque,
    InclusivePrimitive,
}

impl FrameTag {
    /// The tag bits in wire order
    #[inline]
    pub fn bits(self) -> (bool, bool) {
        match self {
            FrameTag::Null => (false, false),
            FrameTag::Exclusive => (false, true),
            FrameTag::InclusiveOpaque => (true, false),
            FrameTag::InclusivePrimitive => (true, true),
        }
    }

    pub fn from_bits(first: bool, second: bool) -> Self {
        match (first, second) {
            (false, false) => FrameTag::Null,
            (false, true) => FrameTag::Exclusive,
            (true, false) => FrameTag::InclusiveOpaque,
            (true, true) => FrameTag::InclusivePrimitive,
        }
    }

    pub fn write(self, builder: &mut BinaryCodeBuilder) {
        let (first, second) = self.bits();
        builder.push_bit(first);
        builder.push_bit(second);
    }

    pub fn read<S: ByteSource>(reader: &mut BinaryCodeReader<S>) -> Result<Self> {
        let first = reader.read_flag()?;
        let second = reader.read_flag()?;
        Ok(Self::from_bits(first, second))
    }
}

/// Smallest number of bytes (1 to 4) able to hold `length`
#[inline]
pub fn length_byte_count(length: u32) -> u8 {
    match length {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Write a length prefix: size class first, then the minimal little-endian bytes
pub fn append_length(builder: &mut BinaryCodeBuilder, length: u32) {
    let count = length_byte_count(length);
    let class = count - 1;
    builder.push_bit(class & 1 == 1);
    builder.push_bit(class & 2 == 2);
    builder.append_bytes(&length.to_le_bytes()[..count as usize]);
}

/// Read a length prefix written by [`append_length`]
pub fn read_length<S: ByteSource>(reader: &mut BinaryCodeReader<S>) -> Result<u32> {
    let class = reader.read_next_bit()? | (reader.read_next_bit()? << 1);
    let mut bytes = [0u8; 4];
    for slot in bytes.iter_mut().take(class as usize + 1) {
        *slot = reader.read_next_byte()?;
    }
    Ok(u32::from_le_bytes(bytes))
}

/// Write a length-prefixed byte string
pub fn append_prefixed(builder: &mut BinaryCodeBuilder, bytes: &[u8]) -> Result<()> {
    let length = u32::try_from(bytes.len()).map_err(|_| {
        ConverterError::InvalidArgument(format!(
            "payload of {} bytes exceeds the 32-bit length prefix",
            bytes.len()
        ))
    })?;
    append_length(builder, length);
    builder.append_bytes(bytes);
    Ok(())
}

/// Read a length-prefixed byte string
pub fn read_prefixed<S: ByteSource>(reader: &mut BinaryCodeReader<S>) -> Result<Vec<u8>> {
    let length = read_length(reader)?;
    reader.read_exact_bytes(length as usize)
}

/// Read a length-prefixed UTF-8 name, rejecting names longer than `max_len`
pub fn read_name<S: ByteSource>(reader: &mut BinaryCodeReader<S>, max_len: u32) -> Result<String> {
    let length = read_length(reader)?;
    if length > max_len {
        return Err(ConverterError::InvalidArgument(format!(
            "name of {} bytes exceeds limit of {}",
            length, max_len
        )));
    }
    let bytes = reader.read_exact_bytes(length as usize)?;
    String::from_utf8(bytes)
        .map_err(|e| ConverterError::InvalidArgument(format!("name is not valid UTF-8: {}", e)))
}

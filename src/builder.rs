// SPDX-License-Identifier: MIT
//! Bit-granular append-only writer
//!
//! Bits are packed least-significant first: the first bit appended to a byte
//! lands in bit 0, the eighth in bit 7. Whole bytes appended while the cursor
//! sits mid-byte are split across the current and the next byte.

use crate::error::{ConverterError, Result};
use crate::reader::BinaryCodeReader;
use crate::source::{ByteSink, MemorySource};

/// Builder for binary chains, written bit by bit, byte by byte or both mixed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryCodeBuilder {
    bytes: Vec<u8>,
    /// Bits already used in the last byte; 0 means the next bit opens a new byte
    bit_pointer: u8,
}

impl BinaryCodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            bit_pointer: 0,
        }
    }

    /// Start from whole bytes of existing content
    pub fn from_bytes(initial: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: initial.into(),
            bit_pointer: 0,
        }
    }

    /// Append a single bit given as 0 or 1
    pub fn append_bit(&mut self, bit: u8) -> Result<()> {
        if bit > 1 {
            return Err(ConverterError::InvalidArgument(format!(
                "bit can only take values of 0 and 1, got {}",
                bit
            )));
        }
        self.push_bit(bit == 1);
        Ok(())
    }

    /// Append a single bit
    #[inline]
    pub fn push_bit(&mut self, bit: bool) {
        if self.bit_pointer == 0 {
            self.bytes.push(bit as u8);
        } else if bit {
            // bit_pointer > 0 implies a last byte exists
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << self.bit_pointer;
            }
        }
        self.bit_pointer = (self.bit_pointer + 1) % 8;
    }

    /// Append a series of 0/1 bits; nothing is written if any value is invalid
    pub fn append_bits(&mut self, bits: &[u8]) -> Result<()> {
        if let Some(bad) = bits.iter().find(|&&b| b > 1) {
            return Err(ConverterError::InvalidArgument(format!(
                "bit can only take values of 0 and 1, got {}",
                bad
            )));
        }
        for &bit in bits {
            self.push_bit(bit == 1);
        }
        Ok(())
    }

    /// Append 8 bits at the current position
    #[inline]
    pub fn append_byte(&mut self, value: u8) {
        if self.bit_pointer == 0 {
            self.bytes.push(value);
            return;
        }
        if let Some(last) = self.bytes.last_mut() {
            *last |= value << self.bit_pointer;
        }
        self.bytes.push(value >> (8 - self.bit_pointer));
    }

    pub fn append_bytes(&mut self, values: &[u8]) {
        if self.bit_pointer == 0 {
            self.bytes.extend_from_slice(values);
            return;
        }
        self.bytes.reserve(values.len());
        for &value in values {
            self.append_byte(value);
        }
    }

    /// Splice the logical content of another builder, ignoring its unused tail bits
    pub fn append(&mut self, other: &BinaryCodeBuilder) {
        if other.bit_pointer == 0 {
            self.append_bytes(&other.bytes);
            return;
        }

        let (last, full) = match other.bytes.split_last() {
            Some(split) => split,
            None => return,
        };
        self.append_bytes(full);
        for i in 0..other.bit_pointer {
            self.push_bit((last >> i) & 1 == 1);
        }
    }

    /// Stored bytes; a partially filled last byte has its unused bits zeroed
    pub fn to_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of bits written so far
    pub fn bit_size(&self) -> usize {
        if self.bit_pointer == 0 {
            self.bytes.len() * 8
        } else {
            (self.bytes.len() - 1) * 8 + self.bit_pointer as usize
        }
    }

    /// Number of bytes needed to hold every written bit
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reader positioned at the first written bit
    pub fn into_reader(self) -> BinaryCodeReader<MemorySource> {
        BinaryCodeReader::new(MemorySource::new(self.bytes))
    }

    /// Flush every stored byte into a sink
    pub fn write_to<S: ByteSink>(&self, sink: &mut S) -> std::io::Result<()> {
        sink.write_bytes(&self.bytes)
    }

    /// Written bits as '0'/'1' characters in append order
    pub fn bit_string(&self) -> String {
        let mut out = String::with_capacity(self.bit_size());
        for index in 0..self.bit_size() {
            let byte = self.bytes[index / 8];
            out.push(if (byte >> (index % 8)) & 1 == 1 { '1' } else { '0' });
        }
        out
    }
}

impl From<BinaryCodeBuilder> for Vec<u8> {
    fn from(builder: BinaryCodeBuilder) -> Self {
        builder.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySink;

    #[test]
    fn test_bytes_add() {
        let bytes = [100u8, 140, 255, 0, 24];
        let mut one_by_one = BinaryCodeBuilder::new();
        for &b in &bytes {
            one_by_one.append_byte(b);
        }
        let mut bulk = BinaryCodeBuilder::new();
        bulk.append_bytes(&bytes);

        assert_eq!(one_by_one.to_bytes(), &bytes);
        assert_eq!(bulk.to_bytes(), &bytes);
        assert_eq!(bulk.bit_size(), 40);
    }

    #[test]
    fn test_bits_add() {
        let bits = [
            0, 0, 1, 0, 0, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 0,
        ];
        let mut one_by_one = BinaryCodeBuilder::new();
        for &b in &bits {
            one_by_one.append_bit(b).unwrap();
        }
        let mut bulk = BinaryCodeBuilder::new();
        bulk.append_bits(&bits).unwrap();

        assert_eq!(one_by_one.to_bytes(), &[100, 255, 24]);
        assert_eq!(bulk.to_bytes(), &[100, 255, 24]);
    }

    #[test]
    fn test_builder_append_splices_partial_byte() {
        let mut first = BinaryCodeBuilder::from_bytes(vec![100, 255]);
        first.append_bits(&[1, 0, 0, 1, 0]).unwrap();
        assert_eq!(first.bit_size(), 21);

        let mut second = BinaryCodeBuilder::new();
        second.append(&first);
        second.append_bits(&[0, 1, 1]).unwrap();

        assert_eq!(second.to_bytes(), &[100, 255, 201]);
        assert_eq!(second.bit_size(), 24);
    }

    #[test]
    fn test_append_into_unaligned_builder() {
        let mut other = BinaryCodeBuilder::new();
        other.append_byte(0xAB);
        other.append_bit(1).unwrap();

        let mut target = BinaryCodeBuilder::new();
        target.append_bits(&[1, 1, 1]).unwrap();
        target.append(&other);

        assert_eq!(target.bit_size(), 12);
        let mut reader = target.into_reader();
        assert_eq!(reader.read_next_bits(3).unwrap(), vec![1, 1, 1]);
        assert_eq!(reader.read_next_byte().unwrap(), 0xAB);
        assert_eq!(reader.read_next_bit().unwrap(), 1);
    }

    #[test]
    fn test_byte_after_bits_is_split() {
        let mut builder = BinaryCodeBuilder::new();
        builder.append_bits(&[1, 0, 1]).unwrap();
        builder.append_byte(0xFF);

        // 0b11111_101 then the remaining three high bits
        assert_eq!(builder.to_bytes(), &[0b1111_1101, 0b0000_0111]);
        assert_eq!(builder.bit_size(), 11);
        assert_eq!(builder.byte_size(), 2);
    }

    #[test]
    fn test_invalid_bit_rejected_without_partial_write() {
        let mut builder = BinaryCodeBuilder::new();
        assert!(matches!(
            builder.append_bit(2),
            Err(ConverterError::InvalidArgument(_))
        ));
        assert!(builder.append_bits(&[1, 1, 7]).is_err());
        assert!(builder.is_empty());
        assert_eq!(builder.bit_size(), 0);
    }

    #[test]
    fn test_bit_string_and_write_to() {
        let mut builder = BinaryCodeBuilder::new();
        builder.append_bits(&[1, 0, 0, 1]).unwrap();
        assert_eq!(builder.bit_string(), "1001");

        let mut sink = MemorySink::new();
        builder.write_to(&mut sink).unwrap();
        assert_eq!(&sink.into_bytes()[..], &[0b1001]);
    }
}

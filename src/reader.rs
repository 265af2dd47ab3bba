// SPDX-License-Identifier: MIT
//! Bit-granular cursor over a byte source
//!
//! Every byte pulled from the source is cached in a history buffer, so the
//! cursor can be moved backwards freely and forwards past not yet pulled
//! bytes without losing the ability to come back.

use crate::error::{ConverterError, Result};
use crate::source::{ByteSource, MemorySource};

/// Reader for binary chains produced by [`crate::BinaryCodeBuilder`]
#[derive(Debug)]
pub struct BinaryCodeReader<S> {
    source: S,
    history: Vec<u8>,
    byte_index: usize,
    bit_offset: u8,
}

impl BinaryCodeReader<MemorySource> {
    /// Reader over an owned or shared byte buffer
    pub fn from_bytes(bytes: impl Into<bytes::Bytes>) -> Self {
        Self::new(MemorySource::new(bytes))
    }

    /// Reader over a borrowed slice (copied once into a shared buffer)
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(MemorySource::from_slice(bytes))
    }
}

impl<S: ByteSource> BinaryCodeReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            history: Vec::new(),
            byte_index: 0,
            bit_offset: 0,
        }
    }

    /// Make sure `history[index]` exists, pulling and caching bytes as needed
    fn ensure(&mut self, index: usize) -> Result<()> {
        while self.history.len() <= index {
            let byte = self.source.next_byte()?;
            self.history.push(byte);
        }
        Ok(())
    }

    /// Read the next single bit (0 or 1)
    pub fn read_next_bit(&mut self) -> Result<u8> {
        self.ensure(self.byte_index)?;
        let bit = (self.history[self.byte_index] >> self.bit_offset) & 1;

        self.bit_offset += 1;
        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_index += 1;
        }
        Ok(bit)
    }

    #[inline]
    pub(crate) fn read_flag(&mut self) -> Result<bool> {
        Ok(self.read_next_bit()? == 1)
    }

    /// Read `count` bits, each returned as 0 or 1
    pub fn read_next_bits(&mut self, count: usize) -> Result<Vec<u8>> {
        if count < 1 {
            return Err(ConverterError::InvalidArgument(
                "number of bits has to be at least 1".to_string(),
            ));
        }
        (0..count).map(|_| self.read_next_bit()).collect()
    }

    /// Read the next 8 bits; mid-byte reads stitch two consecutive source bytes
    pub fn read_next_byte(&mut self) -> Result<u8> {
        if self.bit_offset == 0 {
            self.ensure(self.byte_index)?;
            let byte = self.history[self.byte_index];
            self.byte_index += 1;
            return Ok(byte);
        }

        self.ensure(self.byte_index + 1)?;
        let low = self.history[self.byte_index] >> self.bit_offset;
        let high = self.history[self.byte_index + 1] << (8 - self.bit_offset);
        self.byte_index += 1;
        Ok(low | high)
    }

    pub fn read_next_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if count < 1 {
            return Err(ConverterError::InvalidArgument(
                "number of bytes has to be at least 1".to_string(),
            ));
        }
        // The count may come from an untrusted length prefix
        let capacity = match self.remaining_bits() {
            Some(bits) => count.min(usize::try_from(bits / 8).unwrap_or(usize::MAX)),
            None => count,
        };
        let mut bytes = Vec::with_capacity(capacity);
        for _ in 0..count {
            bytes.push(self.read_next_byte()?);
        }
        Ok(bytes)
    }

    /// Like [`Self::read_next_bytes`] but a zero count yields an empty vector
    pub(crate) fn read_exact_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.read_next_bytes(count)
    }

    /// True only when no unread bit remains, partial bytes included
    pub fn end_of_source(&self) -> bool {
        self.byte_index >= self.history.len() && self.source.end_of_source()
    }

    /// Absolute bit position of the cursor from the start of the source
    pub fn position(&self) -> u64 {
        self.byte_index as u64 * 8 + self.bit_offset as u64
    }

    /// Unread bits left, when the underlying source knows its size
    pub fn remaining_bits(&self) -> Option<u64> {
        let pending = self.source.remaining()? as u64;
        let cached = self.history.len() as u64 * 8;
        Some((cached + pending * 8).saturating_sub(self.position()))
    }

    /// Move the cursor by `offset` bits, backwards when negative
    pub fn move_bit_pointer(&mut self, offset: i64) -> Result<()> {
        let target = i64::try_from(self.position())
            .ok()
            .and_then(|position| position.checked_add(offset));
        self.seek_to(target, offset)
    }

    /// Move the cursor by `offset` whole bytes, backwards when negative
    pub fn move_byte_pointer(&mut self, offset: i64) -> Result<()> {
        let target = offset.checked_mul(8).and_then(|bits| {
            i64::try_from(self.position())
                .ok()
                .and_then(|position| position.checked_add(bits))
        });
        self.seek_to(target, offset)
    }

    /// `target` is `None` when the move overflowed the bit position range
    fn seek_to(&mut self, target: Option<i64>, offset: i64) -> Result<()> {
        let target = match target {
            Some(target) if target >= 0 => target as u64,
            Some(target) => {
                return Err(ConverterError::InvalidArgument(format!(
                    "cannot move {} bits before the start of the source",
                    target.unsigned_abs()
                )))
            }
            None if offset > 0 => return Err(ConverterError::end_of_source()),
            None => {
                return Err(ConverterError::InvalidArgument(format!(
                    "cannot move the cursor by {} before the start of the source",
                    offset
                )))
            }
        };
        let byte_index =
            usize::try_from(target / 8).map_err(|_| ConverterError::end_of_source())?;
        let bit_offset = (target % 8) as u8;

        // Bytes skipped over are cached so a later backward move stays valid
        if byte_index > 0 {
            self.ensure(byte_index - 1)?;
        }
        if bit_offset > 0 {
            self.ensure(byte_index)?;
        }

        self.byte_index = byte_index;
        self.bit_offset = bit_offset;
        Ok(())
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

// SPDX-License-Identifier: MIT
//! Byte sources and sinks the bit streams read from and write to
//!
//! Memory and file backed implementations satisfy the same traits so the
//! codec layer never needs to know where bytes come from.

use bytes::{Bytes, BytesMut};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::ReadError;

/// Producer of bytes consumed by [`crate::BinaryCodeReader`]
pub trait ByteSource {
    /// Pull the next byte, failing with [`ReadError::EndOfSource`] when exhausted
    fn next_byte(&mut self) -> Result<u8, ReadError>;

    /// True when no further byte can be pulled
    fn end_of_source(&self) -> bool;

    /// Number of bytes still available, when the source knows it
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Consumer of bytes produced by [`crate::BinaryCodeBuilder`]
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn next_byte(&mut self) -> Result<u8, ReadError> {
        (**self).next_byte()
    }

    fn end_of_source(&self) -> bool {
        (**self).end_of_source()
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()> {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        (**self).write_bytes(bytes)
    }
}

/// In-memory source over a shared byte buffer (cheap to clone)
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Bytes,
    position: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Copies the slice; use [`MemorySource::new`] with owned data to avoid it
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }
}

impl ByteSource for MemorySource {
    #[inline]
    fn next_byte(&mut self) -> Result<u8, ReadError> {
        let byte = *self.data.get(self.position).ok_or(ReadError::EndOfSource)?;
        self.position += 1;
        Ok(byte)
    }

    #[inline]
    fn end_of_source(&self) -> bool {
        self.position >= self.data.len()
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.data.len().saturating_sub(self.position))
    }
}

/// Growable in-memory sink
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: BytesMut,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Freeze the written bytes into an immutable buffer
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

impl ByteSink for MemorySink {
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()> {
        self.buffer.extend_from_slice(&[byte]);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }
}

/// Source reading bytes straight from a file
///
/// The handle is released when the source is closed or dropped, whichever
/// comes first, so error paths never leak it.
#[derive(Debug)]
pub struct FileSource {
    reader: Option<BufReader<File>>,
    length: u64,
    position: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let file = File::open(path.as_ref())?;
        let length = file.metadata()?.len();
        tracing::debug!(path = %path.as_ref().display(), length, "opened file source");
        Ok(Self {
            reader: Some(BufReader::new(file)),
            length,
            position: 0,
        })
    }

    /// Release the file handle; further reads report end of source
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(position = self.position, "closed file source");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl ByteSource for FileSource {
    fn next_byte(&mut self) -> Result<u8, ReadError> {
        if self.position >= self.length {
            return Err(ReadError::EndOfSource);
        }
        let reader = self.reader.as_mut().ok_or(ReadError::EndOfSource)?;

        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte) {
            Ok(()) => {
                self.position += 1;
                Ok(byte[0])
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ReadError::EndOfSource),
            Err(e) => Err(ReadError::Io(e)),
        }
    }

    fn end_of_source(&self) -> bool {
        self.reader.is_none() || self.position >= self.length
    }

    fn remaining(&self) -> Option<usize> {
        if self.reader.is_none() {
            return Some(0);
        }
        usize::try_from(self.length.saturating_sub(self.position)).ok()
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sink writing bytes straight to a file (created or truncated on open)
#[derive(Debug)]
pub struct FileSink {
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl FileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "created file sink");
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Number of bytes accepted so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and release the file handle
    pub fn close(&mut self) -> std::io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                let flushed = writer.flush();
                tracing::debug!(written = self.written, "closed file sink");
                flushed
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "file sink already closed")
        })
    }
}

impl ByteSink for FileSink {
    fn write_byte(&mut self, byte: u8) -> std::io::Result<()> {
        self.writer()?.write_all(&[byte])?;
        self.written += 1;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writer()?.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to flush file sink on drop: {}", e);
        }
    }
}

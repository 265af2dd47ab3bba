// SPDX-License-Identifier: MIT
//! Error types shared by the bit streams, the codecs and the dispatcher

use crate::registry::ConverterCategory;
use crate::value::Value;

/// Boxed error returned by user supplied converter functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ConverterError>;

/// Errors raised while pulling bytes out of a source
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Cannot read beyond end of source")]
    EndOfSource,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while encoding or decoding
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("No {category:?} converter found for type {type_name}")]
    NoConverter {
        type_name: String,
        category: ConverterCategory,
    },

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Write error: {0}")]
    Write(std::io::Error),

    #[error("Converter method {method} failed for {object:?}: {source}")]
    ConverterMethod {
        object: Value,
        method: String,
        #[source]
        source: BoxError,
    },

    #[error("{category:?} converter for type {type_name} failed: {source}")]
    ConverterFunction {
        type_name: String,
        category: ConverterCategory,
        #[source]
        source: BoxError,
    },

    #[error("Infinite encoding loop detected at {object:?}")]
    InfiniteEncodingLoop { object: Value },

    #[error("Structural corruption: {0}")]
    StructuralCorruption(String),

    #[error("Opaque serializer error: {0}")]
    Opaque(String),

    #[error("Nesting depth exceeds limit of {limit}")]
    NestingTooDeep { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConverterError {
    /// True when the error was caused by running out of source bits
    pub fn is_end_of_source(&self) -> bool {
        matches!(self, ConverterError::Read(ReadError::EndOfSource))
    }

    pub(crate) fn end_of_source() -> Self {
        ConverterError::Read(ReadError::EndOfSource)
    }
}

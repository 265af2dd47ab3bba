// SPDX-License-Identifier: MIT
//! # Binary Converter
//!
//! Compact, self-describing binary encoding for arbitrary object graphs,
//! including private state and multi-level inheritance, without every type
//! having to hand-write a codec.
//!
//! ## Format Overview
//!
//! The wire format is bit-granular. Every value opens with a two-bit frame
//! tag telling the decoder whether the payload carries its own type (an
//! inclusive value) or needs a type name alongside it (an exclusive value).
//!
//! ```text
//! Root value:
//! - 00 null
//! - 01 exclusive           [prefixed type name][prefixed payload]
//! - 10 inclusive opaque    [prefixed payload]
//! - 11 inclusive primitive [prefixed payload]
//!
//! Length prefix:     [2-bit size class c][c + 1 little-endian bytes]
//! Primitive payload: [1 type tag byte][fixed-width little-endian value]
//! Structural payload, repeated until fewer than 8 bits remain:
//!                    [N x '1']['0'][prefixed field name][framed value]
//! ```
//!
//! ## Converter Resolution
//!
//! For every non-null value the first matching tier wins:
//!
//! | Tier | Source |
//! |------|--------|
//! | 1 | Runtime custom converter for the exact type |
//! | 2 | Built-in custom converter |
//! | 3 | Converter method declared on the type |
//! | 4 | Converter function attached to the type |
//! | 5 | Runtime default converter |
//! | 6 | Built-in default converter (text, byte strings) |
//! | 7 | Primitive codec |
//! | 8 | Opaque codec for types marked serializable |
//! | 9 | Structural codec |
//!
//! ## Usage
//!
//! ```rust
//! use binary_converter::{BinaryConverter, TypeDescriptor, TypeRegistry, Value, Visibility};
//!
//! let mut types = TypeRegistry::new();
//! types
//!     .register(
//!         TypeDescriptor::builder("demo.Point")
//!             .field("x", Visibility::Public)
//!             .field("y", Visibility::Private),
//!     )
//!     .unwrap();
//!
//! let converter = BinaryConverter::builder().types(types).build().unwrap();
//! let point = converter.types().instantiate("demo.Point").unwrap();
//! point.set("x", 3i32).unwrap();
//! point.set("y", -7i32).unwrap();
//!
//! let bytes = converter.encode_to_vec(&Value::Object(point.clone())).unwrap();
//! let decoded = converter.decode(&bytes).unwrap();
//! assert_eq!(decoded, Value::Object(point));
//! ```

pub mod builder;
pub mod complex;
pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod opaque;
pub mod primitive;
pub mod reader;
pub mod registry;
pub mod source;
pub mod types;
pub mod value;

// Re-export main types
pub use builder::BinaryCodeBuilder;
pub use complex::TraversalContext;
pub use config::ConverterConfig;
pub use converter::{BinaryConverter, BinaryConverterBuilder};
pub use error::{BoxError, ConverterError, ReadError, Result};
pub use format::FrameTag;
pub use opaque::{JsonOpaqueCodec, OpaqueCodec};
pub use reader::BinaryCodeReader;
pub use registry::{
    ConverterCategory, ConverterKind, ConverterTable, ConverterTables, DecoderEntry, EncoderEntry,
};
pub use source::{ByteSink, ByteSource, FileSink, FileSource, MemorySink, MemorySource};
pub use types::{
    FieldDescriptor, MethodReceiver, TypeBuilder, TypeDescriptor, TypeHandle, TypeMethod,
    TypeRegistry, Visibility,
};
pub use value::{FieldKey, ObjectRef, Primitive, PrimitiveKind, Value};

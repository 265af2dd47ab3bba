// SPDX-License-Identifier: MIT
//! Converter tables and the priority-ordered resolution engine
//!
//! Resolution walks the tiers of [`ConverterCategory`] in declaration order and
//! picks the first one able to convert the value's exact runtime type. Table
//! lookups never match on base types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ConverterError, Result};
use crate::types::{DecodeFn, EncodeFn, MethodDecodeFn, MethodEncodeFn, TypeHandle, TypeMethod};
use crate::value::Value;

/// Resolution tiers, highest priority first, plus `Any` for unrestricted requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConverterCategory {
    Any = 0,
    /// Runtime registered per-instance converter
    Custom = 1,
    /// Converter wired in at construction
    BuiltinCustom = 2,
    /// Converter method declared on the type itself
    TypeMethod = 3,
    /// Converter function attached to the type as a whole
    TypeGlobal = 4,
    /// Runtime registered fallback converter
    Default = 5,
    /// Fallback converter wired in at construction
    BuiltinDefault = 6,
    Primitive = 7,
    Opaque = 8,
    Complex = 9,
}

impl ConverterCategory {
    /// Every concrete tier in priority order
    pub const TIERS: [ConverterCategory; 9] = [
        ConverterCategory::Custom,
        ConverterCategory::BuiltinCustom,
        ConverterCategory::TypeMethod,
        ConverterCategory::TypeGlobal,
        ConverterCategory::Default,
        ConverterCategory::BuiltinDefault,
        ConverterCategory::Primitive,
        ConverterCategory::Opaque,
        ConverterCategory::Complex,
    ];

    /// Whether a request for `self` admits `tier`
    #[inline]
    pub fn admits(self, tier: ConverterCategory) -> bool {
        self == ConverterCategory::Any || self == tier
    }

    /// Wire framing of values converted by this tier
    pub fn kind(self) -> ConverterKind {
        match self {
            ConverterCategory::Primitive => ConverterKind::InclusivePrimitive,
            ConverterCategory::Opaque => ConverterKind::InclusiveOpaque,
            _ => ConverterKind::Exclusive,
        }
    }
}

/// How a converted payload is framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterKind {
    Exclusive,
    InclusiveOpaque,
    InclusivePrimitive,
    Null,
}

/// Encoder registered for one exact type
#[derive(Clone)]
pub struct EncoderEntry {
    pub type_name: String,
    pub func: EncodeFn,
}

impl EncoderEntry {
    pub fn new<F>(type_name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for EncoderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Decoder registered for one exact type
#[derive(Clone)]
pub struct DecoderEntry {
    pub type_name: String,
    pub func: DecodeFn,
}

impl DecoderEntry {
    pub fn new<F>(type_name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for DecoderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Encoders and decoders of one tier, unique per exact type name
#[derive(Debug, Clone, Default)]
pub struct ConverterTable {
    encoders: HashMap<String, EncoderEntry>,
    decoders: HashMap<String, DecoderEntry>,
}

impl ConverterTable {
    /// Insert an encoder, returning the one it replaces
    pub fn insert_encoder(&mut self, entry: EncoderEntry) -> Option<EncoderEntry> {
        self.encoders.insert(entry.type_name.clone(), entry)
    }

    /// Insert a decoder, returning the one it replaces
    pub fn insert_decoder(&mut self, entry: DecoderEntry) -> Option<DecoderEntry> {
        self.decoders.insert(entry.type_name.clone(), entry)
    }

    pub fn remove_encoder(&mut self, type_name: &str) -> Option<EncoderEntry> {
        self.encoders.remove(type_name)
    }

    pub fn remove_decoder(&mut self, type_name: &str) -> Option<DecoderEntry> {
        self.decoders.remove(type_name)
    }

    pub fn encoder(&self, type_name: &str) -> Option<&EncoderEntry> {
        self.encoders.get(type_name)
    }

    pub fn decoder(&self, type_name: &str) -> Option<&DecoderEntry> {
        self.decoders.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.encoders.len() + self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty() && self.decoders.is_empty()
    }
}

/// The encoder chosen for a value
#[derive(Clone)]
pub enum Encoder {
    Null,
    Function {
        category: ConverterCategory,
        func: EncodeFn,
    },
    Method(TypeMethod<MethodEncodeFn>),
    Primitive,
    Opaque,
    Complex,
}

impl Encoder {
    /// Winning tier, `None` for null
    pub fn category(&self) -> Option<ConverterCategory> {
        match self {
            Encoder::Null => None,
            Encoder::Function { category, .. } => Some(*category),
            Encoder::Method(_) => Some(ConverterCategory::TypeMethod),
            Encoder::Primitive => Some(ConverterCategory::Primitive),
            Encoder::Opaque => Some(ConverterCategory::Opaque),
            Encoder::Complex => Some(ConverterCategory::Complex),
        }
    }

    pub fn kind(&self) -> ConverterKind {
        self.category()
            .map_or(ConverterKind::Null, ConverterCategory::kind)
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoder::Null => f.write_str("Null"),
            Encoder::Method(method) => write!(f, "Method({})", method.name),
            Encoder::Function { category, .. } => write!(f, "Function({:?})", category),
            Encoder::Primitive => f.write_str("Primitive"),
            Encoder::Opaque => f.write_str("Opaque"),
            Encoder::Complex => f.write_str("Complex"),
        }
    }
}

/// The decoder chosen for a type
#[derive(Clone)]
pub enum Decoder {
    Function {
        category: ConverterCategory,
        func: DecodeFn,
    },
    Method(TypeMethod<MethodDecodeFn>),
    Primitive,
    Opaque,
    Complex,
}

impl Decoder {
    pub fn category(&self) -> ConverterCategory {
        match self {
            Decoder::Function { category, .. } => *category,
            Decoder::Method(_) => ConverterCategory::TypeMethod,
            Decoder::Primitive => ConverterCategory::Primitive,
            Decoder::Opaque => ConverterCategory::Opaque,
            Decoder::Complex => ConverterCategory::Complex,
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoder::Method(method) => write!(f, "Method({})", method.name),
            Decoder::Function { category, .. } => write!(f, "Function({:?})", category),
            other => write!(f, "{:?}", other.category()),
        }
    }
}

/// The four lookup tables consulted by resolution
#[derive(Debug, Clone, Default)]
pub struct ConverterTables {
    pub custom: ConverterTable,
    pub builtin_custom: ConverterTable,
    pub default: ConverterTable,
    pub builtin_default: ConverterTable,
}

impl ConverterTables {
    /// The table backing a table-driven tier
    pub fn table(&self, category: ConverterCategory) -> Option<&ConverterTable> {
        match category {
            ConverterCategory::Custom => Some(&self.custom),
            ConverterCategory::BuiltinCustom => Some(&self.builtin_custom),
            ConverterCategory::Default => Some(&self.default),
            ConverterCategory::BuiltinDefault => Some(&self.builtin_default),
            _ => None,
        }
    }

    pub fn table_mut(&mut self, category: ConverterCategory) -> Option<&mut ConverterTable> {
        match category {
            ConverterCategory::Custom => Some(&mut self.custom),
            ConverterCategory::BuiltinCustom => Some(&mut self.builtin_custom),
            ConverterCategory::Default => Some(&mut self.default),
            ConverterCategory::BuiltinDefault => Some(&mut self.builtin_default),
            _ => None,
        }
    }

    /// Pick the encoder for `value`, considering only tiers admitted by `filter`
    /// and not listed in `excluded`
    pub fn resolve_encoder(
        &self,
        value: &Value,
        filter: ConverterCategory,
        excluded: &[ConverterCategory],
    ) -> Result<Encoder> {
        let handle = match TypeHandle::of(value) {
            Some(handle) => handle,
            None => return Ok(Encoder::Null),
        };

        for tier in ConverterCategory::TIERS {
            if !filter.admits(tier) || excluded.contains(&tier) {
                continue;
            }
            if let Some(encoder) = self.encoder_at(tier, &handle) {
                tracing::trace!(type_name = handle.name(), category = ?tier, "resolved encoder");
                return Ok(encoder);
            }
        }

        Err(ConverterError::NoConverter {
            type_name: handle.name().to_string(),
            category: filter,
        })
    }

    fn encoder_at(&self, tier: ConverterCategory, handle: &TypeHandle) -> Option<Encoder> {
        match tier {
            ConverterCategory::TypeMethod => match handle {
                TypeHandle::Object(descriptor) => {
                    descriptor.method_encoder().cloned().map(Encoder::Method)
                }
                _ => None,
            },
            ConverterCategory::TypeGlobal => match handle {
                TypeHandle::Object(descriptor) => {
                    descriptor
                        .global_encoder()
                        .cloned()
                        .map(|func| Encoder::Function {
                            category: tier,
                            func,
                        })
                }
                _ => None,
            },
            ConverterCategory::Primitive => handle.is_primitive().then_some(Encoder::Primitive),
            ConverterCategory::Opaque => handle.is_serializable().then_some(Encoder::Opaque),
            ConverterCategory::Complex => {
                matches!(handle, TypeHandle::Object(_)).then_some(Encoder::Complex)
            }
            _ => self
                .table(tier)?
                .encoder(handle.name())
                .map(|entry| Encoder::Function {
                    category: tier,
                    func: Arc::clone(&entry.func),
                }),
        }
    }

    /// Pick the decoder for the type named on the wire
    pub fn resolve_decoder(
        &self,
        handle: &TypeHandle,
        filter: ConverterCategory,
        excluded: &[ConverterCategory],
    ) -> Result<Decoder> {
        for tier in ConverterCategory::TIERS {
            if !filter.admits(tier) || excluded.contains(&tier) {
                continue;
            }
            if let Some(decoder) = self.decoder_at(tier, handle) {
                tracing::trace!(type_name = handle.name(), category = ?tier, "resolved decoder");
                return Ok(decoder);
            }
        }

        Err(ConverterError::NoConverter {
            type_name: handle.name().to_string(),
            category: filter,
        })
    }

    fn decoder_at(&self, tier: ConverterCategory, handle: &TypeHandle) -> Option<Decoder> {
        match tier {
            ConverterCategory::TypeMethod => match handle {
                TypeHandle::Object(descriptor) => {
                    descriptor.method_decoder().cloned().map(Decoder::Method)
                }
                _ => None,
            },
            ConverterCategory::TypeGlobal => match handle {
                TypeHandle::Object(descriptor) => {
                    descriptor
                        .global_decoder()
                        .cloned()
                        .map(|func| Decoder::Function {
                            category: tier,
                            func,
                        })
                }
                _ => None,
            },
            ConverterCategory::Primitive => handle.is_primitive().then_some(Decoder::Primitive),
            ConverterCategory::Opaque => handle.is_serializable().then_some(Decoder::Opaque),
            ConverterCategory::Complex => {
                matches!(handle, TypeHandle::Object(_)).then_some(Decoder::Complex)
            }
            _ => self
                .table(tier)?
                .decoder(handle.name())
                .map(|entry| Decoder::Function {
                    category: tier,
                    func: Arc::clone(&entry.func),
                }),
        }
    }
}

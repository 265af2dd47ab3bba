// SPDX-License-Identifier: MIT
//! Top-level encode/decode dispatcher
//!
//! [`BinaryConverter`] owns the converter tables, the type registry, the
//! opaque codec and the configuration. Each top-level call runs with its own
//! [`TraversalContext`], so one converter can serve independent calls from
//! several threads at once.

use std::path::Path;
use std::sync::Arc;

use crate::builder::BinaryCodeBuilder;
use crate::complex::{self, TraversalContext};
use crate::config::ConverterConfig;
use crate::error::{BoxError, ConverterError, Result};
use crate::format::{append_prefixed, read_name, read_prefixed, FrameTag};
use crate::opaque::{JsonOpaqueCodec, OpaqueCodec};
use crate::primitive;
use crate::reader::BinaryCodeReader;
use crate::registry::{
    ConverterCategory, ConverterKind, ConverterTables, Decoder, DecoderEntry, Encoder,
    EncoderEntry,
};
use crate::source::{ByteSink, ByteSource, FileSink, FileSource};
use crate::types::{
    MethodReceiver, TypeBuilder, TypeDescriptor, TypeHandle, TypeRegistry, BYTES_TYPE, TEXT_TYPE,
};
use crate::value::{ObjectRef, Value};

/// Tiers never reachable through exclusive framing
const EXCLUSIVE_EXCLUDED: [ConverterCategory; 2] =
    [ConverterCategory::Primitive, ConverterCategory::Opaque];

/// Object-graph converter
pub struct BinaryConverter {
    tables: ConverterTables,
    types: TypeRegistry,
    opaque: Arc<dyn OpaqueCodec>,
    config: ConverterConfig,
}

impl std::fmt::Debug for BinaryConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryConverter")
            .field("tables", &self.tables)
            .field("types", &self.types.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for BinaryConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryConverter {
    /// Converter with an empty type registry and default configuration
    pub fn new() -> Self {
        let tables = builtin_tables(&ConverterConfig::default(), ConverterTables::default());
        Self::assemble(
            tables,
            TypeRegistry::new(),
            Arc::new(JsonOpaqueCodec::new()),
            ConverterConfig::default(),
        )
    }

    pub fn builder() -> BinaryConverterBuilder {
        BinaryConverterBuilder::new()
    }

    fn assemble(
        tables: ConverterTables,
        types: TypeRegistry,
        opaque: Arc<dyn OpaqueCodec>,
        config: ConverterConfig,
    ) -> Self {
        tracing::debug!(
            types = types.len(),
            builtin_custom = tables.builtin_custom.len(),
            builtin_default = tables.builtin_default.len(),
            max_depth = config.max_depth,
            "binary converter created"
        );
        Self {
            tables,
            types,
            opaque,
            config,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Register a structured type after construction
    pub fn register_type(&mut self, builder: TypeBuilder) -> Result<Arc<TypeDescriptor>> {
        self.types.register(builder)
    }

    pub fn tables(&self) -> &ConverterTables {
        &self.tables
    }

    /// Register a custom encoder for an exact type, replacing any previous one
    pub fn add_custom_encoder<F>(&mut self, type_name: impl Into<String>, func: F)
    where
        F: Fn(&Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        let entry = EncoderEntry::new(type_name, func);
        tracing::debug!(type_name = %entry.type_name, "custom encoder registered");
        self.tables.custom.insert_encoder(entry);
    }

    /// Register a custom decoder for an exact type, replacing any previous one
    pub fn add_custom_decoder<F>(&mut self, type_name: impl Into<String>, func: F)
    where
        F: Fn(&[u8]) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let entry = DecoderEntry::new(type_name, func);
        tracing::debug!(type_name = %entry.type_name, "custom decoder registered");
        self.tables.custom.insert_decoder(entry);
    }

    pub fn add_default_encoder<F>(&mut self, type_name: impl Into<String>, func: F)
    where
        F: Fn(&Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        let entry = EncoderEntry::new(type_name, func);
        tracing::debug!(type_name = %entry.type_name, "default encoder registered");
        self.tables.default.insert_encoder(entry);
    }

    pub fn add_default_decoder<F>(&mut self, type_name: impl Into<String>, func: F)
    where
        F: Fn(&[u8]) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let entry = DecoderEntry::new(type_name, func);
        tracing::debug!(type_name = %entry.type_name, "default decoder registered");
        self.tables.default.insert_decoder(entry);
    }

    /// Returns whether an encoder was registered
    pub fn remove_custom_encoder(&mut self, type_name: &str) -> bool {
        self.tables.custom.remove_encoder(type_name).is_some()
    }

    pub fn remove_custom_decoder(&mut self, type_name: &str) -> bool {
        self.tables.custom.remove_decoder(type_name).is_some()
    }

    pub fn remove_default_encoder(&mut self, type_name: &str) -> bool {
        self.tables.default.remove_encoder(type_name).is_some()
    }

    pub fn remove_default_decoder(&mut self, type_name: &str) -> bool {
        self.tables.default.remove_decoder(type_name).is_some()
    }

    /// Tier that would encode `value`; `None` for null
    pub fn encoder_category_for(&self, value: &Value) -> Result<Option<ConverterCategory>> {
        Ok(self
            .tables
            .resolve_encoder(value, ConverterCategory::Any, &[])?
            .category())
    }

    /// Tier that would decode an exclusive value of the named type
    pub fn decoder_category_for(&self, type_name: &str) -> Result<ConverterCategory> {
        let handle = self.types.resolve(type_name)?;
        Ok(self
            .tables
            .resolve_decoder(&handle, ConverterCategory::Any, &EXCLUSIVE_EXCLUDED)?
            .category())
    }

    /// Encode a value into a fresh builder
    pub fn encode(&self, value: &Value) -> Result<BinaryCodeBuilder> {
        let mut builder = BinaryCodeBuilder::new();
        self.encode_with(value, ConverterCategory::Any, &mut builder)?;
        Ok(builder)
    }

    /// Encode a value restricted to `filter`, appending to `builder`
    ///
    /// On failure `builder` is left exactly as it was.
    pub fn encode_with(
        &self,
        value: &Value,
        filter: ConverterCategory,
        builder: &mut BinaryCodeBuilder,
    ) -> Result<()> {
        let mut ctx = TraversalContext::new(self.config.max_depth);
        let mut scratch = BinaryCodeBuilder::new();

        match self.encode_value(value, filter, &mut scratch, &mut ctx) {
            Ok(()) => {
                tracing::debug!(
                    type_name = value.type_name().unwrap_or("null"),
                    bits = scratch.bit_size(),
                    "value encoded"
                );
                builder.append(&scratch);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "encode failed");
                Err(e)
            }
        }
    }

    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(self.encode(value)?.into_bytes())
    }

    pub fn encode_to_sink<K: ByteSink>(&self, value: &Value, sink: &mut K) -> Result<()> {
        let builder = self.encode(value)?;
        builder.write_to(sink).map_err(ConverterError::Write)
    }

    /// Encode into a newly created file; the handle is released on every path
    pub fn encode_to_file<P: AsRef<Path>>(&self, value: &Value, path: P) -> Result<()> {
        let mut sink = FileSink::create(path).map_err(ConverterError::Write)?;
        self.encode_to_sink(value, &mut sink)?;
        sink.close().map_err(ConverterError::Write)
    }

    pub(crate) fn encode_value(
        &self,
        value: &Value,
        filter: ConverterCategory,
        out: &mut BinaryCodeBuilder,
        ctx: &mut TraversalContext,
    ) -> Result<()> {
        let encoder = self.tables.resolve_encoder(value, filter, &[])?;
        match encoder.kind() {
            ConverterKind::Null => {
                FrameTag::Null.write(out);
                Ok(())
            }
            ConverterKind::Exclusive => {
                let payload = self.run_encoder(&encoder, value, ctx)?;
                FrameTag::Exclusive.write(out);
                append_prefixed(out, value.type_name().unwrap_or_default().as_bytes())?;
                append_prefixed(out, &payload)
            }
            ConverterKind::InclusiveOpaque => {
                let payload = self.run_encoder(&encoder, value, ctx)?;
                FrameTag::InclusiveOpaque.write(out);
                append_prefixed(out, &payload)
            }
            ConverterKind::InclusivePrimitive => {
                let payload = self.run_encoder(&encoder, value, ctx)?;
                FrameTag::InclusivePrimitive.write(out);
                append_prefixed(out, &payload)
            }
        }
    }

    fn run_encoder(
        &self,
        encoder: &Encoder,
        value: &Value,
        ctx: &mut TraversalContext,
    ) -> Result<Vec<u8>> {
        match encoder {
            Encoder::Null => Ok(Vec::new()),
            Encoder::Function { category, func } => {
                func(value).map_err(|source| ConverterError::ConverterFunction {
                    type_name: value.type_name().unwrap_or_default().to_string(),
                    category: *category,
                    source,
                })
            }
            Encoder::Method(method) => {
                let receiver = match method.receiver {
                    MethodReceiver::Instance => Some(value),
                    MethodReceiver::Static => None,
                };
                (method.func)(receiver, value).map_err(|source| ConverterError::ConverterMethod {
                    object: value.clone(),
                    method: method.name.clone(),
                    source,
                })
            }
            Encoder::Primitive => primitive::encode(value),
            Encoder::Opaque => self
                .opaque
                .serialize(value)
                .map_err(|e| ConverterError::Opaque(e.to_string())),
            Encoder::Complex => {
                let object = value.as_object().ok_or_else(|| {
                    ConverterError::InvalidArgument(format!(
                        "type {} has no fields to encode",
                        value.type_name().unwrap_or("null")
                    ))
                })?;
                let mut payload = BinaryCodeBuilder::new();
                complex::encode_object(self, object, ctx, &mut payload)?;
                Ok(payload.into_bytes())
            }
        }
    }

    /// Decode one value from the start of `bytes`
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut reader = BinaryCodeReader::from_slice(bytes);
        self.decode_with(&mut reader, ConverterCategory::Any)
    }

    /// Decode the next value from `reader`, restricted to `filter`
    pub fn decode_with<S: ByteSource>(
        &self,
        reader: &mut BinaryCodeReader<S>,
        filter: ConverterCategory,
    ) -> Result<Value> {
        let mut ctx = TraversalContext::new(self.config.max_depth);
        let start = reader.position();

        match self.decode_value(reader, filter, &mut ctx) {
            Ok(value) => {
                tracing::debug!(
                    type_name = value.type_name().unwrap_or("null"),
                    bits = reader.position() - start,
                    "value decoded"
                );
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, position = start, "decode failed");
                Err(e)
            }
        }
    }

    pub fn decode_from_source<S: ByteSource>(&self, source: S) -> Result<Value> {
        let mut reader = BinaryCodeReader::new(source);
        self.decode_with(&mut reader, ConverterCategory::Any)
    }

    /// Decode the first value stored in a file; the handle is released on every path
    pub fn decode_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        let mut source = FileSource::open(path)?;
        let value = self.decode_from_source(&mut source);
        source.close();
        value
    }

    pub(crate) fn decode_value<S: ByteSource>(
        &self,
        reader: &mut BinaryCodeReader<S>,
        filter: ConverterCategory,
        ctx: &mut TraversalContext,
    ) -> Result<Value> {
        match FrameTag::read(reader)? {
            FrameTag::Null => Ok(Value::Null),
            FrameTag::Exclusive => {
                let type_name = read_name(reader, self.config.max_name_len)?;
                let handle = self.types.resolve(&type_name)?;
                let decoder = self
                    .tables
                    .resolve_decoder(&handle, filter, &EXCLUSIVE_EXCLUDED)?;
                let payload = read_prefixed(reader)?;
                self.run_decoder(&decoder, &handle, payload, ctx)
            }
            FrameTag::InclusiveOpaque => {
                check_inclusive(filter, ConverterCategory::Opaque)?;
                let payload = read_prefixed(reader)?;
                self.opaque_decode(&payload)
            }
            FrameTag::InclusivePrimitive => {
                check_inclusive(filter, ConverterCategory::Primitive)?;
                let payload = read_prefixed(reader)?;
                primitive::decode(&payload).map(Value::Primitive)
            }
        }
    }

    fn run_decoder(
        &self,
        decoder: &Decoder,
        handle: &TypeHandle,
        payload: Vec<u8>,
        ctx: &mut TraversalContext,
    ) -> Result<Value> {
        match decoder {
            Decoder::Function { category, func } => {
                func(&payload).map_err(|source| ConverterError::ConverterFunction {
                    type_name: handle.name().to_string(),
                    category: *category,
                    source,
                })
            }
            Decoder::Method(method) => {
                let instance = handle.uninitialized();
                let receiver = match method.receiver {
                    MethodReceiver::Instance => Some(&instance),
                    MethodReceiver::Static => None,
                };
                (method.func)(receiver, &payload).map_err(|source| {
                    ConverterError::ConverterMethod {
                        object: instance.clone(),
                        method: method.name.clone(),
                        source,
                    }
                })
            }
            Decoder::Primitive => primitive::decode(&payload).map(Value::Primitive),
            Decoder::Opaque => self.opaque_decode(&payload),
            Decoder::Complex => {
                let descriptor = match handle {
                    TypeHandle::Object(descriptor) => Arc::clone(descriptor),
                    other => {
                        return Err(ConverterError::InvalidArgument(format!(
                            "type {} cannot be decoded structurally",
                            other.name()
                        )))
                    }
                };
                let object = ObjectRef::uninitialized(descriptor);
                complex::decode_object(self, payload, &object, ctx)?;
                Ok(Value::Object(object))
            }
        }
    }

    fn opaque_decode(&self, payload: &[u8]) -> Result<Value> {
        self.opaque
            .deserialize(payload, &self.types)
            .map_err(|e| ConverterError::Opaque(e.to_string()))
    }
}

fn check_inclusive(filter: ConverterCategory, framed: ConverterCategory) -> Result<()> {
    if filter.admits(framed) {
        Ok(())
    } else {
        Err(ConverterError::InvalidArgument(format!(
            "{:?} value on the wire does not match requested {:?} converter",
            framed, filter
        )))
    }
}

/// Add the built-in default text and byte-string converters when enabled,
/// keeping any entry supplied explicitly
fn builtin_tables(config: &ConverterConfig, mut tables: ConverterTables) -> ConverterTables {
    if !config.builtin_defaults {
        return tables;
    }
    let table = &mut tables.builtin_default;

    if table.encoder(TEXT_TYPE).is_none() {
        table.insert_encoder(EncoderEntry::new(TEXT_TYPE, |value| match value {
            Value::Text(text) => Ok(text.as_bytes().to_vec()),
            _ => Err("expected a string value".into()),
        }));
    }
    if table.decoder(TEXT_TYPE).is_none() {
        table.insert_decoder(DecoderEntry::new(TEXT_TYPE, |bytes| {
            Ok(Value::Text(String::from_utf8(bytes.to_vec())?))
        }));
    }
    if table.encoder(BYTES_TYPE).is_none() {
        table.insert_encoder(EncoderEntry::new(BYTES_TYPE, |value| match value {
            Value::Bytes(bytes) => Ok(bytes.to_vec()),
            _ => Err("expected a byte string value".into()),
        }));
    }
    if table.decoder(BYTES_TYPE).is_none() {
        table.insert_decoder(DecoderEntry::new(BYTES_TYPE, |bytes| {
            Ok(Value::Bytes(bytes::Bytes::copy_from_slice(bytes)))
        }));
    }
    tables
}

/// Construction-time wiring of built-in tables, types, codec and configuration
pub struct BinaryConverterBuilder {
    tables: ConverterTables,
    types: TypeRegistry,
    opaque: Option<Arc<dyn OpaqueCodec>>,
    config: ConverterConfig,
}

impl Default for BinaryConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryConverterBuilder {
    pub fn new() -> Self {
        Self {
            tables: ConverterTables::default(),
            types: TypeRegistry::new(),
            opaque: None,
            config: ConverterConfig::default(),
        }
    }

    pub fn types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn opaque_codec<C: OpaqueCodec + 'static>(mut self, codec: C) -> Self {
        self.opaque = Some(Arc::new(codec));
        self
    }

    pub fn builtin_custom_encoder(mut self, entry: EncoderEntry) -> Self {
        self.tables.builtin_custom.insert_encoder(entry);
        self
    }

    pub fn builtin_custom_decoder(mut self, entry: DecoderEntry) -> Self {
        self.tables.builtin_custom.insert_decoder(entry);
        self
    }

    pub fn builtin_default_encoder(mut self, entry: EncoderEntry) -> Self {
        self.tables.builtin_default.insert_encoder(entry);
        self
    }

    pub fn builtin_default_decoder(mut self, entry: DecoderEntry) -> Self {
        self.tables.builtin_default.insert_decoder(entry);
        self
    }

    pub fn build(self) -> Result<BinaryConverter> {
        self.config.validate()?;
        let tables = builtin_tables(&self.config, self.tables);
        let opaque = self
            .opaque
            .unwrap_or_else(|| Arc::new(JsonOpaqueCodec::new()));
        Ok(BinaryConverter::assemble(
            tables,
            self.types,
            opaque,
            self.config,
        ))
    }
}

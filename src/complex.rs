// SPDX-License-Identifier: MIT
//! Structural codec for composite objects
//!
//! The payload is a stream of field records:
//!
//! ```text
//! [N x '1'][ '0' ][prefixed field name][framed field value]
//! ```
//!
//! N counts the hierarchy levels climbed since the previous record. Level 0
//! holds the object's own fields and the non-private fields it inherits, each
//! ancestor level only that ancestor's private fields. Records continue until
//! fewer than eight bits remain; those are padding and must be zero.

use std::collections::HashSet;

use crate::builder::BinaryCodeBuilder;
use crate::converter::BinaryConverter;
use crate::error::{ConverterError, Result};
use crate::format::{append_prefixed, read_name};
use crate::reader::BinaryCodeReader;
use crate::registry::ConverterCategory;
use crate::types::TypeDescriptor;
use crate::value::{FieldKey, ObjectRef, Value};

/// Per-call traversal state threaded through every recursive encode and decode
#[derive(Debug)]
pub struct TraversalContext {
    /// Objects on the current encode path
    active: HashSet<usize>,
    depth: usize,
    max_depth: usize,
}

impl TraversalContext {
    pub fn new(max_depth: usize) -> Self {
        Self {
            active: HashSet::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether `object` is currently being encoded further up the path
    pub fn is_active(&self, object: &ObjectRef) -> bool {
        self.active.contains(&object.id())
    }

    fn descend(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(ConverterError::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Mark `object` as being encoded; re-entering it is a cycle
    fn enter(&mut self, object: &ObjectRef) -> Result<()> {
        if !self.active.insert(object.id()) {
            tracing::warn!(
                type_name = object.descriptor().name(),
                "infinite encoding loop detected"
            );
            return Err(ConverterError::InfiniteEncodingLoop {
                object: Value::Object(object.clone()),
            });
        }
        if let Err(e) = self.descend() {
            self.active.remove(&object.id());
            return Err(e);
        }
        Ok(())
    }

    fn leave(&mut self, object: &ObjectRef) {
        self.active.remove(&object.id());
        self.ascend();
    }
}

/// Encode every field of `object` as structural records
pub(crate) fn encode_object(
    converter: &BinaryConverter,
    object: &ObjectRef,
    ctx: &mut TraversalContext,
    out: &mut BinaryCodeBuilder,
) -> Result<()> {
    ctx.enter(object)?;
    let result = encode_records(converter, object, ctx, out);
    ctx.leave(object);
    result
}

fn encode_records(
    converter: &BinaryConverter,
    object: &ObjectRef,
    ctx: &mut TraversalContext,
    out: &mut BinaryCodeBuilder,
) -> Result<()> {
    let descriptor = object.descriptor();
    let mut climbed = 0usize;

    for level in 0..descriptor.hierarchy().count() {
        for key in descriptor.level_fields(level) {
            for _ in 0..climbed {
                out.push_bit(true);
            }
            out.push_bit(false);
            climbed = 0;

            tracing::trace!(field = %key, level, "encoding field");
            append_prefixed(out, key.name.as_bytes())?;
            let value = object.get_slot(&key).unwrap_or_default();
            converter.encode_value(&value, ConverterCategory::Any, out, ctx)?;
        }
        climbed += 1;
    }
    Ok(())
}

/// Fill the slots of a freshly allocated `object` from a structural payload
pub(crate) fn decode_object(
    converter: &BinaryConverter,
    payload: Vec<u8>,
    object: &ObjectRef,
    ctx: &mut TraversalContext,
) -> Result<()> {
    ctx.descend()?;
    let result = decode_records(converter, payload, object, ctx);
    ctx.ascend();
    result
}

fn decode_records(
    converter: &BinaryConverter,
    payload: Vec<u8>,
    object: &ObjectRef,
    ctx: &mut TraversalContext,
) -> Result<()> {
    let descriptor = object.descriptor();
    let mut reader = BinaryCodeReader::from_bytes(payload);
    let mut ancestor: &TypeDescriptor = descriptor;
    let mut level = 0usize;

    while reader.remaining_bits().unwrap_or(0) >= 8 {
        while reader.read_flag()? {
            ancestor = ancestor.base().map(|base| &**base).ok_or_else(|| {
                ConverterError::StructuralCorruption(format!(
                    "field marker climbs past the root of {}",
                    descriptor.name()
                ))
            })?;
            level += 1;
        }

        let name = read_name(&mut reader, converter.config().max_name_len)?;
        let key = field_at_level(descriptor, ancestor, level, &name)?;
        tracing::trace!(field = %key, level, "decoding field");

        let value = converter.decode_value(&mut reader, ConverterCategory::Any, ctx)?;
        object.set_slot(key, value)?;
    }

    while !reader.end_of_source() {
        if reader.read_flag()? {
            return Err(ConverterError::StructuralCorruption(format!(
                "non-zero padding after the fields of {}",
                descriptor.name()
            )));
        }
    }
    Ok(())
}

fn field_at_level(
    target: &TypeDescriptor,
    ancestor: &TypeDescriptor,
    level: usize,
    name: &str,
) -> Result<FieldKey> {
    let key = if level == 0 {
        target.lookup_field(name)
    } else {
        ancestor
            .declared_fields()
            .iter()
            .any(|f| f.name == name)
            .then(|| FieldKey::new(ancestor.name(), name))
    };
    key.ok_or_else(|| {
        ConverterError::StructuralCorruption(format!(
            "type {} has no field {} at hierarchy level {}",
            ancestor.name(),
            name,
            level
        ))
    })
}

// SPDX-License-Identifier: MIT
//! Whole-graph serializer used for types marked serializable
//!
//! The converter treats this codec as a black box: it hands over a value and
//! frames whatever bytes come back. [`JsonOpaqueCodec`] is the default and
//! stores the value as self-describing JSON.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::types::TypeRegistry;
use crate::value::{FieldKey, Primitive, Value};

/// Full object-graph serializer invoked for opaque values
pub trait OpaqueCodec: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, BoxError>;

    /// Rebuild a value; object types are looked up in `registry`
    fn deserialize(&self, bytes: &[u8], registry: &TypeRegistry) -> Result<Value, BoxError>;
}

/// Serde mirror of [`Value`]; floats are kept as raw bits so NaN payloads survive
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
enum Mirror {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(u32),
    F64(u64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Mirror>),
    Object {
        type_name: String,
        fields: Vec<MirrorField>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct MirrorField {
    owner: String,
    name: String,
    value: Mirror,
}

/// Default opaque codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOpaqueCodec;

impl JsonOpaqueCodec {
    pub fn new() -> Self {
        Self
    }
}

fn to_mirror(value: &Value, active: &mut HashSet<usize>) -> Result<Mirror, BoxError> {
    Ok(match value {
        Value::Null => Mirror::Null,
        Value::Primitive(p) => match *p {
            Primitive::Bool(v) => Mirror::Bool(v),
            Primitive::Char(v) => Mirror::Char(v),
            Primitive::I8(v) => Mirror::I8(v),
            Primitive::U8(v) => Mirror::U8(v),
            Primitive::I16(v) => Mirror::I16(v),
            Primitive::U16(v) => Mirror::U16(v),
            Primitive::I32(v) => Mirror::I32(v),
            Primitive::U32(v) => Mirror::U32(v),
            Primitive::I64(v) => Mirror::I64(v),
            Primitive::U64(v) => Mirror::U64(v),
            Primitive::F32(v) => Mirror::F32(v.to_bits()),
            Primitive::F64(v) => Mirror::F64(v.to_bits()),
        },
        Value::Text(text) => Mirror::Text(text.clone()),
        Value::Bytes(bytes) => Mirror::Bytes(bytes.to_vec()),
        Value::List(items) => Mirror::List(
            items
                .iter()
                .map(|item| to_mirror(item, active))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(object) => {
            if !active.insert(object.id()) {
                return Err(format!(
                    "cyclic reference through {} cannot be serialized",
                    object.descriptor().name()
                )
                .into());
            }
            let mut slots: Vec<(FieldKey, Value)> = object.slots().into_iter().collect();
            slots.sort_by(|a, b| a.0.cmp(&b.0));
            let fields = slots
                .into_iter()
                .map(|(key, value)| {
                    Ok(MirrorField {
                        value: to_mirror(&value, active)?,
                        owner: key.owner,
                        name: key.name,
                    })
                })
                .collect::<Result<Vec<_>, BoxError>>()?;
            active.remove(&object.id());
            Mirror::Object {
                type_name: object.descriptor().name().to_string(),
                fields,
            }
        }
    })
}

fn from_mirror(mirror: Mirror, registry: &TypeRegistry) -> Result<Value, BoxError> {
    Ok(match mirror {
        Mirror::Null => Value::Null,
        Mirror::Bool(v) => v.into(),
        Mirror::Char(v) => v.into(),
        Mirror::I8(v) => v.into(),
        Mirror::U8(v) => v.into(),
        Mirror::I16(v) => v.into(),
        Mirror::U16(v) => v.into(),
        Mirror::I32(v) => v.into(),
        Mirror::U32(v) => v.into(),
        Mirror::I64(v) => v.into(),
        Mirror::U64(v) => v.into(),
        Mirror::F32(bits) => f32::from_bits(bits).into(),
        Mirror::F64(bits) => f64::from_bits(bits).into(),
        Mirror::Text(text) => Value::Text(text),
        Mirror::Bytes(bytes) => Value::from(bytes),
        Mirror::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| from_mirror(item, registry))
                .collect::<Result<_, _>>()?,
        ),
        Mirror::Object { type_name, fields } => {
            let object = registry.instantiate(&type_name)?;
            for field in fields {
                let value = from_mirror(field.value, registry)?;
                object.set_slot(FieldKey::new(field.owner, field.name), value)?;
            }
            Value::Object(object)
        }
    })
}

impl OpaqueCodec for JsonOpaqueCodec {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, BoxError> {
        let mirror = to_mirror(value, &mut HashSet::new())?;
        Ok(serde_json::to_vec(&mirror)?)
    }

    fn deserialize(&self, bytes: &[u8], registry: &TypeRegistry) -> Result<Value, BoxError> {
        let mirror: Mirror = serde_json::from_slice(bytes)?;
        from_mirror(mirror, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeDescriptor, Visibility};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeDescriptor::builder("demo.Settings")
                    .serializable()
                    .field("name", Visibility::Public)
                    .field("ratio", Visibility::Private)
                    .field("child", Visibility::Public),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_json_codec_round_trip() {
        let registry = registry();
        let settings = registry.instantiate("demo.Settings").unwrap();
        settings.set("name", "primary").unwrap();
        settings.set("ratio", f64::NAN).unwrap();
        settings
            .set("child", vec![Value::from(1u8), Value::from(vec![9u8, 8])])
            .unwrap();
        let value = Value::Object(settings);

        let codec = JsonOpaqueCodec::new();
        let bytes = codec.serialize(&value).unwrap();
        let decoded = codec.deserialize(&bytes, &registry).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_json_codec_rejects_cycles() {
        let registry = registry();
        let settings = registry.instantiate("demo.Settings").unwrap();
        settings.set("child", settings.clone()).unwrap();
        assert!(JsonOpaqueCodec::new()
            .serialize(&Value::Object(settings))
            .is_err());
    }

    #[test]
    fn test_json_codec_unknown_type() {
        let codec = JsonOpaqueCodec::new();
        let bytes = br#"{"t":"object","v":{"type_name":"demo.Gone","fields":[]}}"#;
        assert!(codec.deserialize(bytes, &TypeRegistry::new()).is_err());
    }
}

// SPDX-License-Identifier: MIT
//! Fixed-width scalar codec
//!
//! Payload layout: one tag byte naming the scalar type, then its little-endian
//! bytes. `char` travels as its 32-bit scalar value, `bool` as one byte.

use crate::error::{ConverterError, Result};
use crate::value::{Primitive, PrimitiveKind, Value};

/// One-byte tag identifying a scalar type on the wire
pub fn tag_of(kind: PrimitiveKind) -> u8 {
    match kind {
        PrimitiveKind::Bool => 3,
        PrimitiveKind::Char => 4,
        PrimitiveKind::I8 => 5,
        PrimitiveKind::U8 => 6,
        PrimitiveKind::I16 => 7,
        PrimitiveKind::U16 => 8,
        PrimitiveKind::I32 => 9,
        PrimitiveKind::U32 => 10,
        PrimitiveKind::I64 => 11,
        PrimitiveKind::U64 => 12,
        PrimitiveKind::F32 => 13,
        PrimitiveKind::F64 => 14,
    }
}

pub fn kind_of_tag(tag: u8) -> Option<PrimitiveKind> {
    PrimitiveKind::ALL
        .into_iter()
        .find(|kind| tag_of(*kind) == tag)
}

/// Encode a scalar value into its tagged payload
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let primitive = value.as_primitive().ok_or_else(|| {
        ConverterError::InvalidArgument(format!(
            "type {} is not a supported primitive",
            value.type_name().unwrap_or("null")
        ))
    })?;
    Ok(encode_primitive(primitive))
}

pub fn encode_primitive(primitive: Primitive) -> Vec<u8> {
    let kind = primitive.kind();
    let mut payload = Vec::with_capacity(1 + kind.width());
    payload.push(tag_of(kind));
    match primitive {
        Primitive::Bool(v) => payload.push(v as u8),
        Primitive::Char(v) => payload.extend_from_slice(&(v as u32).to_le_bytes()),
        Primitive::I8(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::U8(v) => payload.push(v),
        Primitive::I16(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::U16(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::I32(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::U32(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::I64(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::U64(v) => payload.extend_from_slice(&v.to_le_bytes()),
        Primitive::F32(v) => payload.extend_from_slice(&v.to_bits().to_le_bytes()),
        Primitive::F64(v) => payload.extend_from_slice(&v.to_bits().to_le_bytes()),
    }
    payload
}

/// Decode a tagged payload back into a scalar
pub fn decode(payload: &[u8]) -> Result<Primitive> {
    let (&tag, body) = payload
        .split_first()
        .ok_or_else(|| ConverterError::InvalidArgument("empty primitive payload".to_string()))?;
    let kind = kind_of_tag(tag).ok_or_else(|| {
        ConverterError::InvalidArgument(format!("unknown primitive type tag {}", tag))
    })?;
    if body.len() != kind.width() {
        return Err(ConverterError::InvalidArgument(format!(
            "{} payload must be {} bytes, got {}",
            kind.type_name(),
            kind.width(),
            body.len()
        )));
    }

    Ok(match kind {
        PrimitiveKind::Bool => match body[0] {
            0 => Primitive::Bool(false),
            1 => Primitive::Bool(true),
            other => {
                return Err(ConverterError::InvalidArgument(format!(
                    "invalid bool byte {}",
                    other
                )))
            }
        },
        PrimitiveKind::Char => {
            let scalar = u32::from_le_bytes(fixed(body)?);
            Primitive::Char(char::from_u32(scalar).ok_or_else(|| {
                ConverterError::InvalidArgument(format!("invalid char scalar {:#x}", scalar))
            })?)
        }
        PrimitiveKind::I8 => Primitive::I8(i8::from_le_bytes(fixed(body)?)),
        PrimitiveKind::U8 => Primitive::U8(body[0]),
        PrimitiveKind::I16 => Primitive::I16(i16::from_le_bytes(fixed(body)?)),
        PrimitiveKind::U16 => Primitive::U16(u16::from_le_bytes(fixed(body)?)),
        PrimitiveKind::I32 => Primitive::I32(i32::from_le_bytes(fixed(body)?)),
        PrimitiveKind::U32 => Primitive::U32(u32::from_le_bytes(fixed(body)?)),
        PrimitiveKind::I64 => Primitive::I64(i64::from_le_bytes(fixed(body)?)),
        PrimitiveKind::U64 => Primitive::U64(u64::from_le_bytes(fixed(body)?)),
        PrimitiveKind::F32 => Primitive::F32(f32::from_bits(u32::from_le_bytes(fixed(body)?))),
        PrimitiveKind::F64 => Primitive::F64(f64::from_bits(u64::from_le_bytes(fixed(body)?))),
    })
}

fn fixed<const N: usize>(body: &[u8]) -> Result<[u8; N]> {
    body.try_into().map_err(|_| {
        ConverterError::InvalidArgument(format!("expected {} value bytes, got {}", N, body.len()))
    })
}

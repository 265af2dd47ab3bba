// SPDX-License-Identifier: MIT
//! In-memory values the converter encodes and reconstructs
//!
//! A [`Value`] is null, a scalar, a platform value handled by the opaque or
//! built-in codecs (text, byte strings, lists) or a structured object. Objects
//! are shared handles so graphs may fan in and even point back at themselves;
//! identity is the handle's allocation, not its contents.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConverterError, Result};
use crate::types::TypeDescriptor;

/// Scalar types the primitive codec understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 12] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::I8,
        PrimitiveKind::U8,
        PrimitiveKind::I16,
        PrimitiveKind::U16,
        PrimitiveKind::I32,
        PrimitiveKind::U32,
        PrimitiveKind::I64,
        PrimitiveKind::U64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
    ];

    /// Fully-qualified type name used on the wire and in converter tables
    pub fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }

    /// Byte width of the fixed little-endian representation
    pub fn width(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::Char | PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }

    /// The all-zero value of this kind
    pub fn zero(self) -> Primitive {
        match self {
            PrimitiveKind::Bool => Primitive::Bool(false),
            PrimitiveKind::Char => Primitive::Char('\0'),
            PrimitiveKind::I8 => Primitive::I8(0),
            PrimitiveKind::U8 => Primitive::U8(0),
            PrimitiveKind::I16 => Primitive::I16(0),
            PrimitiveKind::U16 => Primitive::U16(0),
            PrimitiveKind::I32 => Primitive::I32(0),
            PrimitiveKind::U32 => Primitive::U32(0),
            PrimitiveKind::I64 => Primitive::I64(0),
            PrimitiveKind::U64 => Primitive::U64(0),
            PrimitiveKind::F32 => Primitive::F32(0.0),
            PrimitiveKind::F64 => Primitive::F64(0.0),
        }
    }
}

/// A scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
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
    F32(f32),
    F64(f64),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Bool(_) => PrimitiveKind::Bool,
            Primitive::Char(_) => PrimitiveKind::Char,
            Primitive::I8(_) => PrimitiveKind::I8,
            Primitive::U8(_) => PrimitiveKind::U8,
            Primitive::I16(_) => PrimitiveKind::I16,
            Primitive::U16(_) => PrimitiveKind::U16,
            Primitive::I32(_) => PrimitiveKind::I32,
            Primitive::U32(_) => PrimitiveKind::U32,
            Primitive::I64(_) => PrimitiveKind::I64,
            Primitive::U64(_) => PrimitiveKind::U64,
            Primitive::F32(_) => PrimitiveKind::F32,
            Primitive::F64(_) => PrimitiveKind::F64,
        }
    }

    /// Equality on the exact bit pattern, so NaN payloads compare equal to themselves
    pub fn bit_eq(&self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::F32(a), Primitive::F32(b)) => a.to_bits() == b.to_bits(),
            (Primitive::F64(a), Primitive::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

macro_rules! primitive_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Primitive {
                fn from(value: $ty) -> Self {
                    Primitive::$variant(value)
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Primitive(Primitive::$variant(value))
                }
            }
        )*
    };
}

primitive_from! {
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// Slot address of a field: the type declaring it plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub owner: String,
    pub name: String,
}

impl FieldKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Any value the converter can carry
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Primitive(Primitive),
    Text(String),
    Bytes(Bytes),
    List(Vec<Value>),
    Object(ObjectRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Exact runtime type name, `None` for null
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Value::Null => None,
            Value::Primitive(p) => Some(p.kind().type_name()),
            Value::Text(_) => Some(crate::types::TEXT_TYPE),
            Value::Bytes(_) => Some(crate::types::BYTES_TYPE),
            Value::List(_) => Some(crate::types::LIST_TYPE),
            Value::Object(object) => Some(object.descriptor().name()),
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Value::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Recursive field-by-field equality, tolerant of cycles and shared nodes
    pub fn structurally_eq(&self, other: &Value) -> bool {
        let mut in_progress = HashSet::new();
        structurally_eq_inner(self, other, &mut in_progress)
    }
}

fn structurally_eq_inner(
    left: &Value,
    right: &Value,
    in_progress: &mut HashSet<(usize, usize)>,
) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Primitive(a), Value::Primitive(b)) => a.bit_eq(b),
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| structurally_eq_inner(x, y, in_progress))
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.ptr_eq(b) {
                return true;
            }
            // A pair already being compared further up is assumed equal
            if !in_progress.insert((a.id(), b.id())) {
                return true;
            }
            let equal = a.descriptor().name() == b.descriptor().name() && {
                let left_slots = a.slots();
                let right_slots = b.slots();
                left_slots.len() == right_slots.len()
                    && left_slots.iter().all(|(key, value)| {
                        right_slots
                            .get(key)
                            .is_some_and(|other| structurally_eq_inner(value, other, in_progress))
                    })
            };
            in_progress.remove(&(a.id(), b.id()));
            equal
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Primitive(p) => write!(f, "{:?}", p),
            Value::Text(text) => write!(f, "Text({:?})", text),
            Value::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Object(object) => write!(f, "{:?}", object),
        }
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Value::Primitive(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[derive(Debug)]
struct ObjectCell {
    descriptor: Arc<TypeDescriptor>,
    slots: RwLock<HashMap<FieldKey, Value>>,
}

/// Shared handle to a structured object
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    /// Allocate an instance with every field slot of the whole hierarchy set to null
    ///
    /// No constructor logic runs; callers fill the slots afterwards.
    pub fn uninitialized(descriptor: Arc<TypeDescriptor>) -> Self {
        let slots = descriptor
            .all_field_keys()
            .into_iter()
            .map(|key| (key, Value::Null))
            .collect();
        Self(Arc::new(ObjectCell {
            descriptor,
            slots: RwLock::new(slots),
        }))
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.0.descriptor
    }

    /// Identity of the allocation
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Read a field visible from the object's own type
    pub fn get(&self, name: &str) -> Option<Value> {
        let key = self.0.descriptor.lookup_field(name)?;
        self.get_slot(&key)
    }

    /// Read a field by its declaring type, reaching private ancestor fields
    pub fn get_at(&self, owner: &str, name: &str) -> Option<Value> {
        self.get_slot(&FieldKey::new(owner, name))
    }

    pub fn get_slot(&self, key: &FieldKey) -> Option<Value> {
        self.0.slots.read().get(key).cloned()
    }

    /// Assign a field visible from the object's own type
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let key = self.0.descriptor.lookup_field(name).ok_or_else(|| {
            ConverterError::InvalidArgument(format!(
                "type {} has no visible field {}",
                self.0.descriptor.name(),
                name
            ))
        })?;
        self.set_slot(key, value.into())
    }

    /// Assign a field by its declaring type
    pub fn set_at(&self, owner: &str, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_slot(FieldKey::new(owner, name), value.into())
    }

    pub fn set_slot(&self, key: FieldKey, value: Value) -> Result<()> {
        let mut slots = self.0.slots.write();
        match slots.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ConverterError::InvalidArgument(format!(
                "type {} has no field slot {}",
                self.0.descriptor.name(),
                key
            ))),
        }
    }

    /// Copy of every slot; no lock is held once this returns
    pub fn slots(&self) -> HashMap<FieldKey, Value> {
        self.0.slots.read().clone()
    }
}

impl fmt::Debug for ObjectRef {
    // Identity only, so cyclic graphs format without recursing
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}@{:#x})", self.0.descriptor.name(), self.id())
    }
}

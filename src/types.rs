// SPDX-License-Identifier: MIT
//! Explicit type registry replacing runtime reflection
//!
//! Every structured type is described once: its fully-qualified name, its
//! base type, its own declared fields in declaration order with their
//! visibility, whether the opaque serializer may take it, and any converter
//! functions declared on the type itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ConverterError, Result};
use crate::value::{FieldKey, ObjectRef, PrimitiveKind, Value};

/// Type name of [`Value::Text`]
pub const TEXT_TYPE: &str = "string";
/// Type name of [`Value::Bytes`]
pub const BYTES_TYPE: &str = "bytes";
/// Type name of [`Value::List`]
pub const LIST_TYPE: &str = "list";

/// Converts a value into payload bytes
pub type EncodeFn = Arc<dyn Fn(&Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync>;

/// Rebuilds a value from payload bytes
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Encoder declared on a type; the receiver is the instance for instance methods
pub type MethodEncodeFn =
    Arc<dyn Fn(Option<&Value>, &Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync>;

/// Decoder declared on a type; the receiver is a fresh uninitialized instance
pub type MethodDecodeFn =
    Arc<dyn Fn(Option<&Value>, &[u8]) -> std::result::Result<Value, BoxError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub visibility: Visibility,
}

/// Whether a type-declared converter method receives the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodReceiver {
    Instance,
    Static,
}

/// A converter method declared on a type, with its identity
#[derive(Clone)]
pub struct TypeMethod<F> {
    pub name: String,
    pub receiver: MethodReceiver,
    pub func: F,
}

impl<F> fmt::Debug for TypeMethod<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMethod")
            .field("name", &self.name)
            .field("receiver", &self.receiver)
            .finish()
    }
}

impl TypeMethod<MethodEncodeFn> {
    pub fn encoder<F>(name: impl Into<String>, receiver: MethodReceiver, func: F) -> Self
    where
        F: Fn(Option<&Value>, &Value) -> std::result::Result<Vec<u8>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            receiver,
            func: Arc::new(func),
        }
    }
}

impl TypeMethod<MethodDecodeFn> {
    pub fn decoder<F>(name: impl Into<String>, receiver: MethodReceiver, func: F) -> Self
    where
        F: Fn(Option<&Value>, &[u8]) -> std::result::Result<Value, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            receiver,
            func: Arc::new(func),
        }
    }
}

/// Description of one structured type
pub struct TypeDescriptor {
    name: String,
    base: Option<Arc<TypeDescriptor>>,
    fields: Vec<FieldDescriptor>,
    serializable: bool,
    method_encoder: Option<TypeMethod<MethodEncodeFn>>,
    method_decoder: Option<TypeMethod<MethodDecodeFn>>,
    global_encoder: Option<EncodeFn>,
    global_decoder: Option<DecodeFn>,
}

impl TypeDescriptor {
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            serializable: false,
            method_encoder: None,
            method_decoder: None,
            global_encoder: None,
            global_decoder: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<TypeDescriptor>> {
        self.base.as_ref()
    }

    /// Own declared fields in declaration order
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    pub fn method_encoder(&self) -> Option<&TypeMethod<MethodEncodeFn>> {
        self.method_encoder.as_ref()
    }

    pub fn method_decoder(&self) -> Option<&TypeMethod<MethodDecodeFn>> {
        self.method_decoder.as_ref()
    }

    pub fn global_encoder(&self) -> Option<&EncodeFn> {
        self.global_encoder.as_ref()
    }

    pub fn global_decoder(&self) -> Option<&DecodeFn> {
        self.global_decoder.as_ref()
    }

    /// This type followed by each ancestor up to the root
    pub fn hierarchy(&self) -> impl Iterator<Item = &TypeDescriptor> {
        std::iter::successors(Some(self), |t| t.base.as_deref())
    }

    /// Fields addressed when encoding at hierarchy `level` (0 = the object's own type)
    ///
    /// Level 0 sees every own field plus inherited non-private fields not
    /// hidden by a same-named field closer to the type. Ancestor levels only
    /// contribute their private fields.
    pub fn level_fields(&self, level: usize) -> Vec<FieldKey> {
        if level == 0 {
            return self.visible_fields();
        }
        match self.hierarchy().nth(level) {
            Some(ancestor) => ancestor
                .fields
                .iter()
                .filter(|f| f.visibility == Visibility::Private)
                .map(|f| FieldKey::new(ancestor.name.as_str(), f.name.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    fn visible_fields(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self
            .fields
            .iter()
            .map(|f| FieldKey::new(self.name.as_str(), f.name.as_str()))
            .collect();

        for ancestor in self.hierarchy().skip(1) {
            for field in &ancestor.fields {
                if field.visibility != Visibility::Private
                    && !keys.iter().any(|k| k.name == field.name)
                {
                    keys.push(FieldKey::new(ancestor.name.as_str(), field.name.as_str()));
                }
            }
        }
        keys
    }

    /// Resolve a field name as seen from this type (own fields first, then inherited non-private)
    pub fn lookup_field(&self, name: &str) -> Option<FieldKey> {
        if self.fields.iter().any(|f| f.name == name) {
            return Some(FieldKey::new(self.name.as_str(), name));
        }
        self.hierarchy().skip(1).find_map(|ancestor| {
            ancestor
                .fields
                .iter()
                .find(|f| f.name == name && f.visibility != Visibility::Private)
                .map(|_| FieldKey::new(ancestor.name.as_str(), name))
        })
    }

    /// Every slot an instance carries across the whole hierarchy
    pub fn all_field_keys(&self) -> Vec<FieldKey> {
        self.hierarchy()
            .flat_map(|t| {
                t.fields
                    .iter()
                    .map(move |f| FieldKey::new(t.name.as_str(), f.name.as_str()))
            })
            .collect()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("fields", &self.fields)
            .field("serializable", &self.serializable)
            .finish()
    }
}

/// Fluent description of a type, turned into a [`TypeDescriptor`] by [`TypeRegistry::register`]
pub struct TypeBuilder {
    name: String,
    base: Option<String>,
    fields: Vec<FieldDescriptor>,
    serializable: bool,
    method_encoder: Option<TypeMethod<MethodEncodeFn>>,
    method_decoder: Option<TypeMethod<MethodDecodeFn>>,
    global_encoder: Option<EncodeFn>,
    global_decoder: Option<DecodeFn>,
}

impl TypeBuilder {
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, visibility: Visibility) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            visibility,
        });
        self
    }

    /// Mark the type as handled by the opaque serializer
    pub fn serializable(mut self) -> Self {
        self.serializable = true;
        self
    }

    pub fn type_encoder(mut self, method: TypeMethod<MethodEncodeFn>) -> Self {
        self.method_encoder = Some(method);
        self
    }

    pub fn type_decoder(mut self, method: TypeMethod<MethodDecodeFn>) -> Self {
        self.method_decoder = Some(method);
        self
    }

    pub fn global_encoder<F>(mut self, func: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.global_encoder = Some(Arc::new(func));
        self
    }

    pub fn global_decoder<F>(mut self, func: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.global_decoder = Some(Arc::new(func));
        self
    }
}

/// Resolved runtime type of a value
#[derive(Debug, Clone)]
pub enum TypeHandle {
    Primitive(PrimitiveKind),
    Text,
    Bytes,
    List,
    Object(Arc<TypeDescriptor>),
}

impl TypeHandle {
    pub fn name(&self) -> &str {
        match self {
            TypeHandle::Primitive(kind) => kind.type_name(),
            TypeHandle::Text => TEXT_TYPE,
            TypeHandle::Bytes => BYTES_TYPE,
            TypeHandle::List => LIST_TYPE,
            TypeHandle::Object(descriptor) => descriptor.name(),
        }
    }

    /// Runtime type of a value, `None` for null
    pub fn of(value: &Value) -> Option<TypeHandle> {
        Some(match value {
            Value::Null => return None,
            Value::Primitive(p) => TypeHandle::Primitive(p.kind()),
            Value::Text(_) => TypeHandle::Text,
            Value::Bytes(_) => TypeHandle::Bytes,
            Value::List(_) => TypeHandle::List,
            Value::Object(object) => TypeHandle::Object(object.descriptor().clone()),
        })
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeHandle::Primitive(_))
    }

    /// Whether the opaque serializer may take values of this type
    pub fn is_serializable(&self) -> bool {
        match self {
            TypeHandle::Primitive(_) => false,
            TypeHandle::Text | TypeHandle::Bytes | TypeHandle::List => true,
            TypeHandle::Object(descriptor) => descriptor.is_serializable(),
        }
    }

    /// Zero instance of the type, built without any constructor logic
    pub fn uninitialized(&self) -> Value {
        match self {
            TypeHandle::Primitive(kind) => Value::Primitive(kind.zero()),
            TypeHandle::Text => Value::Text(String::new()),
            TypeHandle::Bytes => Value::Bytes(bytes::Bytes::new()),
            TypeHandle::List => Value::List(Vec::new()),
            TypeHandle::Object(descriptor) => {
                Value::Object(ObjectRef::uninitialized(descriptor.clone()))
            }
        }
    }
}

fn is_builtin_name(name: &str) -> bool {
    PrimitiveKind::from_type_name(name).is_some()
        || name == TEXT_TYPE
        || name == BYTES_TYPE
        || name == LIST_TYPE
}

/// Registry of structured types keyed by fully-qualified name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; its base must already be registered
    pub fn register(&mut self, builder: TypeBuilder) -> Result<Arc<TypeDescriptor>> {
        if builder.name.is_empty() || is_builtin_name(&builder.name) {
            return Err(ConverterError::InvalidArgument(format!(
                "'{}' cannot be used as a type name",
                builder.name
            )));
        }
        if self.types.contains_key(&builder.name) {
            return Err(ConverterError::InvalidArgument(format!(
                "type {} is already registered",
                builder.name
            )));
        }
        for (i, field) in builder.fields.iter().enumerate() {
            if builder.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ConverterError::InvalidArgument(format!(
                    "type {} declares field {} twice",
                    builder.name, field.name
                )));
            }
        }

        let base = match builder.base {
            Some(base_name) => Some(
                self.types
                    .get(&base_name)
                    .cloned()
                    .ok_or(ConverterError::UnknownType(base_name))?,
            ),
            None => None,
        };

        let descriptor = Arc::new(TypeDescriptor {
            name: builder.name,
            base,
            fields: builder.fields,
            serializable: builder.serializable,
            method_encoder: builder.method_encoder,
            method_decoder: builder.method_decoder,
            global_encoder: builder.global_encoder,
            global_decoder: builder.global_decoder,
        });
        tracing::debug!(
            type_name = descriptor.name(),
            fields = descriptor.fields.len(),
            "registered type"
        );
        self.types
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolve a wire type name to a built-in or registered type
    pub fn resolve(&self, name: &str) -> Result<TypeHandle> {
        if let Some(kind) = PrimitiveKind::from_type_name(name) {
            return Ok(TypeHandle::Primitive(kind));
        }
        match name {
            TEXT_TYPE => Ok(TypeHandle::Text),
            BYTES_TYPE => Ok(TypeHandle::Bytes),
            LIST_TYPE => Ok(TypeHandle::List),
            _ => self
                .types
                .get(name)
                .cloned()
                .map(TypeHandle::Object)
                .ok_or_else(|| ConverterError::UnknownType(name.to_string())),
        }
    }

    /// Allocate an uninitialized instance of a registered type
    pub fn instantiate(&self, name: &str) -> Result<ObjectRef> {
        self.types
            .get(name)
            .map(|descriptor| ObjectRef::uninitialized(Arc::clone(descriptor)))
            .ok_or_else(|| ConverterError::UnknownType(name.to_string()))
    }
}

//! Decoded wire values

use std::fmt;

use uuid::Uuid;

use crate::shape::{PrimitiveKind, Shape, StringRepr};

/// VARIANT type tags (MS-OAUT 2.2.7) marshaled by this codec
pub mod vt {
    pub const EMPTY: u16 = 0x0000;
    pub const NULL: u16 = 0x0001;
    pub const I2: u16 = 0x0002;
    pub const I4: u16 = 0x0003;
    pub const R4: u16 = 0x0004;
    pub const R8: u16 = 0x0005;
    pub const BSTR: u16 = 0x0008;
    pub const BOOL: u16 = 0x000B;
    pub const I1: u16 = 0x0010;
    pub const UI1: u16 = 0x0011;
    pub const UI2: u16 = 0x0012;
    pub const UI4: u16 = 0x0013;
    pub const I8: u16 = 0x0014;
    pub const UI8: u16 = 0x0015;
    pub const INT: u16 = 0x0016;
    pub const UINT: u16 = 0x0017;
}

/// A value read from or written to the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// VT_EMPTY, also used for an absent value
    Empty,
    /// VT_NULL
    Null,
    Bool(bool),
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
    Uuid(Uuid),
    /// String together with the representation it travels in
    Str(String, StringRepr),
    Array(Vec<Value>),
    /// Unique pointer; `None` is a null referent
    Pointer(Option<Box<Value>>),
    Struct(Vec<Value>),
    /// VARIANT wrapper around the carried value
    Variant(Box<Value>),
}

/// Coarse type of a [`Value`], used for call signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Matches any value
    Any,
    Empty,
    Null,
    Bool,
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
    Uuid,
    String,
    Array,
    Pointer,
    Struct,
    Variant,
}

impl ValueKind {
    /// Check whether `value` is acceptable where this kind is expected
    pub fn accepts(&self, value: &Value) -> bool {
        *self == ValueKind::Any || *self == value.kind()
    }
}

impl From<PrimitiveKind> for ValueKind {
    fn from(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Bool => ValueKind::Bool,
            PrimitiveKind::I8 => ValueKind::I8,
            PrimitiveKind::U8 => ValueKind::U8,
            PrimitiveKind::I16 => ValueKind::I16,
            PrimitiveKind::U16 => ValueKind::U16,
            PrimitiveKind::I32 => ValueKind::I32,
            PrimitiveKind::U32 => ValueKind::U32,
            PrimitiveKind::I64 => ValueKind::I64,
            PrimitiveKind::U64 => ValueKind::U64,
            PrimitiveKind::F32 => ValueKind::F32,
            PrimitiveKind::F64 => ValueKind::F64,
        }
    }
}

impl From<&Shape> for ValueKind {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Primitive(kind) => ValueKind::from(*kind),
            Shape::Uuid => ValueKind::Uuid,
            Shape::String(_) => ValueKind::String,
            Shape::Array { .. } => ValueKind::Array,
            Shape::Pointer(_) => ValueKind::Pointer,
            Shape::Struct(_) => ValueKind::Struct,
            Shape::Variant => ValueKind::Variant,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Value {
    /// Wide string value
    pub fn wide(s: impl Into<String>) -> Self {
        Value::Str(s.into(), StringRepr::Wide)
    }

    /// BSTR value
    pub fn bstr(s: impl Into<String>) -> Self {
        Value::Str(s.into(), StringRepr::Bstr)
    }

    /// VARIANT wrapping `value`
    pub fn variant(value: Value) -> Self {
        Value::Variant(Box::new(value))
    }

    /// Non-null pointer to `value`
    pub fn pointer(value: Value) -> Self {
        Value::Pointer(Some(Box::new(value)))
    }

    /// Null pointer
    pub fn null_pointer() -> Self {
        Value::Pointer(None)
    }

    /// Coarse type of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Empty => ValueKind::Empty,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::U8(_) => ValueKind::U8,
            Value::I16(_) => ValueKind::I16,
            Value::U16(_) => ValueKind::U16,
            Value::I32(_) => ValueKind::I32,
            Value::U32(_) => ValueKind::U32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Str(..) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Pointer(_) => ValueKind::Pointer,
            Value::Struct(_) => ValueKind::Struct,
            Value::Variant(_) => ValueKind::Variant,
        }
    }

    /// Strip a VARIANT wrapper, returning the carried value
    pub fn into_inner(self) -> Value {
        match self {
            Value::Variant(inner) => *inner,
            other => other,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s, _) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Referent of a pointer value (`None` for null or non-pointers)
    pub fn referent(&self) -> Option<&Value> {
        match self {
            Value::Pointer(Some(inner)) => Some(inner),
            _ => None,
        }
    }

    /// VARIANT type tag this value is marshaled under, if any
    pub fn variant_type(&self) -> Option<u16> {
        let tag = match self {
            Value::Empty => vt::EMPTY,
            Value::Null => vt::NULL,
            Value::Bool(_) => vt::BOOL,
            Value::I8(_) => vt::I1,
            Value::U8(_) => vt::UI1,
            Value::I16(_) => vt::I2,
            Value::U16(_) => vt::UI2,
            Value::I32(_) => vt::I4,
            Value::U32(_) => vt::UI4,
            Value::I64(_) => vt::I8,
            Value::U64(_) => vt::UI8,
            Value::F32(_) => vt::R4,
            Value::F64(_) => vt::R8,
            Value::Str(..) => vt::BSTR,
            _ => return None,
        };
        Some(tag)
    }

    /// Default wire shape for a value that has no declared layout
    ///
    /// Arrays become conformant arrays shaped after their first element,
    /// pointers become unique pointers.
    pub fn infer_shape(&self) -> Shape {
        match self {
            Value::Empty | Value::Null | Value::Variant(_) => Shape::Variant,
            Value::Bool(_) => Shape::BOOL,
            Value::I8(_) => Shape::I8,
            Value::U8(_) => Shape::U8,
            Value::I16(_) => Shape::I16,
            Value::U16(_) => Shape::U16,
            Value::I32(_) => Shape::I32,
            Value::U32(_) => Shape::U32,
            Value::I64(_) => Shape::I64,
            Value::U64(_) => Shape::U64,
            Value::F32(_) => Shape::F32,
            Value::F64(_) => Shape::F64,
            Value::Uuid(_) => Shape::Uuid,
            Value::Str(_, repr) => Shape::String(*repr),
            Value::Array(elements) => {
                let element = elements
                    .first()
                    .map(Value::infer_shape)
                    .unwrap_or(Shape::Variant);
                Shape::conformant_array(element)
            }
            Value::Pointer(referent) => {
                let inner = referent
                    .as_deref()
                    .map(Value::infer_shape)
                    .unwrap_or(Shape::Variant);
                Shape::pointer(inner)
            }
            Value::Struct(members) => Shape::Struct(members.iter().map(Value::infer_shape).collect()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

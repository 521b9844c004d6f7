//! Wire shapes
//!
//! A [`Shape`] describes how one parameter is laid out on the wire. The
//! cursor and the writer both walk a shape; the value model itself carries no
//! layout information beyond what [`Value::infer_shape`](crate::Value::infer_shape)
//! can recover.

/// Fixed-width NDR primitives
///
/// | MIDL Type      | Kind | Size | Alignment |
/// |----------------|------|------|-----------|
/// | boolean        | Bool | 1    | 1         |
/// | small          | I8   | 1    | 1         |
/// | byte           | U8   | 1    | 1         |
/// | short          | I16  | 2    | 2         |
/// | unsigned short | U16  | 2    | 2         |
/// | long           | I32  | 4    | 4         |
/// | unsigned long  | U32  | 4    | 4         |
/// | hyper          | I64  | 8    | 8         |
/// | unsigned hyper | U64  | 8    | 8         |
/// | float          | F32  | 4    | 4         |
/// | double         | F64  | 8    | 8         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
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
}

impl PrimitiveKind {
    /// Encoded size in bytes (also the natural alignment)
    pub fn size(&self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }
}

/// String representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringRepr {
    /// LPSTR: conformant varying array of 8-bit chars, null terminated
    Narrow,
    /// LPWSTR: conformant varying array of UTF-16 code units, null terminated
    Wide,
    /// BSTR: FLAGGED_WORD_BLOB (byte length + UTF-16 data, no terminator)
    Bstr,
}

/// Layout of one value on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Fixed-width primitive
    Primitive(PrimitiveKind),
    /// 16-byte GUID
    Uuid,
    /// String with an explicit representation
    String(StringRepr),
    /// Array of `element`
    ///
    /// A conformant array transmits its element count ahead of the
    /// elements; otherwise `len` must be given. When both are present the
    /// wire count must equal `len`.
    Array {
        element: Box<Shape>,
        len: Option<usize>,
        conformant: bool,
    },
    /// Unique (nullable) pointer to another shape
    Pointer(Box<Shape>),
    /// Structure of members laid out in order
    Struct(Vec<Shape>),
    /// Self-describing VARIANT
    Variant,
}

impl Shape {
    pub const BOOL: Shape = Shape::Primitive(PrimitiveKind::Bool);
    pub const I8: Shape = Shape::Primitive(PrimitiveKind::I8);
    pub const U8: Shape = Shape::Primitive(PrimitiveKind::U8);
    pub const I16: Shape = Shape::Primitive(PrimitiveKind::I16);
    pub const U16: Shape = Shape::Primitive(PrimitiveKind::U16);
    pub const I32: Shape = Shape::Primitive(PrimitiveKind::I32);
    pub const U32: Shape = Shape::Primitive(PrimitiveKind::U32);
    pub const I64: Shape = Shape::Primitive(PrimitiveKind::I64);
    pub const U64: Shape = Shape::Primitive(PrimitiveKind::U64);
    pub const F32: Shape = Shape::Primitive(PrimitiveKind::F32);
    pub const F64: Shape = Shape::Primitive(PrimitiveKind::F64);

    /// Conformant array of `element`
    pub fn conformant_array(element: Shape) -> Self {
        Shape::Array {
            element: Box::new(element),
            len: None,
            conformant: true,
        }
    }

    /// Fixed-length array of `element`
    pub fn fixed_array(element: Shape, len: usize) -> Self {
        Shape::Array {
            element: Box::new(element),
            len: Some(len),
            conformant: false,
        }
    }

    /// Unique pointer to `referent`
    pub fn pointer(referent: Shape) -> Self {
        Shape::Pointer(Box::new(referent))
    }

    /// NDR alignment of the first byte of this shape
    pub fn alignment(&self) -> usize {
        match self {
            Shape::Primitive(kind) => kind.size(),
            Shape::Uuid | Shape::String(_) | Shape::Pointer(_) => 4,
            Shape::Array {
                element,
                conformant,
                ..
            } => {
                if *conformant {
                    element.alignment().max(4)
                } else {
                    element.alignment()
                }
            }
            Shape::Struct(members) => members.iter().map(Shape::alignment).max().unwrap_or(1),
            Shape::Variant => 8,
        }
    }
}

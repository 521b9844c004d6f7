//! NDR writer
//!
//! Mirror of [`NdrCursor`](crate::NdrCursor): walks a shape alongside a value
//! and produces the same layout the cursor reads back.

use bytes::{BufMut, Bytes, BytesMut};

use crate::align_padding;
use crate::error::{NdrError, Result};
use crate::flags::Flags;
use crate::shape::{PrimitiveKind, Shape, StringRepr};
use crate::value::{Value, ValueKind};

/// First referent id handed out for non-null pointers
const FIRST_REFERENT_ID: u32 = 0x0002_0000;

/// NDR encoder producing a stub buffer
#[derive(Debug)]
pub struct NdrWriter {
    buf: BytesMut,
    little_endian: bool,
    next_referent: u32,
}

impl NdrWriter {
    /// Create a little-endian writer
    pub fn new() -> Self {
        Self::with_byte_order(true)
    }

    /// Create a writer with the given byte order
    pub fn with_byte_order(little_endian: bool) -> Self {
        Self {
            buf: BytesMut::new(),
            little_endian,
            next_referent: FIRST_REFERENT_ID,
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Finish and return the encoded stub
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Write `value` using its inferred shape
    pub fn write_inferred(&mut self, value: &Value) -> Result<()> {
        let shape = value.infer_shape();
        self.write(value, &shape, Flags::NULL)
    }

    /// Write `value` laid out as `shape`
    pub fn write(&mut self, value: &Value, shape: &Shape, flags: Flags) -> Result<()> {
        match (shape, value) {
            (Shape::Primitive(kind), v) => self.write_primitive(*kind, v),
            (Shape::Uuid, Value::Uuid(uuid)) => {
                self.pad(4);
                let (d1, d2, d3, d4) = uuid.as_fields();
                self.put_u32(d1);
                self.put_u16(d2);
                self.put_u16(d3);
                self.buf.put_slice(d4);
                Ok(())
            }
            (Shape::String(repr), Value::Str(s, _)) => {
                self.write_string(*repr, s);
                Ok(())
            }
            (
                Shape::Array {
                    element,
                    len,
                    conformant,
                },
                Value::Array(elements),
            ) => {
                if let Some(expected) = len {
                    if *expected != elements.len() {
                        return Err(NdrError::ArraySizeMismatch {
                            expected: *expected,
                            got: elements.len(),
                        });
                    }
                }
                if *conformant {
                    self.pad(4);
                    self.put_u32(elements.len() as u32);
                } else if len.is_none() {
                    return Err(NdrError::InvalidShape("fixed array without a length".to_string()));
                }
                for elem in elements {
                    self.write(elem, element, flags)?;
                }
                Ok(())
            }
            (Shape::Pointer(referent), Value::Pointer(target)) => {
                self.pad(4);
                match target {
                    None => {
                        self.put_u32(0);
                        Ok(())
                    }
                    Some(inner) => {
                        let id = self.referent_id();
                        self.put_u32(id);
                        self.write(inner, referent, flags)
                    }
                }
            }
            (Shape::Struct(members), Value::Struct(values)) => self.write_struct(members, values, flags),
            (Shape::Variant, Value::Variant(inner)) => self.write_variant(inner),
            (Shape::Variant, v) => self.write_variant(v),
            (shape, v) => Err(mismatch(ValueKind::from(shape), v)),
        }
    }

    fn write_primitive(&mut self, kind: PrimitiveKind, value: &Value) -> Result<()> {
        self.pad(kind.size());
        match (kind, value) {
            (PrimitiveKind::Bool, Value::Bool(v)) => self.buf.put_u8(*v as u8),
            (PrimitiveKind::I8, Value::I8(v)) => self.buf.put_i8(*v),
            (PrimitiveKind::U8, Value::U8(v)) => self.buf.put_u8(*v),
            (PrimitiveKind::I16, Value::I16(v)) => self.put_u16(*v as u16),
            (PrimitiveKind::U16, Value::U16(v)) => self.put_u16(*v),
            (PrimitiveKind::I32, Value::I32(v)) => self.put_u32(*v as u32),
            (PrimitiveKind::U32, Value::U32(v)) => self.put_u32(*v),
            (PrimitiveKind::I64, Value::I64(v)) => self.put_u64(*v as u64),
            (PrimitiveKind::U64, Value::U64(v)) => self.put_u64(*v),
            (PrimitiveKind::F32, Value::F32(v)) => self.put_u32(v.to_bits()),
            (PrimitiveKind::F64, Value::F64(v)) => self.put_u64(v.to_bits()),
            (kind, v) => return Err(mismatch(ValueKind::from(kind), v)),
        }
        Ok(())
    }

    fn write_string(&mut self, repr: StringRepr, s: &str) {
        match repr {
            StringRepr::Narrow => {
                let count = s.len() as u32 + 1;
                self.pad(4);
                self.put_u32(count);
                self.put_u32(0);
                self.put_u32(count);
                self.buf.put_slice(s.as_bytes());
                self.buf.put_u8(0);
            }
            StringRepr::Wide => {
                let units: Vec<u16> = s.encode_utf16().collect();
                let count = units.len() as u32 + 1;
                self.pad(4);
                self.put_u32(count);
                self.put_u32(0);
                self.put_u32(count);
                for unit in units {
                    self.put_u16(unit);
                }
                self.put_u16(0);
            }
            StringRepr::Bstr => {
                let units: Vec<u16> = s.encode_utf16().collect();
                let count = units.len() as u32;
                self.pad(4);
                self.put_u32(count);
                self.put_u32(count * 2);
                self.put_u32(count);
                for unit in units {
                    self.put_u16(unit);
                }
            }
        }
    }

    fn write_struct(&mut self, members: &[Shape], values: &[Value], flags: Flags) -> Result<()> {
        if members.len() != values.len() {
            return Err(NdrError::ArraySizeMismatch {
                expected: members.len(),
                got: values.len(),
            });
        }
        let alignment = members.iter().map(Shape::alignment).max().unwrap_or(1);
        self.pad(alignment);

        if !flags.contains(Flags::REPRESENTATION_DISPATCH_INVOKE) {
            for (member, value) in members.iter().zip(values) {
                self.write(value, member, flags)?;
            }
            return Ok(());
        }

        let mut deferred = Vec::new();
        for (member, value) in members.iter().zip(values) {
            match (member, value) {
                (Shape::Pointer(referent), Value::Pointer(target)) => {
                    self.pad(4);
                    match target {
                        None => self.put_u32(0),
                        Some(inner) => {
                            let id = self.referent_id();
                            self.put_u32(id);
                            deferred.push((referent.as_ref(), inner.as_ref()));
                        }
                    }
                }
                (Shape::Pointer(_), v) => return Err(mismatch(ValueKind::Pointer, v)),
                (other, v) => self.write(v, other, flags)?,
            }
        }
        for (referent, inner) in deferred {
            self.write(inner, referent, flags)?;
        }
        Ok(())
    }

    fn write_variant(&mut self, value: &Value) -> Result<()> {
        let tag = value.variant_type().ok_or_else(|| NdrError::TypeMismatch {
            expected: "VARIANT-compatible value".to_string(),
            got: value.kind().to_string(),
        })?;

        self.pad(8);
        let start = self.buf.len();
        self.put_u32(0); // clSize, patched below
        self.put_u32(0);
        self.put_u16(tag);
        self.put_u16(0);
        self.put_u16(0);
        self.put_u16(0);
        self.put_u32(tag as u32);

        match value {
            Value::Empty | Value::Null => {}
            Value::Bool(b) => {
                self.pad(2);
                self.put_u16(if *b { 0xFFFF } else { 0 });
            }
            Value::Str(s, _) => {
                self.pad(4);
                let id = self.referent_id();
                self.put_u32(id);
                self.write_string(StringRepr::Bstr, s);
            }
            other => {
                let shape = other.infer_shape();
                self.write(other, &shape, Flags::NULL)?;
            }
        }

        let units = ((self.buf.len() - start) + 7) / 8;
        let size = if self.little_endian {
            (units as u32).to_le_bytes()
        } else {
            (units as u32).to_be_bytes()
        };
        self.buf[start..start + 4].copy_from_slice(&size);
        Ok(())
    }

    fn referent_id(&mut self) -> u32 {
        let id = self.next_referent;
        self.next_referent = self.next_referent.wrapping_add(4);
        id
    }

    fn pad(&mut self, alignment: usize) {
        let padding = align_padding(self.buf.len(), alignment);
        self.buf.put_bytes(0, padding);
    }

    fn put_u16(&mut self, v: u16) {
        if self.little_endian {
            self.buf.put_u16_le(v);
        } else {
            self.buf.put_u16(v);
        }
    }

    fn put_u32(&mut self, v: u32) {
        if self.little_endian {
            self.buf.put_u32_le(v);
        } else {
            self.buf.put_u32(v);
        }
    }

    fn put_u64(&mut self, v: u64) {
        if self.little_endian {
            self.buf.put_u64_le(v);
        } else {
            self.buf.put_u64(v);
        }
    }
}

impl Default for NdrWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatch(expected: ValueKind, got: &Value) -> NdrError {
    NdrError::TypeMismatch {
        expected: expected.to_string(),
        got: got.kind().to_string(),
    }
}

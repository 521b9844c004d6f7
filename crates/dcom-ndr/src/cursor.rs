//! Decoding cursor
//!
//! [`DecodingCursor`] is the read side of the codec as the dispatcher sees
//! it: one method per kind of shape, each taking the representation flags and
//! the session the call arrived on. [`NdrCursor`] implements it over a
//! `Bytes` stub buffer with NDR natural alignment.
//!
//! # Layout rules
//!
//! - Primitives align to their size, relative to the start of the stub
//! - Conformant arrays and strings carry a `u32` max_count ahead of the data
//! - Unique pointers are a `u32` referent id (0 = null); the referent follows
//!   inline, except inside a structure read with
//!   [`Flags::REPRESENTATION_DISPATCH_INVOKE`], where referents follow the
//!   structure's flat part in member order
//! - VARIANTs align to 8 and use the wireVARIANT header

use bytes::{Buf, Bytes};
use tracing::trace;
use uuid::Uuid;

use crate::error::{NdrError, Result, MAX_NDR_ARRAY_ELEMENTS};
use crate::flags::Flags;
use crate::session::SessionContext;
use crate::shape::{PrimitiveKind, Shape, StringRepr};
use crate::value::{vt, Value};
use crate::align_padding;

/// Read side of the codec
pub trait DecodingCursor {
    /// Read a fixed-width primitive
    fn read_primitive(
        &mut self,
        kind: PrimitiveKind,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value>;

    /// Read a 16-byte GUID
    fn read_uuid(&mut self, flags: Flags, session: Option<&SessionContext>) -> Result<Value>;

    /// Read a string in the given representation
    fn read_string(
        &mut self,
        repr: StringRepr,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value>;

    /// Read an array of `element`
    fn read_array(
        &mut self,
        element: &Shape,
        len: Option<usize>,
        conformant: bool,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value>;

    /// Read a unique pointer to `referent`
    fn read_pointer(
        &mut self,
        referent: &Shape,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value>;

    /// Read a structure
    fn read_struct(
        &mut self,
        members: &[Shape],
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value>;

    /// Read a VARIANT
    fn read_variant(&mut self, flags: Flags, session: Option<&SessionContext>) -> Result<Value>;

    /// Read any shape
    fn read(&mut self, shape: &Shape, flags: Flags, session: Option<&SessionContext>) -> Result<Value> {
        match shape {
            Shape::Primitive(kind) => self.read_primitive(*kind, flags, session),
            Shape::Uuid => self.read_uuid(flags, session),
            Shape::String(repr) => self.read_string(*repr, flags, session),
            Shape::Array {
                element,
                len,
                conformant,
            } => self.read_array(element, *len, *conformant, flags, session),
            Shape::Pointer(referent) => self.read_pointer(referent, flags, session),
            Shape::Struct(members) => self.read_struct(members, flags, session),
            Shape::Variant => self.read_variant(flags, session),
        }
    }
}

/// NDR decoding cursor over a stub buffer
#[derive(Debug, Clone)]
pub struct NdrCursor {
    buf: Bytes,
    position: usize,
    little_endian: bool,
}

impl NdrCursor {
    /// Create a little-endian cursor at the start of `buf`
    pub fn new(buf: Bytes) -> Self {
        Self::with_byte_order(buf, true)
    }

    /// Create a cursor with the given byte order
    pub fn with_byte_order(buf: Bytes, little_endian: bool) -> Self {
        Self {
            buf,
            position: 0,
            little_endian,
        }
    }

    /// Bytes consumed since the start of the stub
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(NdrError::BufferUnderflow {
                needed,
                have: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = align_padding(self.position, alignment);
        self.ensure(padding)?;
        self.buf.advance(padding);
        self.position += padding;
        Ok(())
    }

    fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.position += 1;
        Ok(self.buf.get_u8())
    }

    fn get_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.position += 2;
        Ok(if self.little_endian {
            self.buf.get_u16_le()
        } else {
            self.buf.get_u16()
        })
    }

    fn get_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.position += 4;
        Ok(if self.little_endian {
            self.buf.get_u32_le()
        } else {
            self.buf.get_u32()
        })
    }

    fn get_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        self.position += 8;
        Ok(if self.little_endian {
            self.buf.get_u64_le()
        } else {
            self.buf.get_u64()
        })
    }

    /// Aligned `u32` element count, checked against the allocation limit
    fn get_count(&mut self) -> Result<usize> {
        self.align(4)?;
        let count = self.get_u32()? as usize;
        if count > MAX_NDR_ARRAY_ELEMENTS {
            return Err(NdrError::AllocationLimitExceeded {
                requested: count,
                limit: MAX_NDR_ARRAY_ELEMENTS,
            });
        }
        Ok(count)
    }

    /// max_count / offset / actual_count header of a varying string
    fn get_varying_header(&mut self) -> Result<usize> {
        let max_count = self.get_count()?;
        let offset = self.get_u32()?;
        let actual_count = self.get_u32()? as usize;
        if offset != 0 {
            return Err(NdrError::InvalidString("non-zero offset".to_string()));
        }
        if actual_count > max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count: max_count as u32,
                actual_count: actual_count as u32,
            });
        }
        Ok(actual_count)
    }

    fn get_utf16(&mut self, count: usize) -> Result<Vec<u16>> {
        // count is already bounded by MAX_NDR_ARRAY_ELEMENTS
        self.ensure(count * 2)?;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(self.get_u16()?);
        }
        Ok(units)
    }
}

impl DecodingCursor for NdrCursor {
    fn read_primitive(
        &mut self,
        kind: PrimitiveKind,
        _flags: Flags,
        _session: Option<&SessionContext>,
    ) -> Result<Value> {
        self.align(kind.size())?;
        let value = match kind {
            PrimitiveKind::Bool => Value::Bool(self.get_u8()? != 0),
            PrimitiveKind::I8 => Value::I8(self.get_u8()? as i8),
            PrimitiveKind::U8 => Value::U8(self.get_u8()?),
            PrimitiveKind::I16 => Value::I16(self.get_u16()? as i16),
            PrimitiveKind::U16 => Value::U16(self.get_u16()?),
            PrimitiveKind::I32 => Value::I32(self.get_u32()? as i32),
            PrimitiveKind::U32 => Value::U32(self.get_u32()?),
            PrimitiveKind::I64 => Value::I64(self.get_u64()? as i64),
            PrimitiveKind::U64 => Value::U64(self.get_u64()?),
            PrimitiveKind::F32 => Value::F32(f32::from_bits(self.get_u32()?)),
            PrimitiveKind::F64 => Value::F64(f64::from_bits(self.get_u64()?)),
        };
        Ok(value)
    }

    fn read_uuid(&mut self, _flags: Flags, _session: Option<&SessionContext>) -> Result<Value> {
        self.align(4)?;
        let d1 = self.get_u32()?;
        let d2 = self.get_u16()?;
        let d3 = self.get_u16()?;
        self.ensure(8)?;
        let mut d4 = [0u8; 8];
        self.buf.copy_to_slice(&mut d4);
        self.position += 8;
        Ok(Value::Uuid(Uuid::from_fields(d1, d2, d3, &d4)))
    }

    fn read_string(
        &mut self,
        repr: StringRepr,
        _flags: Flags,
        _session: Option<&SessionContext>,
    ) -> Result<Value> {
        let s = match repr {
            StringRepr::Narrow => {
                let count = self.get_varying_header()?;
                self.ensure(count)?;
                let mut bytes = vec![0u8; count];
                self.buf.copy_to_slice(&mut bytes);
                self.position += count;
                if bytes.last() == Some(&0) {
                    bytes.pop();
                }
                String::from_utf8(bytes)?
            }
            StringRepr::Wide => {
                let count = self.get_varying_header()?;
                let mut units = self.get_utf16(count)?;
                if units.last() == Some(&0) {
                    units.pop();
                }
                char::decode_utf16(units).collect::<std::result::Result<String, _>>()?
            }
            StringRepr::Bstr => {
                // FLAGGED_WORD_BLOB: conformance, clFlags (byte length), clSize, asData
                let max_count = self.get_count()?;
                let _byte_len = self.get_u32()?;
                let count = self.get_u32()? as usize;
                if count > max_count {
                    return Err(NdrError::ConformanceMismatch {
                        max_count: max_count as u32,
                        actual_count: count as u32,
                    });
                }
                let units = self.get_utf16(count)?;
                char::decode_utf16(units).collect::<std::result::Result<String, _>>()?
            }
        };
        Ok(Value::Str(s, repr))
    }

    fn read_array(
        &mut self,
        element: &Shape,
        len: Option<usize>,
        conformant: bool,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value> {
        let count = if conformant {
            let count = self.get_count()?;
            if let Some(expected) = len {
                if expected != count {
                    return Err(NdrError::ArraySizeMismatch { expected, got: count });
                }
            }
            count
        } else {
            len.ok_or_else(|| NdrError::InvalidShape("fixed array without a length".to_string()))?
        };

        // Every element takes at least one byte
        let reserve = count.min(MAX_NDR_ARRAY_ELEMENTS).min(self.remaining());
        let mut elements = Vec::with_capacity(reserve);
        for _ in 0..count {
            elements.push(self.read(element, flags, session)?);
        }
        Ok(Value::Array(elements))
    }

    fn read_pointer(
        &mut self,
        referent: &Shape,
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value> {
        self.align(4)?;
        let referent_id = self.get_u32()?;
        if referent_id == 0 {
            return Ok(Value::null_pointer());
        }
        let value = self.read(referent, flags, session)?;
        Ok(Value::pointer(value))
    }

    fn read_struct(
        &mut self,
        members: &[Shape],
        flags: Flags,
        session: Option<&SessionContext>,
    ) -> Result<Value> {
        let alignment = members.iter().map(Shape::alignment).max().unwrap_or(1);
        self.align(alignment)?;

        if !flags.contains(Flags::REPRESENTATION_DISPATCH_INVOKE) {
            let mut values = Vec::with_capacity(members.len());
            for member in members {
                values.push(self.read(member, flags, session)?);
            }
            return Ok(Value::Struct(values));
        }

        // Flat part first; embedded pointers only contribute their referent ids.
        let mut values = Vec::with_capacity(members.len());
        let mut deferred = Vec::new();
        for (index, member) in members.iter().enumerate() {
            match member {
                Shape::Pointer(referent) => {
                    self.align(4)?;
                    if self.get_u32()? != 0 {
                        deferred.push((index, referent.as_ref()));
                    }
                    values.push(Value::null_pointer());
                }
                other => values.push(self.read(other, flags, session)?),
            }
        }
        for (index, referent) in deferred {
            let value = self.read(referent, flags, session)?;
            values[index] = Value::pointer(value);
        }
        Ok(Value::Struct(values))
    }

    fn read_variant(&mut self, flags: Flags, session: Option<&SessionContext>) -> Result<Value> {
        self.align(8)?;
        let _size = self.get_u32()?;
        let _reserved = self.get_u32()?;
        let tag = self.get_u16()?;
        for _ in 0..3 {
            self.get_u16()?;
        }
        let switch = self.get_u32()?;
        if switch != tag as u32 {
            return Err(NdrError::InvalidDiscriminant { vt: tag, switch });
        }
        trace!("VARIANT vt=0x{:04x} at {}", tag, self.position);

        let inner = match tag {
            vt::EMPTY => Value::Empty,
            vt::NULL => Value::Null,
            vt::BOOL => match self.read_primitive(PrimitiveKind::I16, flags, session)? {
                Value::I16(v) => Value::Bool(v != 0),
                other => other,
            },
            vt::I1 => self.read_primitive(PrimitiveKind::I8, flags, session)?,
            vt::UI1 => self.read_primitive(PrimitiveKind::U8, flags, session)?,
            vt::I2 => self.read_primitive(PrimitiveKind::I16, flags, session)?,
            vt::UI2 => self.read_primitive(PrimitiveKind::U16, flags, session)?,
            vt::I4 | vt::INT => self.read_primitive(PrimitiveKind::I32, flags, session)?,
            vt::UI4 | vt::UINT => self.read_primitive(PrimitiveKind::U32, flags, session)?,
            vt::I8 => self.read_primitive(PrimitiveKind::I64, flags, session)?,
            vt::UI8 => self.read_primitive(PrimitiveKind::U64, flags, session)?,
            vt::R4 => self.read_primitive(PrimitiveKind::F32, flags, session)?,
            vt::R8 => self.read_primitive(PrimitiveKind::F64, flags, session)?,
            vt::BSTR => {
                let blob = Shape::String(StringRepr::Bstr);
                match self.read_pointer(&blob, flags, session)? {
                    Value::Pointer(Some(s)) => *s,
                    _ => Value::bstr(""),
                }
            }
            other => return Err(NdrError::UnsupportedVariant(other)),
        };
        Ok(Value::variant(inner))
    }
}

//! NDR codec for DCOM call stubs
//!
//! This crate provides the decoding cursor the servant dispatcher reads call
//! parameters through, the writer used to marshal results, and the dynamic
//! value model both operate on.
//!
//! # NDR Wire Format
//!
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes), measured
//!   from the start of the stub
//! - Structures align to their largest member
//! - Conformant arrays and strings carry their element count up front
//! - VARIANTs use the wireVARIANT layout from MS-OAUT

mod cursor;
mod error;
mod flags;
mod session;
mod shape;
mod value;
mod writer;

pub use cursor::{DecodingCursor, NdrCursor};
pub use error::{NdrError, Result, MAX_NDR_ARRAY_ELEMENTS};
pub use flags::Flags;
pub use session::SessionContext;
pub use shape::{PrimitiveKind, Shape, StringRepr};
pub use value::{vt, Value, ValueKind};
pub use writer::NdrWriter;

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Padding needed to bring `position` up to `alignment`
#[inline]
pub fn align_padding(position: usize, alignment: usize) -> usize {
    if alignment == 0 || alignment == 1 {
        return 0;
    }
    let remainder = position % alignment;
    if remainder == 0 {
        0
    } else {
        alignment - remainder
    }
}

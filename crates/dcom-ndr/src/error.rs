//! NDR error types

use thiserror::Error;

/// Upper bound on the element count of any conformant array or string.
///
/// The count comes straight off the wire, so it is checked before anything
/// is allocated.
pub const MAX_NDR_ARRAY_ELEMENTS: usize = 1 << 20;

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Buffer underflow - not enough data
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// Invalid string - bad offset, missing terminator or invalid encoding
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Conformance mismatch
    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u32, actual_count: u32 },

    /// Array size mismatch
    #[error("array size mismatch: expected {expected}, got {got}")]
    ArraySizeMismatch { expected: usize, got: usize },

    /// Element count larger than [`MAX_NDR_ARRAY_ELEMENTS`]
    #[error("allocation limit exceeded: requested {requested}, limit {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },

    /// VARIANT type tag this codec does not marshal
    #[error("unsupported VARIANT type: 0x{0:04x}")]
    UnsupportedVariant(u16),

    /// VARIANT union discriminant disagrees with its vt field
    #[error("invalid VARIANT discriminant: vt=0x{vt:04x}, switch=0x{switch:08x}")]
    InvalidDiscriminant { vt: u16, switch: u32 },

    /// Shape that cannot be laid out (for example a non-conformant array without a length)
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Value does not fit the shape it is being encoded as
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// UTF-16 decoding error
    #[error("UTF-16 error: {0}")]
    Utf16Error(#[from] std::char::DecodeUtf16Error),
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;

//! Servant error types

use std::error::Error as StdError;

use dcom_ndr::NdrError;
use thiserror::Error;

use super::identifiers::{Iid, Ipid};

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Boxed cause carried by dispatch and invocation errors
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a single dispatched call
///
/// Every failure raised while servicing a call ends up as exactly one of
/// these variants before it reaches the transport.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// IPID does not resolve to any interface of the servant
    #[error("invalid object reference: IPID {0}")]
    InvalidObjectReference(Ipid),

    /// No method behind the operation number (or no handler for it)
    #[error("procedure number out of range: {0}")]
    ProcedureOutOfRange(String),

    /// Late-bound GetTypeInfo
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Late-bound Invoke with an unknown DISPID
    #[error("member not found: DISPID {0}")]
    MemberNotFound(i32),

    /// Arguments could not be decoded or do not fit the method
    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Method not invokable, or callee not constructible, for lack of permission
    #[error("access denied: {message}")]
    AccessDenied {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Any other failure raised by the invocation
    #[error("unexpected failure: {message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

/// Coarse classification of a [`DispatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidObjectReference,
    ProcedureOutOfRange,
    NotImplemented,
    MemberNotFound,
    InvalidArgument,
    AccessDenied,
    Unexpected,
}

impl ErrorKind {
    /// HRESULT reported to the peer for this kind
    pub fn hresult(&self) -> u32 {
        match self {
            ErrorKind::InvalidObjectReference => hresult::RPC_E_INVALID_OBJECT,
            ErrorKind::ProcedureOutOfRange => hresult::RPC_S_PROCNUM_OUT_OF_RANGE,
            ErrorKind::NotImplemented => hresult::E_NOTIMPL,
            ErrorKind::MemberNotFound => hresult::DISP_E_MEMBERNOTFOUND,
            ErrorKind::InvalidArgument => hresult::E_INVALIDARG,
            ErrorKind::AccessDenied => hresult::E_ACCESSDENIED,
            ErrorKind::Unexpected => hresult::E_UNEXPECTED,
        }
    }
}

impl DispatchError {
    /// Invalid argument without an underlying cause
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DispatchError::InvalidArgument {
            message: message.into(),
            source: None,
        }
    }

    /// Access denied without an underlying cause
    pub fn access_denied(message: impl Into<String>) -> Self {
        DispatchError::AccessDenied {
            message: message.into(),
            source: None,
        }
    }

    /// Unexpected failure without an underlying cause
    pub fn unexpected(message: impl Into<String>) -> Self {
        DispatchError::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    /// Unexpected failure caused by `source`
    pub fn unexpected_with(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        DispatchError::Unexpected {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Map a callee construction failure
    ///
    /// Permission failures stay `AccessDenied`; everything else is `Unexpected`.
    pub fn from_construction(iid: &Iid, error: InvokeError) -> Self {
        let message = format!("cannot construct callee for {}", iid);
        match error {
            InvokeError::AccessDenied(reason) => DispatchError::AccessDenied {
                message,
                source: Some(reason.into()),
            },
            other => DispatchError::Unexpected {
                message,
                source: Some(Box::new(other)),
            },
        }
    }

    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidObjectReference(_) => ErrorKind::InvalidObjectReference,
            DispatchError::ProcedureOutOfRange(_) => ErrorKind::ProcedureOutOfRange,
            DispatchError::NotImplemented(_) => ErrorKind::NotImplemented,
            DispatchError::MemberNotFound(_) => ErrorKind::MemberNotFound,
            DispatchError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            DispatchError::AccessDenied { .. } => ErrorKind::AccessDenied,
            DispatchError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// HRESULT reported to the peer
    pub fn hresult(&self) -> u32 {
        self.kind().hresult()
    }
}

impl From<NdrError> for DispatchError {
    fn from(err: NdrError) -> Self {
        DispatchError::InvalidArgument {
            message: "cannot decode call arguments".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<InvokeError> for DispatchError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::InvalidArgument(message) => DispatchError::invalid_argument(message),
            InvokeError::AccessDenied(message) => DispatchError::access_denied(message),
            InvokeError::Failed(source) => DispatchError::Unexpected {
                message: "method raised an error".to_string(),
                source: Some(source),
            },
        }
    }
}

/// Error returned by a bound method or callee constructor
#[derive(Error, Debug)]
pub enum InvokeError {
    /// Arguments were rejected by the method
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller is not allowed to invoke the method or construct the callee
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The method failed
    #[error(transparent)]
    Failed(Cause),
}

impl InvokeError {
    /// Wrap an arbitrary error as a method failure
    pub fn failed(err: impl Into<Cause>) -> Self {
        InvokeError::Failed(err.into())
    }
}

/// Interface configuration mistakes, reported when a method is registered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two methods registered under the same ordinal
    #[error("ordinal {ordinal} on {iid} already taken by {existing}")]
    DuplicateOrdinal { iid: Iid, ordinal: u32, existing: String },

    /// Two methods resolve to the same DISPID
    #[error("member id {member_id} on {iid} already taken by {existing}")]
    DuplicateMemberId { iid: Iid, member_id: i32, existing: String },

    /// Ordinal with no room for a successor, or too large to serve as a DISPID
    #[error("ordinal {ordinal} on {iid} is out of range")]
    OrdinalOutOfRange { iid: Iid, ordinal: u32 },
}

/// HRESULT codes produced by the dispatcher
pub mod hresult {
    /// Operation successful
    pub const S_OK: u32 = 0x00000000;
    /// IPID does not name a live object
    pub const RPC_E_INVALID_OBJECT: u32 = 0x80010150;
    /// Procedure number out of range
    pub const RPC_S_PROCNUM_OUT_OF_RANGE: u32 = 0x000006D1;
    /// Not implemented
    pub const E_NOTIMPL: u32 = 0x80004001;
    /// Unknown DISPID
    pub const DISP_E_MEMBERNOTFOUND: u32 = 0x80020003;
    /// Unknown name passed to GetIDsOfNames
    pub const DISP_E_UNKNOWNNAME: u32 = 0x80020006;
    /// Invalid argument
    pub const E_INVALIDARG: u32 = 0x80070057;
    /// Access denied
    pub const E_ACCESSDENIED: u32 = 0x80070005;
    /// Catastrophic failure
    pub const E_UNEXPECTED: u32 = 0x8000FFFF;
}

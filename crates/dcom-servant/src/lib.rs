//! Local COM servant registry and call dispatcher
//!
//! This crate exposes local objects as remotely invokable DCOM servants. It
//! resolves an incoming `(IPID, opnum)` pair to a method of the bound object,
//! decodes the call's NDR arguments, invokes it and marshals the reply.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ServantHost         exports, pointer records, stub in/out  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LocalServant        supported IIDs, IID <-> IPID bindings  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Dispatch engine     IUnknown / IDispatch opnum routing     │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  InterfaceDefinition         │  MethodCatalog               │
//! │  (method tables, callee)     │  (ordinal / name / DISPID)   │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                  NDR codec (dcom-ndr crate)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Calling conventions
//!
//! - **Fixed table** (IUnknown-derived): opnum `3 + k` calls ordinal `k`
//! - **Late bound** (IDispatch-derived): opnums 3..=6 are GetTypeInfoCount,
//!   GetTypeInfo, GetIDsOfNames and Invoke; opnum `7 + k` calls ordinal `k`
//!
//! # Modules
//!
//! - [`types`]: identifiers, errors and HRESULTs
//! - [`catalog`]: method descriptors and their parameter layouts
//! - [`interface`]: interface definitions and method tables
//! - [`identity`]: IID <-> IPID bindings
//! - [`servant`]: the servant registry entry
//! - [`dispatch`]: call classification and invocation
//! - [`host`]: hosting glue for byte-level transports

pub mod catalog;
pub mod dispatch;
pub mod host;
pub mod identity;
pub mod interface;
pub mod servant;
pub mod types;

pub use catalog::{MethodCatalog, MethodDescriptor, Param, ParamsDescriptor};
pub use dispatch::{CallClass, EncodedResults};
pub use host::{HostConfig, ServantHost};
pub use identity::IdentityMapper;
pub use interface::{CallingConvention, CalleeKind, InterfaceDefinition, InvokeResult, MethodTable, Reply};
pub use servant::LocalServant;
pub use types::{
    ConfigError, DispatchError, ErrorKind, Iid, InterfacePointer, InvokeError, Ipid, Oid, Result,
    ServantId,
};

/// Re-export of the codec crate
pub use dcom_ndr as ndr;

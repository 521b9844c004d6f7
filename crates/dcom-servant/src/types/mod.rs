//! Core servant types
//!
//! - Identifiers: IID, IPID, OID, servant id
//! - Errors: dispatch, invocation and configuration failures, HRESULTs
//! - Interface pointer records

mod error;
mod identifiers;
mod pointer;

pub use error::*;
pub use identifiers::{Iid, Ipid, Oid, ServantId, IID_IDISPATCH, IID_IREMUNKNOWN};
pub use pointer::InterfacePointer;

//! Exported interface pointer record

use super::identifiers::{Iid, Ipid, Oid};

/// One exported interface pointer (IID, IPID, OID)
///
/// The hosting framework owns these records. A servant only ever holds a
/// `Weak` to the one it was associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePointer {
    iid: Iid,
    ipid: Ipid,
    oid: Option<Oid>,
}

impl InterfacePointer {
    /// Create a new interface pointer record
    pub fn new(iid: impl Into<Iid>, ipid: impl Into<Ipid>, oid: Option<Oid>) -> Self {
        Self {
            iid: iid.into(),
            ipid: ipid.into(),
            oid,
        }
    }

    /// Interface identifier
    pub fn iid(&self) -> &Iid {
        &self.iid
    }

    /// Interface pointer identifier
    pub fn ipid(&self) -> &Ipid {
        &self.ipid
    }

    /// Object identifier, if one was assigned
    pub fn oid(&self) -> Option<Oid> {
        self.oid
    }
}

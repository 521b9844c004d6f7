//! Identity mapper
//!
//! Bidirectional IID <-> IPID map for the exported views of one servant. Both
//! directions live under a single lock, so a reader sees either the old or
//! the new binding of an interface, never half of one.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{Iid, Ipid};

#[derive(Debug, Default)]
struct Bindings {
    by_iid: HashMap<Iid, Ipid>,
    by_ipid: HashMap<Ipid, Iid>,
}

/// IID <-> IPID bindings
#[derive(Debug, Default)]
pub struct IdentityMapper {
    bindings: RwLock<Bindings>,
}

impl IdentityMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `iid` to `ipid`, returning the IPID it replaces
    ///
    /// Any earlier binding of `iid` is retired, as is any earlier use of
    /// `ipid` for a different interface. Other interfaces are untouched.
    pub fn bind(&self, iid: Iid, ipid: Ipid) -> Option<Ipid> {
        let mut bindings = self.bindings.write();

        if let Some(previous_iid) = bindings.by_ipid.get(&ipid).cloned() {
            if previous_iid != iid {
                bindings.by_iid.remove(&previous_iid);
            }
        }

        let retired = bindings
            .by_iid
            .insert(iid.clone(), ipid.clone())
            .filter(|old| *old != ipid);
        if let Some(old) = &retired {
            bindings.by_ipid.remove(old);
        }
        bindings.by_ipid.insert(ipid, iid);
        retired
    }

    /// Interface bound to `ipid`
    pub fn resolve_interface(&self, ipid: &Ipid) -> Option<Iid> {
        self.bindings.read().by_ipid.get(ipid).cloned()
    }

    /// IPID currently bound to `iid`
    pub fn resolve_instance(&self, iid: &Iid) -> Option<Ipid> {
        self.bindings.read().by_iid.get(iid).cloned()
    }

    /// Snapshot of all bindings
    pub fn bindings(&self) -> Vec<(Iid, Ipid)> {
        self.bindings
            .read()
            .by_iid
            .iter()
            .map(|(iid, ipid)| (iid.clone(), ipid.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().by_iid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().by_iid.is_empty()
    }
}

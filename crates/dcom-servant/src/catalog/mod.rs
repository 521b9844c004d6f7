//! Method catalog
//!
//! Per-interface table of method descriptors, indexed by ordinal (fixed-table
//! convention) and by name and DISPID (late-bound convention).

mod params;

use std::collections::{BTreeMap, HashMap};

use crate::types::{ConfigError, Iid};

pub use params::{Param, ParamsDescriptor};
pub(crate) use params::write_results;

/// Description of one callable method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    name: String,
    ordinal: Option<u32>,
    member_id: Option<i32>,
    params: ParamsDescriptor,
}

impl MethodDescriptor {
    /// Describe a method; its ordinal is assigned at registration
    pub fn new(name: impl Into<String>, params: ParamsDescriptor) -> Self {
        Self {
            name: name.into(),
            ordinal: None,
            member_id: None,
            params,
        }
    }

    /// Pin the method to an explicit ordinal
    pub fn at_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// Attach a DISPID
    pub fn with_member_id(mut self, member_id: i32) -> Self {
        self.member_id = Some(member_id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the fixed method table (set once registered)
    pub fn ordinal(&self) -> Option<u32> {
        self.ordinal
    }

    /// DISPID; once registered, falls back to the ordinal when none was attached
    pub fn member_id(&self) -> Option<i32> {
        self.member_id
            .or_else(|| self.ordinal.and_then(|o| i32::try_from(o).ok()))
    }

    pub fn params(&self) -> &ParamsDescriptor {
        &self.params
    }
}

/// Ordered, indexed set of methods of one interface
#[derive(Debug, Clone)]
pub struct MethodCatalog {
    iid: Iid,
    by_ordinal: BTreeMap<u32, MethodDescriptor>,
    by_name: HashMap<String, u32>,
    by_member_id: HashMap<i32, u32>,
    next_ordinal: u32,
}

impl MethodCatalog {
    /// Create an empty catalog for `iid`
    pub fn new(iid: Iid) -> Self {
        Self {
            iid,
            by_ordinal: BTreeMap::new(),
            by_name: HashMap::new(),
            by_member_id: HashMap::new(),
            next_ordinal: 0,
        }
    }

    /// Register a method, returning its ordinal
    ///
    /// Without a pinned ordinal the method takes the slot after the highest
    /// one registered so far. Ordinals and effective DISPIDs must be unique.
    pub fn register(&mut self, mut descriptor: MethodDescriptor) -> Result<u32, ConfigError> {
        let ordinal = descriptor.ordinal.unwrap_or(self.next_ordinal);
        if let Some(existing) = self.by_ordinal.get(&ordinal) {
            return Err(ConfigError::DuplicateOrdinal {
                iid: self.iid.clone(),
                ordinal,
                existing: existing.name.clone(),
            });
        }

        let out_of_range = || ConfigError::OrdinalOutOfRange {
            iid: self.iid.clone(),
            ordinal,
        };
        let next_ordinal = ordinal.checked_add(1).ok_or_else(out_of_range)?;
        let member_id = match descriptor.member_id {
            Some(member_id) => member_id,
            None => i32::try_from(ordinal).map_err(|_| out_of_range())?,
        };
        if let Some(taken) = self.by_member_id.get(&member_id) {
            let existing = self
                .by_ordinal
                .get(taken)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            return Err(ConfigError::DuplicateMemberId {
                iid: self.iid.clone(),
                member_id,
                existing,
            });
        }

        descriptor.ordinal = Some(ordinal);
        descriptor.member_id = Some(member_id);
        // First registration wins name lookups
        self.by_name.entry(descriptor.name.clone()).or_insert(ordinal);
        self.by_member_id.insert(member_id, ordinal);
        self.by_ordinal.insert(ordinal, descriptor);
        self.next_ordinal = self.next_ordinal.max(next_ordinal);
        Ok(ordinal)
    }

    pub fn lookup_by_ordinal(&self, ordinal: u32) -> Option<&MethodDescriptor> {
        self.by_ordinal.get(&ordinal)
    }

    /// Exact, case-sensitive name lookup
    pub fn lookup_by_name(&self, name: &str) -> Option<&MethodDescriptor> {
        self.ordinal_of(name).and_then(|o| self.by_ordinal.get(&o))
    }

    pub fn lookup_by_member_id(&self, member_id: i32) -> Option<&MethodDescriptor> {
        self.by_member_id
            .get(&member_id)
            .and_then(|o| self.by_ordinal.get(o))
    }

    /// Ordinal registered under `name`
    pub fn ordinal_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Descriptors in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.by_ordinal.values()
    }

    pub fn len(&self) -> usize {
        self.by_ordinal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ordinal.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcom_ndr::{Flags, Shape};

    fn catalog() -> MethodCatalog {
        MethodCatalog::new(Iid::new("620012E2-69E3-4C3B-8C50-5D6C0A0DE5E1"))
    }

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor::new(name, ParamsDescriptor::new().input(Shape::I32, Flags::NULL))
    }

    #[test]
    fn test_registration_order_defines_ordinals() {
        let mut c = catalog();
        assert_eq!(c.register(method("Read")).unwrap(), 0);
        assert_eq!(c.register(method("Write")).unwrap(), 1);
        assert_eq!(c.register(method("Close")).unwrap(), 2);

        assert_eq!(c.lookup_by_ordinal(1).unwrap().name(), "Write");
        assert_eq!(c.lookup_by_name("Close").unwrap().ordinal(), Some(2));
        assert!(c.lookup_by_ordinal(3).is_none());
        let names: Vec<_> = c.iter().map(MethodDescriptor::name).collect();
        assert_eq!(names, ["Read", "Write", "Close"]);
    }

    #[test]
    fn test_name_lookup_is_case_sensitive() {
        let mut c = catalog();
        c.register(method("Foo")).unwrap();
        assert!(c.lookup_by_name("Foo").is_some());
        assert!(c.lookup_by_name("foo").is_none());
    }

    #[test]
    fn test_member_id_defaults_to_ordinal() {
        let mut c = catalog();
        c.register(method("A")).unwrap();
        c.register(method("B").with_member_id(100)).unwrap();

        assert_eq!(c.lookup_by_member_id(0).unwrap().name(), "A");
        assert_eq!(c.lookup_by_member_id(100).unwrap().name(), "B");
        assert!(c.lookup_by_member_id(1).is_none());
        assert_eq!(c.lookup_by_name("B").unwrap().member_id(), Some(100));
    }

    #[test]
    fn test_pinned_ordinal() {
        let mut c = catalog();
        assert_eq!(c.register(method("Late").at_ordinal(7)).unwrap(), 7);
        assert_eq!(c.register(method("Next")).unwrap(), 8);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_duplicate_ordinal_rejected() {
        let mut c = catalog();
        c.register(method("A")).unwrap();
        let err = c.register(method("B").at_ordinal(0)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOrdinal { ordinal: 0, ref existing, .. } if existing == "A"));
        assert_eq!(c.len(), 1);
        assert!(c.lookup_by_name("B").is_none());
    }

    #[test]
    fn test_duplicate_member_id_rejected() {
        let mut c = catalog();
        c.register(method("A").with_member_id(5)).unwrap();
        let err = c.register(method("B").with_member_id(5)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMemberId { member_id: 5, .. }));

        // An implicit DISPID collides with an explicit one too
        let err = c.register(method("C").at_ordinal(5)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMemberId { member_id: 5, .. }));
    }

    #[test]
    fn test_ordinal_out_of_range_rejected() {
        let mut c = catalog();
        let err = c.register(method("Last").at_ordinal(u32::MAX)).unwrap_err();
        assert!(matches!(err, ConfigError::OrdinalOutOfRange { ordinal: u32::MAX, .. }));

        // No implicit DISPID above i32::MAX
        let big = i32::MAX as u32 + 1;
        let err = c.register(method("Big").at_ordinal(big)).unwrap_err();
        assert!(matches!(err, ConfigError::OrdinalOutOfRange { ordinal, .. } if ordinal == big));

        // ...but an explicit one is fine
        assert_eq!(c.register(method("Big").at_ordinal(big).with_member_id(9)).unwrap(), big);
        assert_eq!(c.lookup_by_member_id(9).unwrap().ordinal(), Some(big));
        assert!(c.lookup_by_name("Last").is_none());
        assert_eq!(c.len(), 1);
    }
}

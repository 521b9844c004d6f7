//! Servant identifier types
//!
//! - IID: Interface identifier
//! - IPID: Interface Pointer Identifier (one per export)
//! - OID: Object Identifier assigned by the hosting framework
//! - ServantId: process-unique servant token
//!
//! IIDs and IPIDs travel as GUID strings whose case varies between peers.
//! Both are normalized to upper case on construction, so equality and hashing
//! are case-insensitive.

use std::fmt;

use uuid::Uuid;

/// IDispatch interface identifier
pub const IID_IDISPATCH: &str = "00020400-0000-0000-C000-000000000046";

/// IRemUnknown interface identifier
pub const IID_IREMUNKNOWN: &str = "00000131-0000-0000-C000-000000000046";

macro_rules! normalized_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Create from any textual form, normalizing to upper case
            pub fn new(id: impl AsRef<str>) -> Self {
                Self(id.as_ref().trim().to_ascii_uppercase())
            }

            /// Canonical (upper-cased) form
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Parse the identifier as a GUID
            pub fn to_uuid(&self) -> Option<Uuid> {
                Uuid::parse_str(&self.0).ok()
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }

        impl From<&String> for $name {
            fn from(id: &String) -> Self {
                Self::new(id)
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> Self {
                id.clone()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self::new(uuid.hyphenated().to_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

normalized_id!(
    /// Interface identifier
    Iid,
    "IID"
);

normalized_id!(
    /// Interface Pointer Identifier
    ///
    /// Names one exported binding of an interface on a servant.
    Ipid,
    "IPID"
);

impl Iid {
    /// IDispatch
    pub fn idispatch() -> Self {
        Self::new(IID_IDISPATCH)
    }

    /// IRemUnknown
    pub fn iremunknown() -> Self {
        Self::new(IID_IREMUNKNOWN)
    }
}

impl Ipid {
    /// Generate a random IPID
    pub fn generate() -> Self {
        Self::from(Uuid::new_v4())
    }
}

/// Object Identifier (8 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Oid(pub u64);

impl Oid {
    /// Create a new OID
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Generate a random OID
    pub fn generate() -> Self {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        Self(high ^ low)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OID({:016x})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Process-unique servant identifier (random 128-bit token)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServantId(Uuid);

impl ServantId {
    /// Generate a new servant id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for ServantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Servant({})", self.0)
    }
}

impl fmt::Display for ServantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

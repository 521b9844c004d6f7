//! Representation flags
//!
//! Every read and write through the codec carries a bitmask that selects
//! marshaling nuances which the shape alone does not describe.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Representation flag bitmask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u32);

impl Flags {
    /// No special representation
    pub const NULL: Flags = Flags(0);
    /// DISPPARAMS layout: embedded pointer referents follow the flat part of the structure
    pub const REPRESENTATION_DISPATCH_INVOKE: Flags = Flags(0x0000_0100);

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check whether every bit of `other` is set
    pub fn contains(&self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#06x})", self.0)
    }
}

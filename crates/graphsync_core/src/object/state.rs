//! Object lifecycle state and change records.

use super::PropertyValue;
use std::fmt;

/// Lifecycle state of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Not yet persisted. Every persistent property is pending.
    New,
    /// In sync with the last known remote state.
    Clean,
    /// Written since it was last clean.
    Modified,
    /// Marked for removal. Further writes are refused.
    Deleted,
}

impl ObjectState {
    /// Returns true if the object contributes to the next patch.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        !matches!(self, Self::Clean)
    }

    /// Returns true if writes are permitted.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Clean => f.write_str("clean"),
            Self::Modified => f.write_str("modified"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// An uncommitted change to one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// The value written.
    pub new: PropertyValue,
    /// The value the remote side last saw.
    pub old: PropertyValue,
}

impl Delta {
    /// Creates a delta.
    pub fn new(new: PropertyValue, old: PropertyValue) -> Self {
        Self { new, old }
    }
}

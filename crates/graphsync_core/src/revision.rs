//! Local record of submitted patches.

use crate::types::RevisionId;
use chrono::{DateTime, Utc};
use graphsync_codec::Patch;

/// One patch submission, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionEntry {
    /// The submitted patch.
    pub patch: Patch,
    /// When it was submitted.
    pub timestamp: DateTime<Utc>,
    /// The revision tag it was submitted as.
    pub revision: RevisionId,
}

impl RevisionEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(patch: Patch, revision: RevisionId) -> Self {
        Self {
            patch,
            timestamp: Utc::now(),
            revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphsync_codec::Statement;

    #[test]
    fn entries_are_stamped() {
        let before = Utc::now();
        let entry = RevisionEntry::new(
            Patch::posting(vec![Statement::new("p1", "name", "Ada")]),
            RevisionId::new("r1"),
        );
        assert!(entry.timestamp >= before);
        assert_eq!(entry.revision.as_str(), "r1");
        assert_eq!(entry.patch.len(), 1);
    }
}

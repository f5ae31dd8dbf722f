//! Transaction state.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// State of a transaction.
///
/// ```text
/// Open ──commit──▶ Committing ──ok──▶ Committed
///  │  ▲                 │
///  │  └────failed───────┘
///  └──abort──▶ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Requests may be issued.
    Open,
    /// The aggregate patch is with the remote service.
    Committing,
    /// The transaction has been committed.
    Committed,
    /// The transaction has been aborted.
    Aborted,
}

impl TransactionState {
    /// Returns true if the transaction reached a final state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }

    /// Checks that a commit may start from this state.
    pub(crate) fn ensure_committable(self) -> CoreResult<()> {
        match self {
            Self::Open => Ok(()),
            Self::Committing => Err(CoreError::invalid_state("commit already in progress")),
            Self::Committed => Err(CoreError::transaction_inactive(
                "transaction already committed",
            )),
            Self::Aborted => Err(CoreError::transaction_inactive("transaction already aborted")),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Committing => f.write_str("committing"),
            Self::Committed => f.write_str("committed"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_is_committable() {
        assert!(TransactionState::Open.ensure_committable().is_ok());
        assert!(matches!(
            TransactionState::Committing.ensure_committable(),
            Err(CoreError::InvalidState { .. })
        ));
        assert!(matches!(
            TransactionState::Committed.ensure_committable(),
            Err(CoreError::TransactionInactive { .. })
        ));
        assert!(matches!(
            TransactionState::Aborted.ensure_committable(),
            Err(CoreError::TransactionInactive { .. })
        ));
    }

    #[test]
    fn finished_states() {
        assert!(!TransactionState::Open.is_finished());
        assert!(!TransactionState::Committing.is_finished());
        assert!(TransactionState::Committed.is_finished());
        assert!(TransactionState::Aborted.is_finished());
    }
}

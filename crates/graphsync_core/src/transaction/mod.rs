//! Transactions over one or more object stores.
//!
//! A transaction commits on its own once none of its stores has an
//! outstanding request. Rollback restores every tracked object to the
//! values it had when the transaction started.

mod handle;
mod state;

pub use handle::Transaction;
pub use state::TransactionState;

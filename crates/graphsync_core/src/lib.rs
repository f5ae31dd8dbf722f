//! # graphsync core
//!
//! Transactional object-graph replication engine.
//!
//! This crate provides:
//! - [`ManagedObject`]: a tracked entity with a `New`/`Clean`/`Modified`/`Deleted` lifecycle
//! - [`ObjectStore`]: a named registry that queues requests and accumulates patches
//! - [`Transaction`]: commit-on-quiescence over one or more stores, with rollback
//! - [`Database`]: the session that owns the stores and talks to the remote graph
//!
//! Requests are resolved cooperatively: each [`ObjectStore::process_next`]
//! resolves one request, and [`Transaction::run`] drives every store in
//! scope until nothing is outstanding, at which point the transaction
//! commits on its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod object;
mod request;
mod revision;
mod store;
mod transaction;
mod types;

pub use config::{Config, UnknownPropertyPolicy};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use object::{Delta, ManagedObject, ObjectState, PropertyValue};
pub use request::{
    ErrorCallback, Key, Request, RequestKind, RequestResult, RequestState, SuccessCallback,
};
pub use revision::RevisionEntry;
pub use store::ObjectStore;
pub use transaction::{Transaction, TransactionState};
pub use types::{ObjectId, RevisionId, TransactionId, TransactionMode};

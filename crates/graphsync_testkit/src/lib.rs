//! # graphsync testkit
//!
//! Test utilities for graphsync.
//!
//! This crate provides:
//! - Session fixtures over a recording [`MockTransport`](graphsync_transport::MockTransport)
//! - [`GraphServer`]: an in-memory graph service reachable through the
//!   loopback HTTP transport
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use graphsync_testkit::prelude::*;
//! use graphsync_core::TransactionMode;
//!
//! let session = loopback_session();
//! let people = session.db.create_object_store("people").unwrap();
//! let txn = session.db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
//! let ada = scenarios::person("p1", "Ada");
//! people.attach(&ada).unwrap();
//! people.put(&ada).unwrap();
//! txn.run().unwrap();
//!
//! assert_eq!(session.server.statements().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;

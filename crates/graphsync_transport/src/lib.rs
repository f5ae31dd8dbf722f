//! # graphsync transport
//!
//! Transport seam between the replication engine and the remote graph service.
//!
//! This crate provides:
//! - [`Transport`]: get / head / put / post / patch / describe
//! - [`Response`] with case-insensitive header lookup (`ETag`, `Content-Type`)
//! - [`RequestOptions`] carrying revision tags, routing and credentials
//! - [`Credentials`] folded into a Basic `Authorization` header
//! - [`HttpTransport`] over a pluggable [`HttpClient`], plus a loopback client
//! - [`MockTransport`] for tests
//!
//! ## Revision protocol
//!
//! Commits send the transaction's revision id as `ETag` and optionally the
//! parent revision as `If-Match`. The response `ETag`, if present, names the
//! new revision. `Content-Disposition: replicate=<name>` names the
//! replication route.
//!
//! Retry and backoff are left to callers; [`TransportError::is_retryable`]
//! only classifies failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod http;
mod message;
mod transport;

pub use auth::Credentials;
pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use http::{HttpClient, HttpRequest, HttpTransport, LoopbackClient, LoopbackServer};
pub use message::{Method, RequestOptions, Response};
pub use transport::{MockTransport, RecordedCall, Transport};

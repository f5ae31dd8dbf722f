//! # graphsync codec
//!
//! Wire model and codec seam for graphsync.
//!
//! This crate provides:
//! - [`Term`]: the value position of a statement (literals and node references)
//! - [`Statement`] and [`Patch`]: the stable `post`/`put`/`delete` patch shape
//! - [`Graph`] and [`Prototype`]: decoded documents and query-by-example keys
//! - [`Codec`]: the collaborator trait, with JSON and CBOR implementations
//!
//! ## Wire shape
//!
//! ```
//! use graphsync_codec::{Codec, JsonCodec, Patch, Statement};
//!
//! let patch = Patch::posting(vec![Statement::new("p1", "name", "Ada")]);
//! let bytes = JsonCodec.encode_patch(&patch).unwrap();
//! assert_eq!(bytes, br#"{"post":[["p1","name","Ada"]]}"#);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod graph;
mod patch;
mod term;

pub use codec::{media_type, CborCodec, Codec, JsonCodec, CBOR_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use error::{CodecError, CodecResult};
pub use graph::{DeltaMap, Graph, Prototype};
pub use patch::{Patch, Statement};
pub use term::{NodeRef, Term};

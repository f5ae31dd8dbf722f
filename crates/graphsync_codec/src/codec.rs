//! The codec seam between in-memory values and wire documents.

use crate::error::{CodecError, CodecResult};
use crate::graph::{DeltaMap, Graph, Prototype};
use crate::patch::Patch;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Media type handled by [`JsonCodec`].
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Media type handled by [`CborCodec`].
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

/// Translates between wire documents and the statement model.
///
/// The replication engine treats implementations as black boxes that
/// accept and return `(subject, property, value)` statements.
pub trait Codec: Send + Sync {
    /// The media type this codec produces.
    fn content_type(&self) -> &'static str;

    /// Returns true if documents of `content_type` can be decoded.
    fn accepts(&self, content_type: &str) -> bool {
        media_type(content_type) == self.content_type()
    }

    /// Decodes a graph document.
    fn decode(&self, document: &[u8], content_type: &str) -> CodecResult<Graph>;

    /// Encodes a whole graph document.
    fn encode_graph(&self, graph: &Graph) -> CodecResult<Vec<u8>>;

    /// Encodes a patch for submission.
    fn encode_patch(&self, patch: &Patch) -> CodecResult<Vec<u8>>;

    /// Decodes a patch document.
    fn decode_patch(&self, document: &[u8]) -> CodecResult<Patch>;

    /// Encodes a prototype as a describe query body.
    fn encode_prototype(&self, prototype: &Prototype) -> CodecResult<Vec<u8>>;

    /// Decodes a describe query body.
    fn decode_prototype(&self, document: &[u8]) -> CodecResult<Prototype>;

    /// Computes per-subject deltas from a decoded graph.
    fn compute_deltas(&self, graph: &Graph, prototype: Option<&Prototype>) -> Vec<(String, DeltaMap)> {
        graph.deltas(prototype)
    }
}

/// Strips parameters (`; charset=...`) and normalizes case.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// JSON rendering of the statement model.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a JSON codec.
    pub fn new() -> Self {
        Self
    }

    fn to_bytes<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(CodecError::from)
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn accepts(&self, content_type: &str) -> bool {
        let media = media_type(content_type);
        media == JSON_CONTENT_TYPE || media == "application/ld+json"
    }

    fn decode(&self, document: &[u8], content_type: &str) -> CodecResult<Graph> {
        if !self.accepts(content_type) {
            return Err(CodecError::unsupported_content_type(content_type));
        }
        if document.iter().all(u8::is_ascii_whitespace) {
            return Ok(Graph::new());
        }
        Self::from_bytes(document)
    }

    fn encode_graph(&self, graph: &Graph) -> CodecResult<Vec<u8>> {
        Self::to_bytes(graph)
    }

    fn encode_patch(&self, patch: &Patch) -> CodecResult<Vec<u8>> {
        Self::to_bytes(patch)
    }

    fn decode_patch(&self, document: &[u8]) -> CodecResult<Patch> {
        Self::from_bytes(document)
    }

    fn encode_prototype(&self, prototype: &Prototype) -> CodecResult<Vec<u8>> {
        Self::to_bytes(prototype)
    }

    fn decode_prototype(&self, document: &[u8]) -> CodecResult<Prototype> {
        Self::from_bytes(document)
    }
}

/// CBOR rendering of the statement model.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Creates a CBOR codec.
    pub fn new() -> Self {
        Self
    }

    fn to_bytes<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(out)
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}

impl Codec for CborCodec {
    fn content_type(&self) -> &'static str {
        CBOR_CONTENT_TYPE
    }

    fn decode(&self, document: &[u8], content_type: &str) -> CodecResult<Graph> {
        if !self.accepts(content_type) {
            return Err(CodecError::unsupported_content_type(content_type));
        }
        if document.is_empty() {
            return Ok(Graph::new());
        }
        Self::from_bytes(document)
    }

    fn encode_graph(&self, graph: &Graph) -> CodecResult<Vec<u8>> {
        Self::to_bytes(graph)
    }

    fn encode_patch(&self, patch: &Patch) -> CodecResult<Vec<u8>> {
        Self::to_bytes(patch)
    }

    fn decode_patch(&self, document: &[u8]) -> CodecResult<Patch> {
        Self::from_bytes(document)
    }

    fn encode_prototype(&self, prototype: &Prototype) -> CodecResult<Vec<u8>> {
        Self::to_bytes(prototype)
    }

    fn decode_prototype(&self, document: &[u8]) -> CodecResult<Prototype> {
        Self::from_bytes(document)
    }
}

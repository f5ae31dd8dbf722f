//! Transport layer abstraction for remote graph operations.

use crate::error::{TransportError, TransportResult};
use crate::message::{Method, RequestOptions, Response};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// A transport carries requests to the remote graph service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing, etc.).
/// Every call is a suspension point for the engine: nothing else blocks.
pub trait Transport: Send + Sync {
    /// Fetches the document at `location`.
    fn get(&self, location: &str, options: &RequestOptions) -> TransportResult<Response>;

    /// Fetches only the headers for `location`.
    fn head(&self, location: &str, options: &RequestOptions) -> TransportResult<Response>;

    /// Replaces the document at `location`.
    fn put(&self, location: &str, body: Vec<u8>, options: &RequestOptions)
        -> TransportResult<Response>;

    /// Submits a document to `location`.
    fn post(&self, location: &str, body: Vec<u8>, options: &RequestOptions)
        -> TransportResult<Response>;

    /// Applies a patch document to `location`.
    fn patch(&self, location: &str, body: Vec<u8>, options: &RequestOptions)
        -> TransportResult<Response>;

    /// Queries `location` with a prototype document.
    fn describe(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool {
        true
    }
}

/// A call captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The operation.
    pub method: Method,
    /// Target location.
    pub location: String,
    /// Request body (empty for `get`/`head`).
    pub body: Vec<u8>,
    /// Options as supplied.
    pub options: RequestOptions,
}

/// A recording transport for testing.
///
/// Responses are served from a one-shot queue per method first, then
/// from a sticky default per method. A method with neither yields a
/// protocol error.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    queued: Mutex<HashMap<Method, VecDeque<TransportResult<Response>>>>,
    defaults: Mutex<HashMap<Method, Response>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a new mock transport with no responses configured.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            queued: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that answers every write with `204 No Content`.
    pub fn accepting() -> Self {
        let mock = Self::new();
        for method in [Method::Put, Method::Post, Method::Patch, Method::Head] {
            mock.set_response(method, Response::new(204));
        }
        mock
    }

    /// Sets the sticky response for a method.
    pub fn set_response(&self, method: Method, response: Response) {
        self.defaults.lock().insert(method, response);
    }

    /// Queues a one-shot response for a method.
    pub fn push_response(&self, method: Method, response: Response) {
        self.queued
            .lock()
            .entry(method)
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues a one-shot failure for a method.
    pub fn push_error(&self, method: Method, error: TransportError) {
        self.queued
            .lock()
            .entry(method)
            .or_default()
            .push_back(Err(error));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the calls made with one method.
    pub fn calls_for(&self, method: Method) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn respond(
        &self,
        method: Method,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.calls.lock().push(RecordedCall {
            method,
            location: location.to_string(),
            body,
            options: options.clone(),
        });

        if let Some(next) = self
            .queued
            .lock()
            .get_mut(&method)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }

        self.defaults
            .lock()
            .get(&method)
            .cloned()
            .ok_or_else(|| TransportError::Protocol(format!("no mock {method} response set")))
    }
}

impl Transport for MockTransport {
    fn get(&self, location: &str, options: &RequestOptions) -> TransportResult<Response> {
        self.respond(Method::Get, location, Vec::new(), options)
    }

    fn head(&self, location: &str, options: &RequestOptions) -> TransportResult<Response> {
        self.respond(Method::Head, location, Vec::new(), options)
    }

    fn put(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.respond(Method::Put, location, body, options)
    }

    fn post(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.respond(Method::Post, location, body, options)
    }

    fn patch(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.respond(Method::Patch, location, body, options)
    }

    fn describe(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.respond(Method::Describe, location, body, options)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

//! Queued requests and their completion callbacks.

use crate::error::{CoreError, CoreResult};
use crate::object::ManagedObject;
use crate::types::{ObjectId, RevisionId};
use graphsync_codec::{Patch, Prototype};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Callback run when a request succeeds. Returning an error aborts the
/// owning transaction.
pub type SuccessCallback = Box<dyn FnOnce(&RequestResult) -> CoreResult<()> + Send>;

/// Callback run when a request fails. Returning an error aborts the
/// owning transaction.
pub type ErrorCallback = Box<dyn FnOnce(&CoreError) -> CoreResult<()> + Send>;

/// Kind of operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Fetch an object from the remote graph.
    Get,
    /// Write an object.
    Put,
    /// Delete an object.
    Delete,
    /// Add a new object.
    Post,
    /// Commit a transaction.
    Commit,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("get"),
            Self::Put => f.write_str("put"),
            Self::Delete => f.write_str("delete"),
            Self::Post => f.write_str("post"),
            Self::Commit => f.write_str("commit"),
        }
    }
}

/// Whether a request has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting in a store queue.
    Pending,
    /// Resolved with a result or an error.
    Complete,
}

/// The value a request resolves to.
#[derive(Debug, Clone)]
pub enum RequestResult {
    /// The patch fragment a write produced.
    Patch(Patch),
    /// The object a get resolved to, if the remote graph had one.
    Object(Option<ManagedObject>),
    /// A successful commit and the revision the remote service reported.
    Committed {
        /// New revision tag, if the response carried one.
        revision: Option<RevisionId>,
    },
}

impl RequestResult {
    /// Returns the fetched object, if this is a get result.
    pub fn object(&self) -> Option<&ManagedObject> {
        match self {
            Self::Object(object) => object.as_ref(),
            _ => None,
        }
    }

    /// Returns the patch fragment, if this is a write result.
    pub fn patch(&self) -> Option<&Patch> {
        match self {
            Self::Patch(patch) => Some(patch),
            _ => None,
        }
    }
}

/// What a get request looks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A single identifier, fetched directly.
    Id(ObjectId),
    /// A query by example, resolved through `describe`.
    Prototype(Prototype),
}

impl From<ObjectId> for Key {
    fn from(id: ObjectId) -> Self {
        Self::Id(id)
    }
}

impl From<&ObjectId> for Key {
    fn from(id: &ObjectId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Self::Id(ObjectId::new(id))
    }
}

impl From<String> for Key {
    fn from(id: String) -> Self {
        Self::Id(ObjectId::new(id))
    }
}

impl From<Prototype> for Key {
    fn from(prototype: Prototype) -> Self {
        Self::Prototype(prototype)
    }
}

impl From<&ManagedObject> for Key {
    fn from(example: &ManagedObject) -> Self {
        Self::Prototype(example.to_prototype())
    }
}

/// Handle to a queued operation.
///
/// Clones refer to the same request. Callbacks registered after the
/// request completed run immediately.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Mutex<RequestInner>>,
}

struct RequestInner {
    kind: RequestKind,
    store: Option<String>,
    state: RequestState,
    outcome: Option<CoreResult<RequestResult>>,
    patch: Patch,
    staged: Patch,
    key: Option<Key>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl Request {
    pub(crate) fn new(kind: RequestKind, store: Option<&str>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RequestInner {
                kind,
                store: store.map(str::to_string),
                state: RequestState::Pending,
                outcome: None,
                patch: Patch::new(),
                staged: Patch::new(),
                key: None,
                on_success: None,
                on_error: None,
            })),
        }
    }

    pub(crate) fn with_patch(self, patch: Patch) -> Self {
        self.inner.lock().patch = patch;
        self
    }

    /// The store-level contribution, appended to the store's staged
    /// patches when the request resolves.
    pub(crate) fn with_staged(self, staged: Patch) -> Self {
        self.inner.lock().staged = staged;
        self
    }

    pub(crate) fn with_key(self, key: Key) -> Self {
        self.inner.lock().key = Some(key);
        self
    }

    /// Returns the request kind.
    pub fn kind(&self) -> RequestKind {
        self.inner.lock().kind
    }

    /// Returns the name of the store the request was issued on.
    pub fn store_name(&self) -> Option<String> {
        self.inner.lock().store.clone()
    }

    /// Returns the request state.
    pub fn state(&self) -> RequestState {
        self.inner.lock().state
    }

    /// Returns true once the request has resolved.
    pub fn is_complete(&self) -> bool {
        self.state() == RequestState::Complete
    }

    /// Returns the result if the request succeeded.
    pub fn result(&self) -> Option<RequestResult> {
        match &self.inner.lock().outcome {
            Some(Ok(result)) => Some(result.clone()),
            _ => None,
        }
    }

    /// Returns the error if the request failed.
    pub fn error(&self) -> Option<CoreError> {
        match &self.inner.lock().outcome {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Returns the patch fragment this request produced.
    pub fn patch(&self) -> Patch {
        self.inner.lock().patch.clone()
    }

    /// Registers the success callback, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// When the request already succeeded the callback runs immediately
    /// and its error is returned.
    pub fn on_success<F>(&self, callback: F) -> CoreResult<()>
    where
        F: FnOnce(&RequestResult) -> CoreResult<()> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.outcome.clone() {
            None => {
                inner.on_success = Some(Box::new(callback));
                Ok(())
            }
            Some(Ok(result)) => {
                drop(inner);
                callback(&result)
            }
            Some(Err(_)) => Ok(()),
        }
    }

    /// Registers the error callback, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// When the request already failed the callback runs immediately and
    /// its error is returned.
    pub fn on_error<F>(&self, callback: F) -> CoreResult<()>
    where
        F: FnOnce(&CoreError) -> CoreResult<()> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.outcome.clone() {
            None => {
                inner.on_error = Some(Box::new(callback));
                Ok(())
            }
            Some(Err(err)) => {
                drop(inner);
                callback(&err)
            }
            Some(Ok(_)) => Ok(()),
        }
    }

    pub(crate) fn key(&self) -> Option<Key> {
        self.inner.lock().key.clone()
    }

    pub(crate) fn take_staged(&self) -> Patch {
        std::mem::take(&mut self.inner.lock().staged)
    }

    /// Records the outcome and runs the matching callback.
    ///
    /// The lock is released before the callback runs, so callbacks may
    /// issue further requests.
    pub(crate) fn complete(&self, outcome: CoreResult<RequestResult>) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        inner.state = RequestState::Complete;
        let success = inner.on_success.take();
        let failure = inner.on_error.take();
        inner.outcome = Some(outcome.clone());
        drop(inner);

        match outcome {
            Ok(result) => success.map_or(Ok(()), |callback| callback(&result)),
            Err(err) => failure.map_or(Ok(()), |callback| callback(&err)),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Request")
            .field("kind", &inner.kind)
            .field("store", &inner.store)
            .field("state", &inner.state)
            .finish()
    }
}

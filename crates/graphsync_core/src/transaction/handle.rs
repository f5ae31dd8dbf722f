//! The transaction handle and its commit protocol.

use super::TransactionState;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::request::{ErrorCallback, Request, RequestKind, RequestResult, SuccessCallback};
use crate::store::ObjectStore;
use crate::types::{RevisionId, TransactionId, TransactionMode};
use graphsync_codec::Patch;
use graphsync_transport::RequestOptions;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A unit of work over one or more object stores.
///
/// `Transaction` is a cheap-clone handle. While open it owns its stores
/// exclusively; the bindings are released when it commits or aborts.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    id: TransactionId,
    revision_id: RevisionId,
    parent_revision_id: RevisionId,
    mode: TransactionMode,
    disposition: Option<String>,
    database: Database,
    stores: Vec<ObjectStore>,
    state: Mutex<TransactionState>,
    commit_request: Mutex<Option<Request>>,
    on_complete: Mutex<Option<SuccessCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

impl Transaction {
    /// Opens a transaction over the named stores.
    ///
    /// Either every store is bound or none is.
    pub(crate) fn open(
        database: &Database,
        names: &[&str],
        mode: TransactionMode,
        disposition: Option<String>,
    ) -> CoreResult<Self> {
        if names.is_empty() {
            return Err(CoreError::invalid_access(
                "a transaction needs at least one object store",
            ));
        }

        let mut stores: Vec<ObjectStore> = Vec::with_capacity(names.len());
        for name in names {
            let store = database
                .find_object_store(name)
                .ok_or_else(|| CoreError::not_found(format!("object store {name}")))?;
            if !stores.iter().any(|s| s.name() == store.name()) {
                stores.push(store);
            }
        }
        if let Some(busy) = stores.iter().find(|s| s.transaction().is_some()) {
            return Err(CoreError::invalid_state(format!(
                "object store {} is already in a transaction",
                busy.name()
            )));
        }

        let txn = Self {
            inner: Arc::new(TransactionInner {
                id: database.next_transaction_id(),
                revision_id: RevisionId::generate(),
                parent_revision_id: database.revision(),
                mode,
                disposition,
                database: database.clone(),
                stores,
                state: Mutex::new(TransactionState::Open),
                commit_request: Mutex::new(None),
                on_complete: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
        };

        for (bound, store) in txn.inner.stores.iter().enumerate() {
            if let Err(err) = store.bind_transaction(&txn) {
                for earlier in &txn.inner.stores[..bound] {
                    earlier.release(txn.id());
                }
                return Err(err);
            }
        }

        info!(
            txn = %txn.id(),
            mode = %mode,
            stores = ?txn.store_names(),
            parent = %txn.inner.parent_revision_id,
            "transaction opened"
        );
        Ok(txn)
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// Returns the revision tag this transaction commits as.
    #[must_use]
    pub fn revision_id(&self) -> &RevisionId {
        &self.inner.revision_id
    }

    /// Returns the database revision when the transaction opened.
    #[must_use]
    pub fn parent_revision_id(&self) -> &RevisionId {
        &self.inner.parent_revision_id
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.inner.mode
    }

    /// Returns the routing label.
    #[must_use]
    pub fn disposition(&self) -> Option<&str> {
        self.inner.disposition.as_deref()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock()
    }

    /// Checks if requests may still be issued.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == TransactionState::Open
    }

    /// Returns the database this transaction belongs to.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    /// Returns the names of the stores in scope.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.inner
            .stores
            .iter()
            .map(|store| store.name().to_string())
            .collect()
    }

    /// Returns a store in scope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store is not part of this transaction.
    pub fn object_store(&self, name: &str) -> CoreResult<ObjectStore> {
        self.inner
            .stores
            .iter()
            .find(|store| store.name() == name)
            .cloned()
            .ok_or_else(|| {
                CoreError::not_found(format!(
                    "object store {name} in transaction {}",
                    self.inner.id
                ))
            })
    }

    /// Returns the handle of the latest commit attempt.
    #[must_use]
    pub fn commit_request(&self) -> Option<Request> {
        self.inner.commit_request.lock().clone()
    }

    /// Registers a hook run once the transaction commits.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&RequestResult) -> CoreResult<()> + Send + 'static,
    {
        *self.inner.on_complete.lock() = Some(Box::new(callback));
    }

    /// Registers a hook run when a commit attempt fails.
    pub fn on_error<F>(&self, callback: F)
    where
        F: FnOnce(&CoreError) -> CoreResult<()> + Send + 'static,
    {
        *self.inner.on_error.lock() = Some(Box::new(callback));
    }

    /// Returns the aggregate patch of every store in scope.
    #[must_use]
    pub fn as_patch(&self) -> Patch {
        self.inner.stores.iter().map(ObjectStore::as_patch).collect()
    }

    /// Commits the transaction.
    ///
    /// Remote failures do not make this return an error: the returned
    /// handle completes with the error, the transaction goes back to
    /// `Open` and every object keeps its deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not open.
    pub fn commit(&self) -> CoreResult<Request> {
        self.begin_commit()?;
        Ok(self.finish_commit())
    }

    /// Commits if the transaction is open and none of its stores has a
    /// pending request.
    ///
    /// Only the caller that moves the transaction out of `Open` commits.
    pub fn commit_if_complete(&self) -> Option<Request> {
        if !self.is_open() {
            return None;
        }
        if self
            .inner
            .stores
            .iter()
            .any(|store| store.pending_requests() > 0)
        {
            return None;
        }
        self.begin_commit().ok()?;
        Some(self.finish_commit())
    }

    fn begin_commit(&self) -> CoreResult<()> {
        let mut state = self.inner.state.lock();
        state.ensure_committable()?;
        *state = TransactionState::Committing;
        Ok(())
    }

    fn finish_commit(&self) -> Request {
        let patch = self.as_patch();
        let request = Request::new(RequestKind::Commit, None).with_patch(patch.clone());
        *self.inner.commit_request.lock() = Some(request.clone());

        info!(
            txn = %self.inner.id,
            revision = %self.inner.revision_id,
            statements = patch.len(),
            "committing"
        );

        if self.inner.mode == TransactionMode::ReadOnly && !patch.is_empty() {
            self.refuse_read_only_commit(&request);
            return request;
        }

        let outcome = if patch.is_empty() {
            debug!(txn = %self.inner.id, "nothing to send");
            Ok(None)
        } else {
            self.inner.database.submit(&patch, self.commit_options())
        };

        match outcome {
            Ok(revision) => {
                for store in &self.inner.stores {
                    store.clean_objects();
                    store.release(self.inner.id);
                }
                *self.inner.state.lock() = TransactionState::Committed;
                info!(txn = %self.inner.id, revision = ?revision, "transaction committed");

                let result = RequestResult::Committed { revision };
                if let Err(err) = request.complete(Ok(result.clone())) {
                    warn!(txn = %self.inner.id, error = %err, "commit callback failed");
                }
                let hook = self.inner.on_complete.lock().take();
                if let Some(hook) = hook {
                    if let Err(err) = hook(&result) {
                        warn!(txn = %self.inner.id, error = %err, "completion hook failed");
                    }
                }
            }
            Err(err) => {
                *self.inner.state.lock() = TransactionState::Open;
                warn!(txn = %self.inner.id, error = %err, "commit failed");

                let callback = request.complete(Err(err.clone()));
                let hook = self.inner.on_error.lock().take();
                let hooked = hook.map_or(Ok(()), |hook| hook(&err));
                if callback.is_err() || hooked.is_err() {
                    if let Err(abort) = self.abort() {
                        warn!(txn = %self.inner.id, error = %abort, "abort after failed commit");
                    }
                }
            }
        }
        request
    }

    /// Discards changes made to tracked objects during a read-only
    /// transaction. Nothing is sent; the transaction is aborted and the
    /// commit handle fails with `ReadOnly`.
    fn refuse_read_only_commit(&self, request: &Request) {
        let store = self
            .inner
            .stores
            .iter()
            .find(|store| !store.as_patch().is_empty())
            .map_or_else(String::new, |store| store.name().to_string());
        let err = CoreError::read_only(store);
        warn!(txn = %self.inner.id, error = %err, "changes in read-only transaction discarded");

        *self.inner.state.lock() = TransactionState::Open;
        if let Err(abort) = self.abort() {
            warn!(txn = %self.inner.id, error = %abort, "abort of read-only transaction");
        }

        if let Err(callback) = request.complete(Err(err.clone())) {
            warn!(txn = %self.inner.id, error = %callback, "commit callback failed");
        }
        let hook = self.inner.on_error.lock().take();
        if let Some(hook) = hook {
            if let Err(hooked) = hook(&err) {
                warn!(txn = %self.inner.id, error = %hooked, "error hook failed");
            }
        }
    }

    fn commit_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new().with_etag(self.inner.revision_id.as_str());
        if !self.inner.parent_revision_id.is_head() {
            options = options.with_if_match(self.inner.parent_revision_id.as_str());
        }
        if let Some(disposition) = &self.inner.disposition {
            options = options.with_disposition(disposition.as_str());
        }
        options
    }

    /// Aborts the transaction.
    ///
    /// Tracked objects are rolled back, the stores are emptied and every
    /// pending request fails with `TransactionAborted`. Aborting twice is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the transaction committed or is
    /// committing.
    pub fn abort(&self) -> CoreResult<()> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                TransactionState::Open => *state = TransactionState::Aborted,
                TransactionState::Aborted => return Ok(()),
                TransactionState::Committed => {
                    return Err(CoreError::invalid_state("transaction already committed"));
                }
                TransactionState::Committing => {
                    return Err(CoreError::invalid_state("commit in progress"));
                }
            }
        }

        let reason = format!("transaction {} aborted", self.inner.id);
        for store in &self.inner.stores {
            store.abort(&reason);
            store.release(self.inner.id);
        }
        info!(txn = %self.inner.id, "transaction aborted");
        Ok(())
    }

    /// Resolves requests across the stores in scope until none is left.
    ///
    /// Stores are visited round-robin, one request each per pass. Returns
    /// the commit handle if a commit was attempted.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing request callback.
    pub fn run(&self) -> CoreResult<Option<Request>> {
        loop {
            let mut progressed = false;
            for store in &self.inner.stores {
                if store.process_next()? {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        if self.commit_request().is_none() {
            self.commit_if_complete();
        }
        Ok(self.commit_request())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("state", &self.state())
            .field("stores", &self.store_names())
            .finish()
    }
}

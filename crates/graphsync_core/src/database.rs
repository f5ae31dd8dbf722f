//! Database session facade.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::object::ManagedObject;
use crate::revision::RevisionEntry;
use crate::store::ObjectStore;
use crate::transaction::Transaction;
use crate::types::{ObjectId, RevisionId, TransactionId, TransactionMode};
use graphsync_codec::{Codec, Graph, JsonCodec, Patch, Prototype};
use graphsync_transport::{RequestOptions, Response, Transport};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The main session handle.
///
/// `Database` is the entry point for replicating objects to a remote
/// graph. It provides:
/// - Object store management
/// - Transactions over one or more stores
/// - The remote operations every store and transaction goes through
/// - Tracking of the current and historical revision tags
///
/// `Database` is a cheap-clone handle; there is no process-wide
/// registry, so pass it to whatever needs it.
///
/// # Example
///
/// ```rust
/// use graphsync_core::{Config, Database, ManagedObject, TransactionMode};
/// use graphsync_transport::MockTransport;
/// use std::sync::Arc;
///
/// let transport = Arc::new(MockTransport::accepting());
/// let db = Database::open(Config::new().location("https://graph.example.com/db"), transport.clone());
/// let people = db.create_object_store("people").unwrap();
///
/// let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
/// let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
/// people.attach(&ada).unwrap();
/// people.put(&ada).unwrap();
/// txn.run().unwrap();
///
/// assert_eq!(transport.calls().len(), 1);
/// ```
#[derive(Clone)]
pub struct Database {
    session: Arc<Session>,
}

pub(crate) struct Session {
    config: Config,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    revision: RwLock<RevisionId>,
    revisions: RwLock<Vec<RevisionEntry>>,
    stores: RwLock<BTreeMap<String, ObjectStore>>,
    next_txid: AtomicU64,
    /// Serializes patch submissions.
    commit_lock: Mutex<()>,
    closed: AtomicBool,
}

impl Database {
    /// Opens a session that exchanges JSON documents.
    pub fn open(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self::open_with_codec(config, transport, Arc::new(JsonCodec::new()))
    }

    /// Opens a session with a specific codec.
    pub fn open_with_codec(
        config: Config,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        info!(location = %config.location, content_type = codec.content_type(), "session opened");
        Self {
            session: Arc::new(Session {
                config,
                transport,
                codec,
                revision: RwLock::new(RevisionId::head()),
                revisions: RwLock::new(Vec::new()),
                stores: RwLock::new(BTreeMap::new()),
                next_txid: AtomicU64::new(1),
                commit_lock: Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_session(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.session.config
    }

    /// Returns the remote location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.session.config.location
    }

    /// Returns the session codec.
    #[must_use]
    pub fn codec(&self) -> Arc<dyn Codec> {
        self.session.codec.clone()
    }

    /// Returns the current revision tag.
    #[must_use]
    pub fn revision(&self) -> RevisionId {
        self.session.revision.read().clone()
    }

    /// Returns every patch submitted so far, oldest first.
    #[must_use]
    pub fn revisions(&self) -> Vec<RevisionEntry> {
        self.session.revisions.read().clone()
    }

    /// Checks if the session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.session.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    pub(crate) fn next_transaction_id(&self) -> TransactionId {
        TransactionId::new(self.session.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    // ========================================================================
    // Object stores
    // ========================================================================

    /// Creates an object store, or returns the existing one of that name.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after [`close`](Self::close).
    pub fn create_object_store(&self, name: &str) -> CoreResult<ObjectStore> {
        self.create_object_store_with_codec(name, self.codec())
    }

    /// Creates an object store that decodes with the given codec.
    ///
    /// Re-creating an existing store only rebinds its codec.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after [`close`](Self::close).
    pub fn create_object_store_with_codec(
        &self,
        name: &str,
        codec: Arc<dyn Codec>,
    ) -> CoreResult<ObjectStore> {
        self.ensure_open()?;
        let mut stores = self.session.stores.write();
        if let Some(existing) = stores.get(name) {
            existing.set_codec(codec);
            return Ok(existing.clone());
        }
        let store = ObjectStore::new(name, Arc::downgrade(&self.session), codec);
        stores.insert(name.to_string(), store.clone());
        debug!(store = name, "object store created");
        Ok(store)
    }

    /// Looks up an object store.
    #[must_use]
    pub fn find_object_store(&self, name: &str) -> Option<ObjectStore> {
        self.session.stores.read().get(name).cloned()
    }

    /// Removes an object store, detaching its objects.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name and `InvalidState` while the
    /// store is in a transaction.
    pub fn delete_object_store(&self, name: &str) -> CoreResult<()> {
        let mut stores = self.session.stores.write();
        let store = stores
            .get(name)
            .ok_or_else(|| CoreError::not_found(format!("object store {name}")))?;
        if let Some(txn) = store.transaction() {
            return Err(CoreError::invalid_state(format!(
                "object store {name} is in transaction {}",
                txn.id()
            )));
        }
        if let Some(store) = stores.remove(name) {
            store.clear();
        }
        debug!(store = name, "object store deleted");
        Ok(())
    }

    /// Returns the names of all object stores, sorted.
    #[must_use]
    pub fn object_store_names(&self) -> Vec<String> {
        self.session.stores.read().keys().cloned().collect()
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Opens a transaction over the named stores with the default
    /// disposition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAccess` for an empty scope, `NotFound` for an
    /// unknown store and `InvalidState` if a store is already in a
    /// transaction.
    pub fn transaction(&self, names: &[&str], mode: TransactionMode) -> CoreResult<Transaction> {
        self.transaction_with_disposition(names, mode, self.config().default_disposition.clone())
    }

    /// Opens a transaction with an explicit routing label.
    ///
    /// # Errors
    ///
    /// As [`transaction`](Self::transaction).
    pub fn transaction_with_disposition(
        &self,
        names: &[&str],
        mode: TransactionMode,
        disposition: Option<String>,
    ) -> CoreResult<Transaction> {
        self.ensure_open()?;
        Transaction::open(self, names, mode, disposition)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Finds an attached object in any store.
    #[must_use]
    pub fn find_object(&self, id: &ObjectId) -> Option<ManagedObject> {
        self.session
            .stores
            .read()
            .values()
            .find_map(|store| store.object(id))
    }

    /// Creates a new object with a minted identifier.
    #[must_use]
    pub fn new_object<I, S>(&self, managed: I) -> ManagedObject
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.new_object_with_id(ObjectId::generate(), managed)
    }

    /// Creates a new object with the configured unknown property policy.
    #[must_use]
    pub fn new_object_with_id<I, S>(&self, id: impl Into<ObjectId>, managed: I) -> ManagedObject
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ManagedObject::new(id, managed).with_policy(self.config().unknown_properties)
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    /// Fetches a resource relative to the session location.
    ///
    /// # Errors
    ///
    /// Returns transport errors and `Remote` for a non-success status.
    pub fn get(&self, location: &str, options: RequestOptions) -> CoreResult<Response> {
        let options = self.decorate(options, self.session.codec.as_ref());
        let response = self.session.transport.get(&self.resolve(location), &options)?;
        check(response)
    }

    /// Fetches the headers of the session location.
    ///
    /// # Errors
    ///
    /// Returns transport errors and `Remote` for a non-success status.
    pub fn head(&self, options: RequestOptions) -> CoreResult<Response> {
        let options = self.decorate(options, self.session.codec.as_ref());
        let response = self.session.transport.head(self.location(), &options)?;
        check(response)
    }

    /// Replaces the remote graph.
    ///
    /// # Errors
    ///
    /// Returns codec and transport errors and `Remote` for a non-success
    /// status.
    pub fn put(&self, content: &Graph, options: RequestOptions) -> CoreResult<Response> {
        let codec = self.session.codec.as_ref();
        let body = codec.encode_graph(content)?;
        let options = self.decorate(options.with_content_type(codec.content_type()), codec);
        let response = self.session.transport.put(self.location(), body, &options)?;
        check(response)
    }

    /// Submits a patch with `POST`, without recording a revision.
    ///
    /// # Errors
    ///
    /// Returns codec and transport errors and `Remote` for a non-success
    /// status.
    pub fn post(&self, content: &Patch, options: RequestOptions) -> CoreResult<Response> {
        let codec = self.session.codec.as_ref();
        let body = codec.encode_patch(content)?;
        let options = self.decorate(options.with_content_type(codec.content_type()), codec);
        let response = self.session.transport.post(self.location(), body, &options)?;
        check(response)
    }

    /// Submits a patch.
    ///
    /// The patch is appended to [`revisions`](Self::revisions) before the
    /// round-trip, whatever its outcome. A response `ETag` becomes the
    /// current revision.
    ///
    /// # Errors
    ///
    /// Returns codec and transport errors and `Remote` for a non-success
    /// status.
    pub fn patch(&self, content: &Patch, options: RequestOptions) -> CoreResult<Response> {
        let _commit = self.session.commit_lock.lock();

        let revision = options
            .etag
            .clone()
            .map_or_else(RevisionId::generate, RevisionId::new);
        self.session
            .revisions
            .write()
            .push(RevisionEntry::new(content.clone(), revision));

        let codec = self.session.codec.as_ref();
        let body = codec.encode_patch(content)?;
        let options = self.decorate(options.with_content_type(codec.content_type()), codec);
        let response = check(self.session.transport.patch(self.location(), body, &options)?)?;

        if let Some(tag) = response.etag() {
            self.set_revision(RevisionId::new(tag));
        }
        Ok(response)
    }

    /// Queries the remote graph by example.
    ///
    /// # Errors
    ///
    /// Returns codec and transport errors and `Remote` for a non-success
    /// status.
    pub fn describe(&self, prototype: &Prototype, options: RequestOptions) -> CoreResult<Response> {
        self.describe_with(prototype, options, self.session.codec.as_ref())
    }

    fn describe_with(
        &self,
        prototype: &Prototype,
        options: RequestOptions,
        codec: &dyn Codec,
    ) -> CoreResult<Response> {
        let body = codec.encode_prototype(prototype)?;
        let options = self.decorate(options.with_content_type(codec.content_type()), codec);
        let response = self
            .session
            .transport
            .describe(self.location(), body, &options)?;
        check(response)
    }

    /// Asks the remote service for its current revision.
    ///
    /// # Errors
    ///
    /// Returns transport errors and `Remote` for a non-success status.
    pub fn refresh_revision(&self) -> CoreResult<RevisionId> {
        let response = self.head(RequestOptions::new())?;
        if let Some(tag) = response.etag() {
            self.set_revision(RevisionId::new(tag));
        }
        Ok(self.revision())
    }

    /// Closes the session.
    ///
    /// Open transactions are aborted and every store is emptied. Closing
    /// twice is a no-op.
    pub fn close(&self) {
        if self.session.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let stores: Vec<ObjectStore> = self.session.stores.read().values().cloned().collect();
        for store in &stores {
            if let Some(txn) = store.transaction() {
                if let Err(err) = txn.abort() {
                    warn!(txn = %txn.id(), error = %err, "abort on close failed");
                }
            }
            store.clear();
        }
        self.session.stores.write().clear();
        info!(location = %self.location(), "session closed");
    }

    // ========================================================================
    // Engine plumbing
    // ========================================================================

    /// Fetches one resource as a graph. A missing resource is an empty
    /// graph.
    pub(crate) fn fetch_graph(&self, id: &ObjectId, codec: &dyn Codec) -> CoreResult<Graph> {
        let location = if id.is_http() {
            id.to_string()
        } else {
            self.resolve(id.as_str())
        };
        let options = self.decorate(RequestOptions::new(), codec);
        let response = self.session.transport.get(&location, &options)?;
        if response.status() == 404 {
            debug!(object = %id, "not found remotely");
            return Ok(Graph::new());
        }
        decode(&check(response)?, codec)
    }

    pub(crate) fn describe_graph(&self, prototype: &Prototype, codec: &dyn Codec) -> CoreResult<Graph> {
        let response = self.describe_with(prototype, RequestOptions::new(), codec)?;
        decode(&response, codec)
    }

    /// Submits a commit patch and returns the revision the remote service
    /// reported.
    pub(crate) fn submit(&self, content: &Patch, options: RequestOptions) -> CoreResult<Option<RevisionId>> {
        let response = self.patch(content, options)?;
        Ok(response.etag().map(RevisionId::new))
    }

    fn set_revision(&self, revision: RevisionId) {
        let mut current = self.session.revision.write();
        if *current != revision {
            info!(from = %current, to = %revision, "revision changed");
            *current = revision;
        }
    }

    fn resolve(&self, location: &str) -> String {
        let base = self.location().trim_end_matches('/');
        match (base.is_empty(), location.is_empty()) {
            (_, true) => base.to_string(),
            (true, false) => location.to_string(),
            (false, false) => format!("{base}/{}", location.trim_start_matches('/')),
        }
    }

    fn decorate(&self, mut options: RequestOptions, codec: &dyn Codec) -> RequestOptions {
        if options.accept.is_none() {
            options.accept = Some(codec.content_type().to_string());
        }
        if options.credentials.is_none() {
            options.credentials = self.config().credentials.clone();
        }
        options
    }
}

fn check(response: Response) -> CoreResult<Response> {
    if response.is_success() {
        Ok(response)
    } else {
        let message = response
            .text()
            .filter(|text| !text.is_empty())
            .unwrap_or("request failed")
            .to_string();
        Err(CoreError::remote(response.status(), message))
    }
}

fn decode(response: &Response, codec: &dyn Codec) -> CoreResult<Graph> {
    let content_type = response.content_type().unwrap_or(codec.content_type());
    Ok(codec.decode(response.body(), content_type)?)
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location())
            .field("revision", &self.revision())
            .field("stores", &self.object_store_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphsync_codec::{CborCodec, Statement, CBOR_CONTENT_TYPE};
    use graphsync_transport::{Credentials, Method, MockTransport};

    fn open() -> (Database, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::accepting());
        let db = Database::open(
            Config::new().location("https://graph.example.com/db/"),
            transport.clone(),
        );
        (db, transport)
    }

    #[test]
    fn object_stores_are_created_once() {
        let (db, _) = open();
        let people = db.create_object_store("people").unwrap();
        people.attach(&ManagedObject::new("p1", ["name"])).unwrap();

        let again = db.create_object_store("people").unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(db.object_store_names(), vec!["people".to_string()]);

        db.create_object_store_with_codec("people", Arc::new(CborCodec::new()))
            .unwrap();
        assert_eq!(people.codec().content_type(), CBOR_CONTENT_TYPE);
    }

    #[test]
    fn object_stores_are_deleted_when_idle() {
        let (db, _) = open();
        let people = db.create_object_store("people").unwrap();
        let ada = ManagedObject::new("p1", ["name"]);
        people.attach(&ada).unwrap();

        assert!(matches!(
            db.delete_object_store("places"),
            Err(CoreError::NotFound { .. })
        ));

        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();
        assert!(matches!(
            db.delete_object_store("people"),
            Err(CoreError::InvalidState { .. })
        ));
        txn.abort().unwrap();

        db.create_object_store("people").unwrap().attach(&ada).unwrap();
        db.delete_object_store("people").unwrap();
        assert!(db.find_object_store("people").is_none());
        assert!(!ada.is_attached());
    }

    #[test]
    fn objects_are_found_across_stores() {
        let (db, _) = open();
        let rex = ManagedObject::new("d1", ["name"]);
        db.create_object_store("people").unwrap();
        db.create_object_store("pets").unwrap().attach(&rex).unwrap();

        let found = db.find_object(&ObjectId::new("d1")).unwrap();
        assert!(found.ptr_eq(&rex));
        assert!(db.find_object(&ObjectId::new("p1")).is_none());
    }

    #[test]
    fn new_objects_get_minted_ids_and_the_session_policy() {
        let transport = Arc::new(MockTransport::accepting());
        let db = Database::open(
            Config::new().unknown_properties(crate::UnknownPropertyPolicy::Reject),
            transport,
        );

        let object = db.new_object(["name"]);
        assert!(object.id().as_str().starts_with("urn:uuid:"));
        assert_eq!(object.policy(), crate::UnknownPropertyPolicy::Reject);
        assert!(object.set("age", 36i64).is_err());
        assert_ne!(db.new_object(["name"]).id(), object.id());
    }

    #[test]
    fn transaction_ids_increase() {
        let (db, _) = open();
        let first = db.next_transaction_id();
        let second = db.next_transaction_id();
        assert!(second.as_u64() > first.as_u64());
    }

    #[test]
    fn locations_are_resolved_against_the_base() {
        let (db, transport) = open();
        transport.set_response(Method::Get, Response::ok());

        db.get("/people/p1", RequestOptions::new()).unwrap();
        db.get("", RequestOptions::new()).unwrap();

        let calls = transport.calls_for(Method::Get);
        assert_eq!(calls[0].location, "https://graph.example.com/db/people/p1");
        assert_eq!(calls[1].location, "https://graph.example.com/db");
        assert_eq!(calls[0].options.accept.as_deref(), Some("application/json"));
    }

    #[test]
    fn credentials_are_attached() {
        let transport = Arc::new(MockTransport::accepting());
        let db = Database::open(
            Config::new()
                .location("https://graph.example.com/db")
                .credentials(Credentials::basic("ada", "secret")),
            transport.clone(),
        );

        db.head(RequestOptions::new()).unwrap();
        let call = &transport.calls_for(Method::Head)[0];
        assert_eq!(call.options.credentials, Some(Credentials::basic("ada", "secret")));
    }

    #[test]
    fn remote_failures_carry_status_and_text() {
        let (db, transport) = open();
        transport.set_response(
            Method::Get,
            Response::new(500).with_body("text/plain", b"boom".to_vec()),
        );
        assert_eq!(
            db.get("p1", RequestOptions::new()).unwrap_err(),
            CoreError::remote(500, "boom")
        );

        transport.set_response(Method::Get, Response::new(403));
        assert_eq!(
            db.get("p1", RequestOptions::new()).unwrap_err(),
            CoreError::remote(403, "request failed")
        );
    }

    #[test]
    fn patches_are_recorded_and_tagged() {
        let (db, transport) = open();
        transport.set_response(Method::Patch, Response::new(204).with_etag("r7"));
        let patch = Patch::posting(vec![Statement::new("p1", "name", "Ada")]);

        db.patch(&patch, RequestOptions::new().with_etag("r6")).unwrap();

        let revisions = db.revisions();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].revision.as_str(), "r6");
        assert_eq!(revisions[0].patch, patch);
        assert_eq!(db.revision().as_str(), "r7");

        let call = &transport.calls_for(Method::Patch)[0];
        assert_eq!(call.body, br#"{"post":[["p1","name","Ada"]]}"#.to_vec());
        assert_eq!(call.options.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn head_refreshes_the_revision() {
        let (db, transport) = open();
        assert!(db.revision().is_head());
        transport.set_response(Method::Head, Response::new(200).with_etag("r3"));

        assert_eq!(db.refresh_revision().unwrap().as_str(), "r3");
        assert_eq!(db.revision().as_str(), "r3");
    }

    #[test]
    fn missing_resources_fetch_as_empty_graphs() {
        let (db, transport) = open();
        transport.set_response(Method::Get, Response::new(404));

        let graph = db
            .fetch_graph(&ObjectId::new("p1"), db.codec().as_ref())
            .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn close_aborts_and_refuses_new_work() {
        let (db, _) = open();
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let request = people.put(&ManagedObject::new("p1", ["name"])).unwrap();

        db.close();
        db.close();

        assert!(!db.is_open());
        assert_eq!(txn.state(), crate::TransactionState::Aborted);
        assert!(matches!(
            request.error(),
            Some(CoreError::TransactionAborted { .. })
        ));
        assert!(db.object_store_names().is_empty());
        assert!(matches!(
            db.create_object_store("people"),
            Err(CoreError::DatabaseClosed)
        ));
        assert!(matches!(
            db.transaction(&["people"], TransactionMode::ReadOnly),
            Err(CoreError::DatabaseClosed)
        ));
    }
}

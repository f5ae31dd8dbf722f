//! Object stores: named registries of managed objects.

use crate::database::{Database, Session};
use crate::error::{CoreError, CoreResult};
use crate::object::{ManagedObject, ObjectState};
use crate::request::{Key, Request, RequestKind, RequestResult};
use crate::transaction::Transaction;
use crate::types::{ObjectId, TransactionId, TransactionMode};
use graphsync_codec::{Codec, Patch};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// A named registry of managed objects.
///
/// A store owns the objects attached to it, queues the requests issued
/// against it and accumulates the patch fragments those requests produce.
/// It is bound to at most one transaction at a time.
///
/// `ObjectStore` is a cheap-clone handle.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    name: String,
    session: Weak<Session>,
    codec: RwLock<Arc<dyn Codec>>,
    objects: RwLock<BTreeMap<ObjectId, ManagedObject>>,
    requests: Mutex<VecDeque<Request>>,
    patches: Mutex<Vec<Patch>>,
    transaction: RwLock<Option<Transaction>>,
    /// Held while the head request is being resolved.
    resolving: Mutex<()>,
}

impl ObjectStore {
    pub(crate) fn new(name: &str, session: Weak<Session>, codec: Arc<dyn Codec>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                name: name.to_string(),
                session,
                codec: RwLock::new(codec),
                objects: RwLock::new(BTreeMap::new()),
                requests: Mutex::new(VecDeque::new()),
                patches: Mutex::new(Vec::new()),
                transaction: RwLock::new(None),
                resolving: Mutex::new(()),
            }),
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the codec used to decode fetched documents.
    pub fn codec(&self) -> Arc<dyn Codec> {
        self.inner.codec.read().clone()
    }

    pub(crate) fn set_codec(&self, codec: Arc<dyn Codec>) {
        *self.inner.codec.write() = codec;
    }

    /// Returns the transaction the store is bound to.
    pub fn transaction(&self) -> Option<Transaction> {
        self.inner.transaction.read().clone()
    }

    /// Returns the number of attached objects.
    pub fn len(&self) -> usize {
        self.inner.objects.read().len()
    }

    /// Returns true if no objects are attached.
    pub fn is_empty(&self) -> bool {
        self.inner.objects.read().is_empty()
    }

    /// Returns true if an object with this identifier is attached.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.inner.objects.read().contains_key(id)
    }

    /// Looks up an attached object.
    pub fn object(&self, id: &ObjectId) -> Option<ManagedObject> {
        self.inner.objects.read().get(id).cloned()
    }

    /// Returns every attached object, ordered by identifier.
    pub fn objects(&self) -> Vec<ManagedObject> {
        self.inner.objects.read().values().cloned().collect()
    }

    /// Returns the number of unresolved requests.
    pub fn pending_requests(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Attaches an object and everything reachable from it.
    ///
    /// Attaching an object that already belongs to a store is a no-op.
    /// The lifecycle state is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a different object with the same
    /// identifier is already attached.
    pub fn attach(&self, object: &ManagedObject) -> CoreResult<()> {
        if object.is_attached() {
            return Ok(());
        }
        if let Some(existing) = self.object(object.id()) {
            if !existing.ptr_eq(object) {
                return Err(CoreError::invalid_state(format!(
                    "object store {} already holds {}",
                    self.name(),
                    object.id()
                )));
            }
        }

        let transaction = self.transaction().map(|txn| txn.id());
        let mut visited = HashSet::new();
        self.attach_graph(object, transaction, &mut visited);
        debug!(store = %self.name(), object = %object.id(), reached = visited.len(), "attached");
        Ok(())
    }

    fn attach_graph(
        &self,
        object: &ManagedObject,
        transaction: Option<TransactionId>,
        visited: &mut HashSet<ObjectId>,
    ) {
        if !visited.insert(object.id().clone()) {
            return;
        }
        if object.is_attached() {
            if !object.belongs_to(self.name()) {
                return;
            }
        } else {
            {
                let mut objects = self.inner.objects.write();
                if objects.contains_key(object.id()) {
                    return;
                }
                objects.insert(object.id().clone(), object.clone());
            }
            object.bind(self.name(), transaction);
            trace!(store = %self.name(), object = %object.id(), "registered");
        }

        for child in object.children() {
            self.attach_graph(&child, transaction, visited);
        }
    }

    /// Detaches an object and everything reachable from it.
    ///
    /// Detached objects return to `New`. Objects that belong to another
    /// store are left alone.
    pub fn detach(&self, object: &ManagedObject) {
        if !object.belongs_to(self.name()) {
            return;
        }
        let mut visited = HashSet::new();
        self.detach_graph(object, &mut visited);
        debug!(store = %self.name(), object = %object.id(), reached = visited.len(), "detached");
    }

    fn detach_graph(&self, object: &ManagedObject, visited: &mut HashSet<ObjectId>) {
        if !visited.insert(object.id().clone()) || !object.belongs_to(self.name()) {
            return;
        }
        let children = object.children();
        self.inner.objects.write().remove(object.id());
        object.reset();
        for child in children {
            self.detach_graph(&child, visited);
        }
    }

    /// Queues a write of an object.
    ///
    /// The object's patch is computed now. For an object attached here the
    /// live state is what gets committed, so newly linked children are
    /// attached as well.
    ///
    /// # Errors
    ///
    /// Returns `TransactionInactive` without an open transaction,
    /// `ReadOnly` in a read-only transaction and `InvalidState` for a
    /// deleted object or one attached to another store.
    pub fn put(&self, object: &ManagedObject) -> CoreResult<Request> {
        let txn = self.active_transaction(TransactionMode::ReadWrite)?;
        if object.state() == ObjectState::Deleted {
            return Err(CoreError::invalid_state(format!(
                "object {} is deleted",
                object.id()
            )));
        }

        self.ensure_not_foreign(object)?;

        let patch = object.as_patch();
        let staged = if object.belongs_to(self.name()) {
            let mut visited = HashSet::new();
            self.attach_graph(object, Some(txn.id()), &mut visited);
            Patch::new()
        } else {
            patch.clone()
        };

        Ok(self.enqueue(
            Request::new(RequestKind::Put, Some(self.name()))
                .with_patch(patch)
                .with_staged(staged),
        ))
    }

    /// Attaches a new object and queues its insertion.
    ///
    /// # Errors
    ///
    /// As [`put`](Self::put); additionally `InvalidState` if the object is
    /// already attached or its identifier is taken.
    pub fn add(&self, object: &ManagedObject) -> CoreResult<Request> {
        self.active_transaction(TransactionMode::ReadWrite)?;
        if object.is_attached() || self.contains(object.id()) {
            return Err(CoreError::invalid_state(format!(
                "object {} already exists in {}",
                object.id(),
                self.name()
            )));
        }
        self.attach(object)?;
        let patch = object.as_patch();
        Ok(self.enqueue(Request::new(RequestKind::Post, Some(self.name())).with_patch(patch)))
    }

    /// Queues a lookup.
    ///
    /// The remote call happens when the request is resolved; the result is
    /// the matching object (attached here) or `None`.
    ///
    /// # Errors
    ///
    /// Returns `TransactionInactive` without an open transaction.
    pub fn get(&self, key: impl Into<Key>) -> CoreResult<Request> {
        self.active_transaction(TransactionMode::ReadOnly)?;
        let key = key.into();
        Ok(self.enqueue(Request::new(RequestKind::Get, Some(self.name())).with_key(key)))
    }

    /// Queues a deletion.
    ///
    /// For an object attached here the deletion cascades through every
    /// reachable attached object.
    ///
    /// # Errors
    ///
    /// Returns `TransactionInactive` without an open transaction,
    /// `ReadOnly` in a read-only transaction and `InvalidState` for an
    /// object attached to another store.
    pub fn delete(&self, object: &ManagedObject) -> CoreResult<Request> {
        self.active_transaction(TransactionMode::ReadWrite)?;
        self.ensure_not_foreign(object)?;

        let mut patch = Patch::new();
        let staged = if object.belongs_to(self.name()) {
            let mut visited = HashSet::new();
            self.delete_graph(object, &mut visited, &mut patch);
            Patch::new()
        } else {
            object.mark_deleted();
            patch = object.as_patch();
            patch.clone()
        };

        Ok(self.enqueue(
            Request::new(RequestKind::Delete, Some(self.name()))
                .with_patch(patch)
                .with_staged(staged),
        ))
    }

    fn ensure_not_foreign(&self, object: &ManagedObject) -> CoreResult<()> {
        match object.store_name() {
            Some(owner) if owner != self.name() => Err(CoreError::invalid_state(format!(
                "object {} belongs to {owner}",
                object.id()
            ))),
            _ => Ok(()),
        }
    }

    fn delete_graph(
        &self,
        object: &ManagedObject,
        visited: &mut HashSet<ObjectId>,
        patch: &mut Patch,
    ) {
        if !visited.insert(object.id().clone()) || !object.belongs_to(self.name()) {
            return;
        }
        object.mark_deleted();
        patch.append(object.as_patch());
        for child in object.children() {
            self.delete_graph(&child, visited, patch);
        }
    }

    /// Returns the patch this store contributes to a commit: the staged
    /// fragments followed by the live patch of every attached object.
    pub fn as_patch(&self) -> Patch {
        let mut patch: Patch = self.inner.patches.lock().iter().cloned().collect();
        for object in self.objects() {
            patch.append(object.as_patch());
        }
        patch
    }

    /// Resolves the oldest pending request.
    ///
    /// The request is dequeued, its fragment staged, its callback run, and
    /// the owning transaction is then asked to commit if nothing is left
    /// outstanding. Returns `false` if the queue was empty.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing callback; the transaction has been
    /// aborted by then.
    pub fn process_next(&self) -> CoreResult<bool> {
        let (request, outcome) = {
            let _resolving = self.inner.resolving.lock();
            let head = self.inner.requests.lock().front().cloned();
            let Some(request) = head else {
                return Ok(false);
            };

            let outcome = match request.kind() {
                RequestKind::Get => self.resolve_get(&request),
                _ => Ok(RequestResult::Patch(request.patch())),
            };

            self.inner.requests.lock().pop_front();
            if outcome.is_ok() {
                let staged = request.take_staged();
                if !staged.is_empty() {
                    self.inner.patches.lock().push(staged);
                }
            }
            (request, outcome)
        };

        debug!(
            store = %self.name(),
            kind = %request.kind(),
            ok = outcome.is_ok(),
            "request resolved"
        );

        if let Err(err) = request.complete(outcome) {
            warn!(store = %self.name(), error = %err, "request callback failed");
            if let Some(txn) = self.transaction() {
                txn.abort()?;
            }
            return Err(err);
        }

        if let Some(txn) = self.transaction() {
            txn.commit_if_complete();
        }
        Ok(true)
    }

    fn resolve_get(&self, request: &Request) -> CoreResult<RequestResult> {
        let key = request
            .key()
            .ok_or_else(|| CoreError::invalid_state("get request without a key"))?;
        let database = self.database()?;
        let codec = self.codec();

        let (graph, prototype, wanted) = match key {
            Key::Id(id) => (database.fetch_graph(&id, codec.as_ref())?, None, Some(id)),
            Key::Prototype(proto) => {
                let graph = database.describe_graph(&proto, codec.as_ref())?;
                (graph, Some(proto), None)
            }
        };

        let transaction = self.transaction().map(|txn| txn.id());
        let policy = database.config().unknown_properties;
        let mut found = None;

        for (subject, values) in codec.compute_deltas(&graph, prototype.as_ref()) {
            let id = ObjectId::new(subject);
            let object = match self.object(&id) {
                Some(existing) => {
                    existing.rollforward(&values);
                    trace!(store = %self.name(), object = %id, "updated from remote");
                    existing
                }
                None => {
                    let created = ManagedObject::from_remote(id.clone(), &values, policy);
                    self.inner
                        .objects
                        .write()
                        .insert(id.clone(), created.clone());
                    created.bind(self.name(), transaction);
                    trace!(store = %self.name(), object = %id, "created from remote");
                    created
                }
            };

            let selected = match &wanted {
                Some(wanted) => *wanted == id,
                None => found.is_none(),
            };
            if selected {
                found = Some(object);
            }
        }

        Ok(RequestResult::Object(found))
    }

    fn enqueue(&self, request: Request) -> Request {
        let mut requests = self.inner.requests.lock();
        requests.push_back(request.clone());
        debug!(
            store = %self.name(),
            kind = %request.kind(),
            pending = requests.len(),
            "request queued"
        );
        request
    }

    /// Returns the open transaction allowed to serve a request of the
    /// given mode, opening an implicit one when configured.
    fn active_transaction(&self, mode: TransactionMode) -> CoreResult<Transaction> {
        if let Some(txn) = self.transaction() {
            if !txn.is_open() {
                return Err(CoreError::transaction_inactive(format!(
                    "transaction {} on object store {} is {}",
                    txn.id(),
                    self.name(),
                    txn.state()
                )));
            }
            if mode.is_writable() && !txn.mode().is_writable() {
                return Err(CoreError::read_only(self.name()));
            }
            return Ok(txn);
        }

        let database = self.database()?;
        if !database.config().implicit_transactions {
            return Err(CoreError::transaction_inactive(format!(
                "object store {} has no open transaction",
                self.name()
            )));
        }
        debug!(store = %self.name(), "opening implicit transaction");
        database.transaction(&[self.name()], TransactionMode::ReadWrite)
    }

    fn database(&self) -> CoreResult<Database> {
        self.inner
            .session
            .upgrade()
            .map(Database::from_session)
            .ok_or(CoreError::DatabaseClosed)
    }

    pub(crate) fn bind_transaction(&self, txn: &Transaction) -> CoreResult<()> {
        {
            let mut slot = self.inner.transaction.write();
            if let Some(current) = slot.as_ref() {
                return Err(CoreError::invalid_state(format!(
                    "object store {} is already in transaction {}",
                    self.name(),
                    current.id()
                )));
            }
            *slot = Some(txn.clone());
        }
        for object in self.objects() {
            object.set_transaction(Some(txn.id()));
        }
        Ok(())
    }

    /// Unbinds the store if it is bound to the given transaction.
    pub(crate) fn release(&self, transaction: TransactionId) {
        let mut slot = self.inner.transaction.write();
        if slot.as_ref().is_some_and(|txn| txn.id() == transaction) {
            *slot = None;
        }
    }

    /// Marks every attached object clean after a successful commit.
    ///
    /// Deleted objects no longer exist remotely and are evicted.
    pub(crate) fn clean_objects(&self) {
        let mut evicted = 0;
        for object in self.objects() {
            if object.state() == ObjectState::Deleted {
                self.inner.objects.write().remove(object.id());
                object.reset();
                evicted += 1;
            } else {
                object.mark_clean();
            }
        }
        self.inner.patches.lock().clear();
        debug!(store = %self.name(), evicted, "objects cleaned");
    }

    /// Rolls back modified objects, empties the registry and fails every
    /// pending request.
    pub(crate) fn abort(&self, reason: &str) {
        let objects = std::mem::take(&mut *self.inner.objects.write());
        for object in objects.values() {
            if object.transaction_id().is_some() {
                object.rollback();
            }
            object.reset();
        }
        self.inner.patches.lock().clear();

        let pending: Vec<Request> = self.inner.requests.lock().drain(..).collect();
        for request in &pending {
            if let Err(err) = request.complete(Err(CoreError::transaction_aborted(reason))) {
                warn!(store = %self.name(), error = %err, "error callback failed during abort");
            }
        }
        info!(
            store = %self.name(),
            objects = objects.len(),
            dropped = pending.len(),
            "store aborted"
        );
    }

    /// Detaches every object without touching the queue.
    pub(crate) fn clear(&self) {
        let objects = std::mem::take(&mut *self.inner.objects.write());
        for object in objects.values() {
            object.reset();
        }
        self.inner.patches.lock().clear();
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("name", &self.inner.name)
            .field("objects", &self.len())
            .field("pending", &self.pending_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use graphsync_codec::{Statement, Term};
    use graphsync_transport::{Method, MockTransport, Response, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LOCATION: &str = "https://graph.example.com/db";

    fn session_with(config: Config) -> (Database, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::accepting());
        let db = Database::open(config.location(LOCATION), transport.clone());
        (db, transport)
    }

    fn session() -> (Database, Arc<MockTransport>) {
        session_with(Config::new())
    }

    fn person(id: &str, name: &str) -> ManagedObject {
        ManagedObject::new(id, ["name", "friend"]).property("name", name)
    }

    fn json(body: &str) -> Response {
        Response::ok().with_body("application/json", body.as_bytes().to_vec())
    }

    #[test]
    fn attach_is_idempotent() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let ada = person("p1", "Ada");

        people.attach(&ada).unwrap();
        people.attach(&ada).unwrap();

        assert_eq!(people.len(), 1);
        assert_eq!(ada.store_name().as_deref(), Some("people"));
        assert_eq!(ada.state(), ObjectState::New);
    }

    #[test]
    fn attach_reaches_children_through_cycles() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let ada = person("p1", "Ada");
        let charles = person("p2", "Charles").property("friend", &ada);
        ada.set("friend", &charles).unwrap();

        people.attach(&ada).unwrap();

        assert_eq!(people.len(), 2);
        assert!(charles.is_attached());
        assert!(people.contains(&ObjectId::new("p2")));
    }

    #[test]
    fn attach_rejects_a_second_object_with_the_same_id() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        people.attach(&person("p1", "Ada")).unwrap();

        let err = people.attach(&person("p1", "Impostor")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn objects_in_another_store_are_left_alone() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let pets = db.create_object_store("pets").unwrap();
        let rex = ManagedObject::new("d1", ["name"]).property("name", "Rex");
        pets.attach(&rex).unwrap();

        let ada = person("p1", "Ada").property("friend", &rex);
        people.attach(&ada).unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(rex.store_name().as_deref(), Some("pets"));

        people.detach(&rex);
        assert!(rex.is_attached());
    }

    #[test]
    fn detach_resets_the_graph() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let charles = person("p2", "Charles");
        let ada = person("p1", "Ada").property("friend", &charles);
        people.attach(&ada).unwrap();

        people.detach(&ada);

        assert!(people.is_empty());
        assert!(!ada.is_attached());
        assert!(!charles.is_attached());
        assert_eq!(ada.state(), ObjectState::New);
    }

    #[test]
    fn requests_need_a_transaction() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();

        let err = people.put(&person("p1", "Ada")).unwrap_err();
        assert!(matches!(err, CoreError::TransactionInactive { .. }));
        let err = people.get("p1").unwrap_err();
        assert!(matches!(err, CoreError::TransactionInactive { .. }));
    }

    #[test]
    fn read_only_transactions_refuse_writes() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

        let ada = person("p1", "Ada");
        assert!(matches!(people.put(&ada), Err(CoreError::ReadOnly { .. })));
        assert!(matches!(people.delete(&ada), Err(CoreError::ReadOnly { .. })));
        assert!(people.get("p1").is_ok());
    }

    #[test]
    fn detached_puts_are_staged_when_resolved() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();

        let first = people.put(&person("p1", "Ada")).unwrap();
        people.put(&person("p2", "Charles")).unwrap();
        assert!(people.as_patch().is_empty());
        assert_eq!(first.patch().len(), 1);

        assert!(people.process_next().unwrap());
        assert!(first.is_complete());
        assert_eq!(people.pending_requests(), 1);
        assert!(people
            .as_patch()
            .posts(&Statement::new("p1", "name", "Ada")));
        assert!(txn.is_open());
    }

    #[test]
    fn attached_puts_contribute_live_state_once() {
        let (db, transport) = session();
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let ada = person("p1", "Ada");
        people.attach(&ada).unwrap();

        people.put(&ada).unwrap();
        people.put(&ada).unwrap();
        txn.run().unwrap();

        let patches = transport.calls_for(Method::Patch);
        assert_eq!(patches.len(), 1);
        assert_eq!(
            String::from_utf8(patches[0].body.clone()).unwrap(),
            r#"{"post":[["p1","name","Ada"]]}"#
        );
    }

    #[test]
    fn put_attaches_newly_linked_children() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let ada = person("p1", "Ada");
        people.attach(&ada).unwrap();

        let charles = person("p2", "Charles");
        ada.set("friend", &charles).unwrap();
        people.put(&ada).unwrap();

        assert!(charles.is_attached());
        let patch = people.as_patch();
        assert!(patch.posts(&Statement::new("p1", "friend", Term::node("p2"))));
        assert!(patch.posts(&Statement::new("p2", "name", "Charles")));
    }

    #[test]
    fn put_of_deleted_object_is_refused() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let ada = person("p1", "Ada");
        people.attach(&ada).unwrap();
        people.delete(&ada).unwrap();

        assert!(matches!(people.put(&ada), Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn add_refuses_existing_objects() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();

        let request = people.add(&person("p1", "Ada")).unwrap();
        assert_eq!(request.kind(), RequestKind::Post);
        assert_eq!(people.len(), 1);

        let err = people.add(&person("p1", "Again")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn delete_cascades_through_attached_graph() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let charles = person("p2", "Charles");
        let ada = person("p1", "Ada").property("friend", &charles);

        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        people.attach(&ada).unwrap();
        people.put(&ada).unwrap();
        txn.run().unwrap();
        assert_eq!(ada.state(), ObjectState::Clean);

        db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let request = people.delete(&ada).unwrap();

        assert_eq!(ada.state(), ObjectState::Deleted);
        assert_eq!(charles.state(), ObjectState::Deleted);
        let patch = request.patch();
        assert!(patch.deletes(&Statement::new("p1", "name", "Ada")));
        assert!(patch.deletes(&Statement::new("p1", "friend", Term::node("p2"))));
        assert!(patch.deletes(&Statement::new("p2", "name", "Charles")));
        assert_eq!(people.as_patch(), patch);
    }

    #[test]
    fn deleting_a_detached_object_stages_its_patch() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let stranger = person("p9", "Stranger");
        people.delete(&stranger).unwrap();
        people.put(&person("p1", "Ada")).unwrap();

        people.process_next().unwrap();
        assert!(people
            .as_patch()
            .deletes(&Statement::new("p9", "name", "Stranger")));
    }

    #[test]
    fn objects_of_another_store_cannot_be_written_here() {
        let (db, transport) = session();
        let people = db.create_object_store("people").unwrap();
        let pets = db.create_object_store("pets").unwrap();
        let rex = ManagedObject::new("d1", ["name"]).property("name", "Rex");

        let txn = db.transaction(&["pets"], TransactionMode::ReadWrite).unwrap();
        pets.attach(&rex).unwrap();
        pets.put(&rex).unwrap();
        txn.run().unwrap();
        assert_eq!(rex.state(), ObjectState::Clean);

        let txn = db
            .transaction(&["people", "pets"], TransactionMode::ReadWrite)
            .unwrap();
        let err = people.delete(&rex).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        let err = people.put(&rex).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        assert_eq!(rex.state(), ObjectState::Clean);
        assert_eq!(people.pending_requests(), 0);

        pets.delete(&rex).unwrap();
        txn.run().unwrap();
        let patches = transport.calls_for(Method::Patch);
        assert_eq!(patches.len(), 2);
        assert_eq!(
            String::from_utf8(patches[1].body.clone()).unwrap(),
            r#"{"delete":[["d1","name","Rex"]]}"#
        );
    }

    #[test]
    fn get_by_id_creates_a_clean_object() {
        let (db, transport) = session();
        transport.push_response(Method::Get, json(r#"[["p1","name","Ada"]]"#));
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

        let request = people.get("p1").unwrap();
        txn.run().unwrap();

        let object = request.result().and_then(|r| r.object().cloned()).unwrap();
        assert_eq!(object.state(), ObjectState::Clean);
        assert_eq!(object.get("name"), Some("Ada".into()));
        assert!(people.contains(&ObjectId::new("p1")));
        assert_eq!(
            transport.calls_for(Method::Get)[0].location,
            "https://graph.example.com/db/p1"
        );
        assert!(transport.calls_for(Method::Patch).is_empty());
    }

    #[test]
    fn get_fetches_absolute_ids_directly() {
        let (db, transport) = session();
        transport.push_response(Method::Get, Response::new(404));
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

        let request = people.get("https://other.example.org/p1").unwrap();
        txn.run().unwrap();

        assert_eq!(
            transport.calls_for(Method::Get)[0].location,
            "https://other.example.org/p1"
        );
        assert!(matches!(request.result(), Some(RequestResult::Object(None))));
    }

    #[test]
    fn get_rolls_existing_objects_forward() {
        let (db, transport) = session();
        transport.push_response(Method::Get, json(r#"[["p1","name","Grace"]]"#));
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let ada = person("p1", "Ada");
        people.attach(&ada).unwrap();

        let request = people.get("p1").unwrap();
        txn.run().unwrap();

        let fetched = request.result().and_then(|r| r.object().cloned()).unwrap();
        assert!(fetched.ptr_eq(&ada));
        assert_eq!(ada.get("name"), Some("Grace".into()));
        assert_eq!(ada.state(), ObjectState::Clean);
    }

    #[test]
    fn get_by_prototype_describes() {
        let (db, transport) = session();
        transport.push_response(
            Method::Describe,
            json(r#"[["p1","name","Ada"],["p2","name","Charles"]]"#),
        );
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

        let example = ManagedObject::new("example", ["name"]).property("name", "Charles");
        let request = people.get(&example).unwrap();
        txn.run().unwrap();

        let object = request.result().and_then(|r| r.object().cloned()).unwrap();
        assert_eq!(object.id().as_str(), "p2");
        assert_eq!(people.len(), 1);
        let call = &transport.calls_for(Method::Describe)[0];
        assert_eq!(call.body, br#"{"properties":{"name":"Charles"}}"#.to_vec());
    }

    #[test]
    fn get_failures_reach_the_error_callback() {
        let (db, transport) = session();
        transport.push_error(Method::Get, TransportError::Timeout);
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

        let failures = Arc::new(AtomicUsize::new(0));
        let seen = failures.clone();
        let request = people.get("p1").unwrap();
        request
            .on_error(move |err| {
                assert!(err.is_remote());
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        txn.run().unwrap();

        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert!(matches!(request.error(), Some(CoreError::Transport(_))));
    }

    #[test]
    fn failing_callback_aborts_the_transaction() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let ada = person("p1", "Ada");
        people.attach(&ada).unwrap();

        people
            .put(&ada)
            .unwrap()
            .on_success(|_| Err(CoreError::data("rejected by application")))
            .unwrap();

        let err = people.process_next().unwrap_err();
        assert!(matches!(err, CoreError::Data { .. }));
        assert_eq!(txn.state(), crate::TransactionState::Aborted);
        assert!(people.is_empty());
        assert!(people.transaction().is_none());
    }

    #[test]
    fn abort_fails_pending_requests() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let request = people.put(&person("p1", "Ada")).unwrap();

        txn.abort().unwrap();

        assert_eq!(people.pending_requests(), 0);
        assert!(matches!(
            request.error(),
            Some(CoreError::TransactionAborted { .. })
        ));
    }

    #[test]
    fn implicit_transactions_open_on_demand() {
        let (db, transport) = session_with(Config::new().implicit_transactions(true));
        let people = db.create_object_store("people").unwrap();

        people.put(&person("p1", "Ada")).unwrap();
        let txn = people.transaction().unwrap();
        assert_eq!(txn.mode(), TransactionMode::ReadWrite);

        assert!(people.process_next().unwrap());
        assert_eq!(txn.state(), crate::TransactionState::Committed);
        assert_eq!(transport.calls_for(Method::Patch).len(), 1);
        assert!(people.transaction().is_none());
    }

    #[test]
    fn closed_database_stops_requests() {
        let (db, _) = session();
        let people = db.create_object_store("people").unwrap();
        drop(db);

        let err = people.get("p1").unwrap_err();
        assert!(matches!(err, CoreError::DatabaseClosed));
    }
}

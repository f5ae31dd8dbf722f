//! Test fixtures and session helpers.
//!
//! Provides convenience functions for opening sessions against a
//! recording mock or an in-memory graph service.

use crate::server::GraphServer;
use graphsync_core::{Config, Database};
use graphsync_transport::MockTransport;
use std::sync::Arc;

/// Location every fixture session is opened at.
pub const TEST_LOCATION: &str = "https://graph.test/db";

/// A session over a recording transport that accepts every write.
pub struct MockSession {
    /// The session.
    pub db: Database,
    /// The transport, for inspecting calls and queueing responses.
    pub transport: Arc<MockTransport>,
}

impl MockSession {
    /// Opens a session with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Opens a session with the given configuration at [`TEST_LOCATION`].
    pub fn with_config(config: Config) -> Self {
        let transport = Arc::new(MockTransport::accepting());
        Self {
            db: Database::open(config.location(TEST_LOCATION), transport.clone()),
            transport,
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for MockSession {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// A session connected to an in-memory [`GraphServer`] through the
/// loopback HTTP transport.
pub struct LoopbackSession {
    /// The session.
    pub db: Database,
    /// The server the session talks to.
    pub server: GraphServer,
}

impl LoopbackSession {
    /// Opens another session against the same server.
    pub fn reopen(&self, config: Config) -> LoopbackSession {
        connect(&self.server, config)
    }
}

impl std::ops::Deref for LoopbackSession {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Opens a session against a fresh, empty [`GraphServer`].
pub fn loopback_session() -> LoopbackSession {
    connect(&GraphServer::new(TEST_LOCATION), Config::new())
}

/// Opens a session against an existing server.
pub fn connect(server: &GraphServer, config: Config) -> LoopbackSession {
    let transport = Arc::new(server.transport());
    LoopbackSession {
        db: Database::open(config.location(server.base_url()), transport),
        server: server.clone(),
    }
}

/// Runs a test with a mock session.
///
/// # Example
///
/// ```rust
/// use graphsync_testkit::with_mock_session;
///
/// with_mock_session(|db, transport| {
///     db.create_object_store("people").unwrap();
///     assert!(transport.calls().is_empty());
/// });
/// ```
pub fn with_mock_session<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &MockTransport) -> R,
{
    let session = MockSession::new();
    f(&session.db, &session.transport)
}

/// Test scenario helpers.
pub mod scenarios {
    use graphsync_core::{Database, ManagedObject, TransactionMode};

    /// Properties managed on people.
    pub const PERSON_PROPERTIES: [&str; 3] = ["name", "age", "knows"];

    /// Creates a new person with a name.
    pub fn person(id: &str, name: &str) -> ManagedObject {
        ManagedObject::new(id, PERSON_PROPERTIES).property("name", name)
    }

    /// Attaches the objects to `store`, writes them and runs the
    /// transaction to completion.
    pub fn commit_objects(db: &Database, store: &str, objects: &[ManagedObject]) {
        let store = db
            .create_object_store(store)
            .expect("Failed to create object store");
        let txn = db
            .transaction(&[store.name()], TransactionMode::ReadWrite)
            .expect("Failed to open transaction");
        for object in objects {
            store.attach(object).expect("Failed to attach object");
            store.put(object).expect("Failed to queue put");
        }
        txn.run().expect("Failed to run transaction");
    }

    /// Creates a store holding `count` committed people.
    pub fn populated_store(db: &Database, store: &str, count: usize) -> Vec<ManagedObject> {
        let people: Vec<ManagedObject> = (0..count)
            .map(|i| person(&format!("p{i}"), &format!("person {i}")))
            .collect();
        commit_objects(db, store, &people);
        people
    }
}

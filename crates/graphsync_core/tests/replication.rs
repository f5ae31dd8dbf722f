//! Integration tests for graphsync_core.
//!
//! These drive the public API end to end against a recording transport:
//! objects are attached, changed and committed, and the resulting wire
//! traffic is inspected.

use graphsync_codec::{Patch, Statement, Term};
use graphsync_core::{
    Config, CoreError, Database, ManagedObject, ObjectState, RequestResult, TransactionMode,
    TransactionState,
};
use graphsync_transport::{Method, MockTransport, Response};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LOCATION: &str = "https://graph.example.com/db";

fn session() -> (Database, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::accepting());
    let db = Database::open(Config::new().location(LOCATION), transport.clone());
    (db, transport)
}

fn patch_bodies(transport: &MockTransport) -> Vec<String> {
    transport
        .calls_for(Method::Patch)
        .into_iter()
        .map(|call| String::from_utf8(call.body).unwrap())
        .collect()
}

/// Commits `object` as it stands so that it becomes `Clean`.
fn commit_clean(db: &Database, store: &str, object: &ManagedObject) {
    let txn = db.transaction(&[store], TransactionMode::ReadWrite).unwrap();
    let store = txn.object_store(store).unwrap();
    store.attach(object).unwrap();
    store.put(object).unwrap();
    txn.run().unwrap();
    assert_eq!(object.state(), ObjectState::Clean);
}

#[test]
fn first_save_posts_one_patch() {
    let (db, transport) = session();
    let people = db.create_object_store("people").unwrap();
    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();

    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    people.attach(&ada).unwrap();
    let committed = Arc::new(AtomicBool::new(false));
    let flag = committed.clone();
    people
        .put(&ada)
        .unwrap()
        .on_success(move |result| {
            assert!(matches!(result, RequestResult::Patch(_)));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    let commit = txn.run().unwrap().unwrap();

    assert!(committed.load(Ordering::SeqCst));
    assert!(commit.is_complete());
    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(ada.state(), ObjectState::Clean);
    assert!(ada.deltas().is_empty());
    assert_eq!(patch_bodies(&transport), vec![r#"{"post":[["p1","name","Ada"]]}"#]);
    assert_eq!(
        transport.calls_for(Method::Patch)[0].location,
        LOCATION.to_string()
    );
}

#[test]
fn clean_objects_have_nothing_to_send() {
    let (db, transport) = session();
    db.create_object_store("people").unwrap();
    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    commit_clean(&db, "people", &ada);
    transport.clear_calls();

    assert!(ada.as_patch().is_empty());
    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
    txn.object_store("people").unwrap().put(&ada).unwrap();
    txn.run().unwrap();

    assert!(transport.calls().is_empty());
}

#[test]
fn new_objects_post_every_managed_property() {
    let object = ManagedObject::new("x", ["a", "b"])
        .property("a", 1i64)
        .property("b", 2i64);

    let patch = object.as_patch();
    assert_eq!(patch.post.len(), 2);
    assert!(patch.posts(&Statement::new("x", "a", 1i64)));
    assert!(patch.posts(&Statement::new("x", "b", 2i64)));
    assert!(patch.delete.is_empty());
}

#[test]
fn modifications_replace_old_values() {
    let (db, transport) = session();
    db.create_object_store("people").unwrap();
    let ada = ManagedObject::new("p1", ["name", "age"])
        .property("name", "Ada")
        .property("age", 36i64);
    commit_clean(&db, "people", &ada);

    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
    ada.set("age", 37i64).unwrap();
    assert_eq!(ada.state(), ObjectState::Modified);
    txn.object_store("people").unwrap().put(&ada).unwrap();
    txn.run().unwrap();

    assert_eq!(
        patch_bodies(&transport)[1],
        r#"{"post":[["p1","age",37]],"delete":[["p1","age",36]]}"#
    );
    assert_eq!(ada.state(), ObjectState::Clean);
}

#[test]
fn reverting_a_change_drops_its_delta() {
    let (db, _) = session();
    db.create_object_store("people").unwrap();
    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    commit_clean(&db, "people", &ada);

    let _txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
    ada.set("name", "Grace").unwrap();
    assert!(ada.delta("name").is_some());

    ada.set("name", "Ada").unwrap();
    assert!(ada.delta("name").is_none());
    assert!(ada.as_patch().is_empty());
}

#[test]
fn deleting_a_clean_object_retracts_its_statements() {
    let (db, transport) = session();
    db.create_object_store("people").unwrap();
    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    commit_clean(&db, "people", &ada);

    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
    let people = txn.object_store("people").unwrap();
    people.delete(&ada).unwrap();
    assert_eq!(
        ada.as_patch(),
        Patch::deleting(vec![Statement::new("p1", "name", "Ada")])
    );
    txn.run().unwrap();

    assert_eq!(patch_bodies(&transport)[1], r#"{"delete":[["p1","name","Ada"]]}"#);
    assert!(!people.contains(ada.id()));
}

#[test]
fn linked_objects_travel_together() {
    let (db, transport) = session();
    let people = db.create_object_store("people").unwrap();
    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();

    let charles = ManagedObject::new("p2", ["name"]).property("name", "Charles");
    let ada = ManagedObject::new("p1", ["name", "knows"])
        .property("name", "Ada")
        .property("knows", vec![charles.clone()]);
    people.attach(&ada).unwrap();
    people.put(&ada).unwrap();
    txn.run().unwrap();

    assert_eq!(
        patch_bodies(&transport),
        vec![
            r#"{"post":[["p1","name","Ada"],["p1","knows",{"@id":"p2"}],["p2","name","Charles"]]}"#
        ]
    );
    assert_eq!(charles.state(), ObjectState::Clean);
}

#[test]
fn transactions_span_stores_and_commit_once() {
    let (db, transport) = session();
    db.create_object_store("people").unwrap();
    db.create_object_store("pets").unwrap();
    let txn = db
        .transaction(&["people", "pets"], TransactionMode::ReadWrite)
        .unwrap();
    let people = txn.object_store("people").unwrap();
    let pets = txn.object_store("pets").unwrap();

    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    let rex = ManagedObject::new("d1", ["name"]).property("name", "Rex");
    people.attach(&ada).unwrap();
    pets.attach(&rex).unwrap();
    people.put(&ada).unwrap();
    pets.put(&rex).unwrap();
    txn.run().unwrap();

    assert_eq!(transport.calls_for(Method::Patch).len(), 1);
    let body = &patch_bodies(&transport)[0];
    assert!(body.contains(r#"["p1","name","Ada"]"#));
    assert!(body.contains(r#"["d1","name","Rex"]"#));
}

#[test]
fn abort_restores_the_previous_value() {
    let (db, transport) = session();
    db.create_object_store("items").unwrap();
    let item = ManagedObject::new("i1", ["p"]).property("p", "x");
    commit_clean(&db, "items", &item);

    let txn = db.transaction(&["items"], TransactionMode::ReadWrite).unwrap();
    item.set("p", "y").unwrap();
    let request = txn.object_store("items").unwrap().put(&item).unwrap();
    txn.abort().unwrap();

    assert_eq!(item.get("p"), Some("x".into()));
    assert!(item.deltas().is_empty());
    assert!(matches!(
        request.error(),
        Some(CoreError::TransactionAborted { .. })
    ));
    assert_eq!(transport.calls_for(Method::Patch).len(), 1);
}

#[test]
fn reads_build_clean_objects_from_the_remote_graph() {
    let (db, transport) = session();
    transport.push_response(
        Method::Get,
        Response::ok()
            .with_etag("r1")
            .with_body(
                "application/json",
                br#"[["p1","name","Ada"],["p1","knows",{"@id":"p2"}],["p1","knows",{"@id":"p3"}]]"#
                    .to_vec(),
            ),
    );
    let people = db.create_object_store("people").unwrap();
    let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

    let request = people.get("p1").unwrap();
    txn.run().unwrap();

    let ada = request.result().and_then(|r| r.object().cloned()).unwrap();
    assert_eq!(ada.state(), ObjectState::Clean);
    assert_eq!(ada.get("name"), Some("Ada".into()));
    assert_eq!(
        ada.get("knows").map(|v| v.to_term()),
        Some(Term::List(vec![Term::node("p2"), Term::node("p3")]))
    );
    assert!(transport.calls_for(Method::Patch).is_empty());
    assert_eq!(txn.state(), TransactionState::Committed);
}

#[test]
fn read_only_transactions_reject_writes() {
    let (db, _) = session();
    let people = db.create_object_store("people").unwrap();
    db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

    let err = people.put(&ManagedObject::new("p1", ["name"])).unwrap_err();
    assert_eq!(err, CoreError::read_only("people"));
}

#[test]
fn read_only_transactions_never_send_changes() {
    let (db, transport) = session();
    transport.push_response(
        Method::Get,
        Response::ok().with_body("application/json", br#"[["p1","name","Ada"]]"#.to_vec()),
    );
    let people = db.create_object_store("people").unwrap();
    let txn = db.transaction(&["people"], TransactionMode::ReadOnly).unwrap();

    let request = people.get("p1").unwrap();
    request
        .on_success(|result| {
            if let Some(ada) = result.object() {
                ada.set("name", "Mallory")?;
            }
            Ok(())
        })
        .unwrap();
    let commit = txn.run().unwrap().unwrap();

    assert!(transport.calls_for(Method::Patch).is_empty());
    assert_eq!(commit.error(), Some(CoreError::read_only("people")));
    assert_eq!(txn.state(), TransactionState::Aborted);
    let ada = request.result().and_then(|r| r.object().cloned()).unwrap();
    assert_eq!(ada.get("name"), Some("Ada".into()));
    assert!(ada.deltas().is_empty());
}

#[test]
fn requests_queued_by_callbacks_delay_the_commit() {
    let (db, transport) = session();
    let people = db.create_object_store("people").unwrap();
    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();

    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    let grace = ManagedObject::new("p2", ["name"]).property("name", "Grace");
    people.attach(&ada).unwrap();
    people.attach(&grace).unwrap();

    let store = people.clone();
    let follow_up = grace.clone();
    people
        .put(&ada)
        .unwrap()
        .on_success(move |_| store.put(&follow_up).map(|_| ()))
        .unwrap();

    assert!(people.process_next().unwrap());
    assert!(transport.calls_for(Method::Patch).is_empty());
    assert_eq!(people.pending_requests(), 1);
    assert!(txn.is_open());

    assert!(people.process_next().unwrap());
    let bodies = patch_bodies(&transport);
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains(r#"["p1","name","Ada"]"#));
    assert!(bodies[0].contains(r#"["p2","name","Grace"]"#));
    assert_eq!(txn.state(), TransactionState::Committed);
}

#[test]
fn committed_revisions_chain() {
    let (db, transport) = session();
    transport.push_response(Method::Patch, Response::new(204).with_etag("r1"));
    transport.push_response(Method::Patch, Response::new(204).with_etag("r2"));
    db.create_object_store("people").unwrap();

    let ada = ManagedObject::new("p1", ["name"]).property("name", "Ada");
    commit_clean(&db, "people", &ada);
    assert_eq!(db.revision().as_str(), "r1");

    let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
    ada.set("name", "Ada Lovelace").unwrap();
    txn.object_store("people").unwrap().put(&ada).unwrap();
    txn.run().unwrap();

    assert_eq!(db.revision().as_str(), "r2");
    let revisions = db.revisions();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[1].revision, *txn.revision_id());
    let second = &transport.calls_for(Method::Patch)[1];
    assert_eq!(second.options.if_match.as_deref(), Some("r1"));
}

fn property_value() -> impl Strategy<Value = Term> {
    prop_oneof![
        any::<i64>().prop_map(Term::from),
        any::<bool>().prop_map(Term::from),
        "[a-z]{1,8}".prop_map(Term::from),
    ]
}

proptest! {
    #[test]
    fn new_objects_post_one_statement_per_value(
        values in proptest::collection::btree_map("[a-z]{1,6}", property_value(), 1..6)
    ) {
        let object = values.iter().fold(
            ManagedObject::new("x", values.keys().cloned()),
            |object, (name, value)| object.property(name.as_str(), value.clone()),
        );

        let patch = object.as_patch();
        prop_assert_eq!(patch.post.len(), values.len());
        for (name, value) in &values {
            let statement = Statement::new("x", name.as_str(), value.clone());
            prop_assert!(patch.posts(&statement));
        }
    }

    #[test]
    fn rollback_restores_committed_values(
        original in property_value(),
        changes in proptest::collection::vec(property_value(), 1..5),
    ) {
        let (db, _) = session();
        db.create_object_store("items").unwrap();
        let item = ManagedObject::new("i1", ["p"]).property("p", original.clone());
        commit_clean(&db, "items", &item);

        let txn = db.transaction(&["items"], TransactionMode::ReadWrite).unwrap();
        for change in changes {
            item.set("p", change).unwrap();
        }
        txn.abort().unwrap();

        prop_assert_eq!(item.get("p").map(|v| v.to_term()), Some(original));
        prop_assert!(item.deltas().is_empty());
    }
}

//! The managed object handle.

use super::{Delta, ObjectState, PropertyValue};
use crate::config::UnknownPropertyPolicy;
use crate::error::{CoreError, CoreResult};
use crate::types::{ObjectId, TransactionId};
use graphsync_codec::{DeltaMap, Patch, Prototype, Statement};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// An application entity whose persistent properties are tracked.
///
/// `ManagedObject` is a cheap-clone handle: clones refer to the same
/// object. Every write goes through [`set`](Self::set), which applies the
/// lifecycle rules and records deltas while the object is attached to a
/// store.
#[derive(Clone)]
pub struct ManagedObject {
    cell: Arc<ObjectCell>,
}

struct ObjectCell {
    id: ObjectId,
    data: RwLock<ObjectData>,
}

struct ObjectData {
    state: ObjectState,
    /// Declared persistent properties, in declaration order.
    managed: Vec<String>,
    properties: BTreeMap<String, PropertyValue>,
    deltas: BTreeMap<String, Delta>,
    store: Option<String>,
    transaction: Option<TransactionId>,
    policy: UnknownPropertyPolicy,
}

impl ObjectData {
    fn is_managed(&self, name: &str) -> bool {
        self.managed.iter().any(|m| m == name)
    }

    fn current(&self, name: &str) -> PropertyValue {
        self.properties.get(name).cloned().unwrap_or_default()
    }

    fn statements(&self, id: &ObjectId) -> Vec<Statement> {
        let mut out = Vec::new();
        for name in &self.managed {
            if let Some(value) = self.properties.get(name) {
                for term in value.to_terms() {
                    out.push(Statement::new(id.as_str(), name.as_str(), term));
                }
            }
        }
        out
    }

    fn restore_originals(&mut self) {
        for (name, delta) in std::mem::take(&mut self.deltas) {
            self.properties.insert(name, delta.old);
        }
    }
}

impl ManagedObject {
    /// Creates a new, detached object with the given persistent properties.
    pub fn new<I, S>(id: impl Into<ObjectId>, managed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parts(
            id.into(),
            ObjectState::New,
            managed.into_iter().map(Into::into).collect(),
            BTreeMap::new(),
        )
    }

    /// Creates a clean object from state reported by the remote service.
    pub(crate) fn from_remote(id: ObjectId, values: &DeltaMap, policy: UnknownPropertyPolicy) -> Self {
        let object = Self::from_parts(
            id,
            ObjectState::Clean,
            values.keys().cloned().collect(),
            values
                .iter()
                .map(|(name, term)| (name.clone(), PropertyValue::Term(term.clone())))
                .collect(),
        );
        object.cell.data.write().policy = policy;
        object
    }

    fn from_parts(
        id: ObjectId,
        state: ObjectState,
        managed: Vec<String>,
        properties: BTreeMap<String, PropertyValue>,
    ) -> Self {
        Self {
            cell: Arc::new(ObjectCell {
                id,
                data: RwLock::new(ObjectData {
                    state,
                    managed,
                    properties,
                    deltas: BTreeMap::new(),
                    store: None,
                    transaction: None,
                    policy: UnknownPropertyPolicy::default(),
                }),
            }),
        }
    }

    /// Sets the unknown property policy.
    #[must_use]
    pub fn with_policy(self, policy: UnknownPropertyPolicy) -> Self {
        self.cell.data.write().policy = policy;
        self
    }

    /// Sets an initial value, declaring the property if needed.
    ///
    /// Intended for construction; the value is recorded without any
    /// lifecycle effect.
    #[must_use]
    pub fn property(self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        {
            let mut data = self.cell.data.write();
            let name = name.into();
            if !data.is_managed(&name) {
                data.managed.push(name.clone());
            }
            data.properties.insert(name, value.into());
        }
        self
    }

    /// Returns the identifier.
    pub fn id(&self) -> &ObjectId {
        &self.cell.id
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ObjectState {
        self.cell.data.read().state
    }

    /// Returns the name of the owning store, if attached.
    pub fn store_name(&self) -> Option<String> {
        self.cell.data.read().store.clone()
    }

    /// Returns true if the object is attached to a store.
    pub fn is_attached(&self) -> bool {
        self.cell.data.read().store.is_some()
    }

    /// Returns the transaction active when the object was last bound.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.cell.data.read().transaction
    }

    /// Returns the declared persistent property names.
    pub fn managed_properties(&self) -> Vec<String> {
        self.cell.data.read().managed.clone()
    }

    /// Returns the unknown property policy.
    pub fn policy(&self) -> UnknownPropertyPolicy {
        self.cell.data.read().policy
    }

    /// Reads a property. Reading has no lifecycle effect.
    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.cell.data.read().properties.get(name).cloned()
    }

    /// Writes a persistent property.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the object is deleted, and `Data` for an
    /// undeclared property when the policy is `Reject`.
    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> CoreResult<()> {
        let value = value.into();
        let mut data = self.cell.data.write();

        if !data.is_managed(name) {
            return match data.policy {
                UnknownPropertyPolicy::Ignore => {
                    trace!(object = %self.cell.id, property = name, "ignoring unmanaged write");
                    Ok(())
                }
                UnknownPropertyPolicy::Reject => Err(CoreError::data(format!(
                    "{name} is not a managed property of {}",
                    self.cell.id
                ))),
            };
        }

        let attached = data.store.is_some();
        let state = data.state;
        match state {
            ObjectState::Deleted => {
                return Err(CoreError::invalid_state(format!(
                    "object {} is deleted",
                    self.cell.id
                )));
            }
            ObjectState::New => {}
            ObjectState::Clean => {
                data.state = ObjectState::Modified;
                if attached {
                    let old = data.current(name);
                    if old != value {
                        data.deltas
                            .insert(name.to_string(), Delta::new(value.clone(), old));
                    }
                }
            }
            ObjectState::Modified => {
                if attached {
                    let reverted = data.deltas.get(name).map(|delta| delta.old == value);
                    match reverted {
                        // Back to the original: the object stays Modified.
                        Some(true) => {
                            data.deltas.remove(name);
                        }
                        Some(false) => {
                            if let Some(delta) = data.deltas.get_mut(name) {
                                delta.new = value.clone();
                            }
                        }
                        None => {
                            let old = data.current(name);
                            if old != value {
                                data.deltas
                                    .insert(name.to_string(), Delta::new(value.clone(), old));
                            }
                        }
                    }
                }
            }
        }

        trace!(object = %self.cell.id, property = name, state = %data.state, "write");
        data.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns a copy of the pending deltas.
    pub fn deltas(&self) -> BTreeMap<String, Delta> {
        self.cell.data.read().deltas.clone()
    }

    /// Returns the pending delta for one property.
    pub fn delta(&self, name: &str) -> Option<Delta> {
        self.cell.data.read().deltas.get(name).cloned()
    }

    /// Computes the statements needed to bring the remote graph in line
    /// with this object.
    pub fn as_patch(&self) -> Patch {
        let id = &self.cell.id;
        let data = self.cell.data.read();
        match data.state {
            ObjectState::Clean => Patch::new(),
            ObjectState::New => Patch::posting(data.statements(id)),
            ObjectState::Deleted => Patch::deleting(data.statements(id)),
            ObjectState::Modified => {
                let mut patch = Patch::new();
                for (name, delta) in &data.deltas {
                    for term in delta.old.to_terms() {
                        patch.delete.push(Statement::new(id.as_str(), name.as_str(), term));
                    }
                    for term in delta.new.to_terms() {
                        patch.post.push(Statement::new(id.as_str(), name.as_str(), term));
                    }
                }
                patch
            }
        }
    }

    /// Restores every changed property to its original value and clears
    /// the deltas.
    pub fn rollback(&self) {
        let mut data = self.cell.data.write();
        data.restore_originals();
        if data.state == ObjectState::Modified {
            data.state = ObjectState::Clean;
        }
    }

    /// Applies values reported by the remote service and marks the object
    /// clean.
    pub fn rollforward(&self, values: &DeltaMap) {
        let mut data = self.cell.data.write();
        for (name, term) in values {
            // Keep live children whose identifiers are unchanged.
            if data.current(name).to_term() == *term {
                continue;
            }
            if !data.is_managed(name) {
                data.managed.push(name.clone());
            }
            data.properties
                .insert(name.clone(), PropertyValue::Term(term.clone()));
        }
        data.deltas.clear();
        data.state = ObjectState::Clean;
    }

    /// Builds a query-by-example prototype from the non-empty properties.
    pub fn to_prototype(&self) -> Prototype {
        let data = self.cell.data.read();
        data.managed
            .iter()
            .filter_map(|name| data.properties.get(name).map(|value| (name, value)))
            .filter(|(_, value)| !value.is_empty())
            .fold(Prototype::new(), |proto, (name, value)| {
                proto.property(name.as_str(), value.to_term())
            })
    }

    /// Returns true if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ManagedObject) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn bind(&self, store: &str, transaction: Option<TransactionId>) {
        let mut data = self.cell.data.write();
        data.store = Some(store.to_string());
        data.transaction = transaction;
    }

    pub(crate) fn set_transaction(&self, transaction: Option<TransactionId>) {
        self.cell.data.write().transaction = transaction;
    }

    pub(crate) fn belongs_to(&self, store: &str) -> bool {
        self.cell.data.read().store.as_deref() == Some(store)
    }

    /// Detached objects start over as new.
    pub(crate) fn reset(&self) {
        let mut data = self.cell.data.write();
        data.state = ObjectState::New;
        data.store = None;
        data.transaction = None;
        data.deltas.clear();
    }

    pub(crate) fn mark_clean(&self) {
        let mut data = self.cell.data.write();
        data.state = ObjectState::Clean;
        data.deltas.clear();
        data.transaction = None;
    }

    /// Deletion retracts what the remote side holds, so pending writes
    /// are undone first.
    pub(crate) fn mark_deleted(&self) {
        let mut data = self.cell.data.write();
        data.restore_originals();
        data.state = ObjectState::Deleted;
    }

    pub(crate) fn children(&self) -> Vec<ManagedObject> {
        let data = self.cell.data.read();
        data.managed
            .iter()
            .filter_map(|name| data.properties.get(name))
            .flat_map(PropertyValue::children)
            .collect()
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.cell.data.read();
        f.debug_struct("ManagedObject")
            .field("id", &self.cell.id)
            .field("state", &data.state)
            .field("store", &data.store)
            .field("properties", &data.properties)
            .finish()
    }
}

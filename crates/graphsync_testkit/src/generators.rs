//! Property-based test generators using proptest.
//!
//! Provides strategies for generating identifiers, terms, statements,
//! patches and managed objects.

use graphsync_codec::{Graph, Patch, Statement, Term};
use graphsync_core::ManagedObject;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating relative object identifiers.
pub fn object_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for generating property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z]{0,11}").expect("Invalid regex")
}

/// Strategy for generating literal terms.
pub fn literal_strategy() -> impl Strategy<Value = Term> {
    prop_oneof![
        any::<bool>().prop_map(Term::Bool),
        any::<i64>().prop_map(Term::Integer),
        "[ -~]{1,16}".prop_map(Term::Text),
    ]
}

/// Strategy for generating any non-empty term, including node
/// references and lists.
pub fn term_strategy() -> impl Strategy<Value = Term> {
    prop_oneof![
        4 => literal_strategy(),
        1 => object_id_strategy().prop_map(Term::node),
        1 => prop::collection::vec(literal_strategy(), 1..4).prop_map(Term::List),
    ]
}

/// Strategy for generating statements with single-valued objects.
pub fn statement_strategy() -> impl Strategy<Value = Statement> {
    (
        object_id_strategy(),
        property_name_strategy(),
        prop_oneof![
            3 => literal_strategy(),
            1 => object_id_strategy().prop_map(Term::node),
        ],
    )
        .prop_map(|(subject, property, value)| Statement::new(subject, property, value))
}

/// Strategy for generating graphs.
pub fn graph_strategy(max_statements: usize) -> impl Strategy<Value = Graph> {
    prop::collection::vec(statement_strategy(), 0..max_statements).prop_map(Graph::from_statements)
}

/// Strategy for generating patches.
pub fn patch_strategy() -> impl Strategy<Value = Patch> {
    (
        prop::collection::vec(statement_strategy(), 0..6),
        prop::collection::vec(statement_strategy(), 0..3),
        prop::collection::vec(statement_strategy(), 0..6),
    )
        .prop_map(|(post, put, delete)| Patch { post, put, delete })
}

/// Strategy for generating property maps with literal values.
pub fn properties_strategy(max_properties: usize) -> impl Strategy<Value = BTreeMap<String, Term>> {
    prop::collection::btree_map(property_name_strategy(), literal_strategy(), 1..max_properties)
}

/// Strategy for generating new, unattached objects whose every property
/// is managed and set.
pub fn object_strategy() -> impl Strategy<Value = ManagedObject> {
    (object_id_strategy(), properties_strategy(6)).prop_map(|(id, properties)| {
        properties.iter().fold(
            ManagedObject::new(id, properties.keys().cloned()),
            |object, (name, value)| object.property(name.as_str(), value.clone()),
        )
    })
}

/// An edit applied to a managed object.
#[derive(Debug, Clone)]
pub enum ObjectEdit {
    /// Set a property.
    Set {
        /// Property name.
        name: String,
        /// New value.
        value: Term,
    },
    /// Clear a property.
    Clear {
        /// Property name.
        name: String,
    },
}

impl ObjectEdit {
    /// Applies the edit, ignoring the result.
    pub fn apply(&self, object: &ManagedObject) {
        let _ = match self {
            ObjectEdit::Set { name, value } => object.set(name, value.clone()),
            ObjectEdit::Clear { name } => object.set(name, Term::Null),
        };
    }
}

/// Strategy for generating edits over a fixed set of property names.
pub fn edit_strategy(names: Vec<String>) -> impl Strategy<Value = ObjectEdit> {
    let pick = prop::sample::select(names);
    prop_oneof![
        3 => (pick.clone(), literal_strategy())
            .prop_map(|(name, value)| ObjectEdit::Set { name, value }),
        1 => pick.prop_map(|name| ObjectEdit::Clear { name }),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

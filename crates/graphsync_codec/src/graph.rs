//! Decoded graphs and per-subject delta extraction.

use crate::patch::Statement;
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// New property values for one subject, keyed by property name.
pub type DeltaMap = BTreeMap<String, Term>;

/// A decoded set of statements returned by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    statements: Vec<Statement>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph from statements.
    pub fn from_statements(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Returns the number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if the graph has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Iterates over all statements.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Returns every subject in first-seen order.
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for st in &self.statements {
            if !seen.contains(&st.subject()) {
                seen.push(st.subject());
            }
        }
        seen
    }

    /// Groups the graph into one delta map per subject.
    ///
    /// A property asserted more than once for the same subject becomes a
    /// [`Term::List`] in assertion order. When a prototype is given only
    /// subjects it matches are returned.
    pub fn deltas(&self, prototype: Option<&Prototype>) -> Vec<(String, DeltaMap)> {
        let mut grouped: Vec<(String, DeltaMap)> = Vec::new();

        for st in &self.statements {
            let index = match grouped.iter().position(|(s, _)| s == st.subject()) {
                Some(i) => i,
                None => {
                    grouped.push((st.subject().to_string(), DeltaMap::new()));
                    grouped.len() - 1
                }
            };
            let map = &mut grouped[index].1;
            match map.remove(st.property()) {
                None => {
                    map.insert(st.property().to_string(), st.value().clone());
                }
                Some(Term::List(mut items)) => {
                    items.push(st.value().clone());
                    map.insert(st.property().to_string(), Term::List(items));
                }
                Some(previous) => {
                    map.insert(
                        st.property().to_string(),
                        Term::List(vec![previous, st.value().clone()]),
                    );
                }
            }
        }

        match prototype {
            Some(proto) => grouped
                .into_iter()
                .filter(|(subject, map)| proto.matches(subject, map))
                .collect(),
            None => grouped,
        }
    }
}

impl FromIterator<Statement> for Graph {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self::from_statements(iter.into_iter().collect())
    }
}

impl IntoIterator for Graph {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

/// A query-by-example key.
///
/// A subject matches when its identifier equals `id` (if set) and it
/// carries every constrained property with an equal value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prototype {
    /// Required identifier, if any.
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Required property values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Term>,
}

impl Prototype {
    /// Creates an unconstrained prototype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a prototype matching a single identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property constraint.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Term>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns true if the subject satisfies this prototype.
    pub fn matches(&self, subject: &str, values: &DeltaMap) -> bool {
        if let Some(id) = &self.id {
            if id != subject {
                return false;
            }
        }
        self.properties.iter().all(|(name, expected)| match values.get(name) {
            Some(Term::List(items)) => items.contains(expected),
            Some(actual) => actual == expected,
            None => expected.is_empty(),
        })
    }
}

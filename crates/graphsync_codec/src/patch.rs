//! Statements and patches.

use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `(subject, property, value)` statement.
///
/// Serializes as a three-element array, which is the stable wire shape
/// shared with the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement(pub String, pub String, pub Term);

impl Statement {
    /// Creates a new statement.
    pub fn new(subject: impl Into<String>, property: impl Into<String>, value: impl Into<Term>) -> Self {
        Self(subject.into(), property.into(), value.into())
    }

    /// Returns the subject identifier.
    pub fn subject(&self) -> &str {
        &self.0
    }

    /// Returns the property name.
    pub fn property(&self) -> &str {
        &self.1
    }

    /// Returns the value term.
    pub fn value(&self) -> &Term {
        &self.2
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {} {}", self.0, self.1, self.2)
    }
}

/// A set of pending changes against the remote graph.
///
/// - `post` asserts new statements
/// - `put` asserts statements that replace prior state for their key
/// - `delete` retracts statements
///
/// Empty lists are omitted on the wire, so an empty patch encodes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Statements to assert.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<Statement>,
    /// Statements to assert, replacing prior state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub put: Vec<Statement>,
    /// Statements to retract.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Statement>,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a patch that only asserts the given statements.
    #[must_use]
    pub fn posting(statements: Vec<Statement>) -> Self {
        Self {
            post: statements,
            ..Self::default()
        }
    }

    /// Creates a patch that only retracts the given statements.
    #[must_use]
    pub fn deleting(statements: Vec<Statement>) -> Self {
        Self {
            delete: statements,
            ..Self::default()
        }
    }

    /// Returns true if the patch carries no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.post.is_empty() && self.put.is_empty() && self.delete.is_empty()
    }

    /// Returns the total number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.post.len() + self.put.len() + self.delete.len()
    }

    /// Moves every statement of `other` onto the end of this patch.
    pub fn append(&mut self, mut other: Patch) {
        self.post.append(&mut other.post);
        self.put.append(&mut other.put);
        self.delete.append(&mut other.delete);
    }

    /// Returns true if `post` contains the given statement.
    #[must_use]
    pub fn posts(&self, statement: &Statement) -> bool {
        self.post.contains(statement)
    }

    /// Returns true if `delete` contains the given statement.
    #[must_use]
    pub fn deletes(&self, statement: &Statement) -> bool {
        self.delete.contains(statement)
    }

    /// Returns every subject the patch touches, in first-seen order.
    #[must_use]
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for st in self.delete.iter().chain(&self.post).chain(&self.put) {
            if !seen.contains(&st.subject()) {
                seen.push(st.subject());
            }
        }
        seen
    }
}

impl FromIterator<Patch> for Patch {
    fn from_iter<I: IntoIterator<Item = Patch>>(iter: I) -> Self {
        let mut merged = Patch::new();
        for patch in iter {
            merged.append(patch);
        }
        merged
    }
}

//! Dynamic statement value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to another subject in the graph.
///
/// Rendered on the wire as `{"@id": "<identifier>"}` so that a node
/// reference can never be confused with a text literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Identifier of the referenced subject.
    #[serde(rename = "@id")]
    pub id: String,
}

/// The value position of a statement.
///
/// Floats are intentionally not supported: a value that round-trips
/// through the remote store must compare equal to itself, which rules
/// out NaN and lossy decimal renderings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    /// Absent value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal (full i64 range).
    Integer(i64),
    /// Text literal.
    Text(String),
    /// Reference to another subject.
    Node(NodeRef),
    /// Multi-valued property.
    List(Vec<Term>),
}

impl Term {
    /// Creates a node reference term.
    pub fn node(id: impl Into<String>) -> Self {
        Term::Node(NodeRef { id: id.into() })
    }

    /// Creates a literal term from anything convertible.
    pub fn literal(value: impl Into<Term>) -> Self {
        value.into()
    }

    /// Returns true if this term carries no value.
    ///
    /// Empty terms are never emitted as statements.
    pub fn is_empty(&self) -> bool {
        match self {
            Term::Null => true,
            Term::List(items) => items.is_empty(),
            Term::Bool(_) | Term::Integer(_) | Term::Text(_) | Term::Node(_) => false,
        }
    }

    /// Returns the referenced identifier if this is a node term.
    pub fn as_node(&self) -> Option<&str> {
        match self {
            Term::Node(node) => Some(&node.id),
            _ => None,
        }
    }

    /// Get this term as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Term::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this term as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Term::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this term as a string, if it is a text literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flattens this term into the individual values a statement carries.
    ///
    /// A list contributes one value per element; anything else is a
    /// single value. Empty values are skipped.
    pub fn flatten(&self) -> Vec<Term> {
        match self {
            Term::List(items) => items.iter().flat_map(Term::flatten).collect(),
            other if other.is_empty() => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

impl Default for Term {
    fn default() -> Self {
        Term::Null
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Null => write!(f, "null"),
            Term::Bool(b) => write!(f, "{b}"),
            Term::Integer(n) => write!(f, "{n}"),
            Term::Text(s) => write!(f, "{s:?}"),
            Term::Node(node) => write!(f, "<{}>", node.id),
            Term::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Bool(b)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Integer(n)
    }
}

impl From<i32> for Term {
    fn from(n: i32) -> Self {
        Term::Integer(i64::from(n))
    }
}

impl From<u32> for Term {
    fn from(n: u32) -> Self {
        Term::Integer(i64::from(n))
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Text(s)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Text(s.to_string())
    }
}

impl From<NodeRef> for Term {
    fn from(node: NodeRef) -> Self {
        Term::Node(node)
    }
}

impl<T: Into<Term>> From<Vec<T>> for Term {
    fn from(v: Vec<T>) -> Self {
        Term::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Term>> From<Option<T>> for Term {
    fn from(v: Option<T>) -> Self {
        v.map_or(Term::Null, Into::into)
    }
}

impl From<()> for Term {
    fn from((): ()) -> Self {
        Term::Null
    }
}

//! Live property values.

use super::ManagedObject;
use graphsync_codec::Term;
use std::fmt;

/// The value of a managed property.
///
/// Scalars and references-by-id are plain [`Term`]s. Live children are
/// held as handles so that attaching the parent reaches them.
#[derive(Clone)]
pub enum PropertyValue {
    /// A wire term.
    Term(Term),
    /// A single child object.
    Object(ManagedObject),
    /// An array of child objects.
    Objects(Vec<ManagedObject>),
}

impl PropertyValue {
    /// The empty value.
    pub const NULL: PropertyValue = PropertyValue::Term(Term::Null);

    /// Returns true if the value would produce no statements.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Term(term) => term.is_empty(),
            Self::Object(_) => false,
            Self::Objects(items) => items.is_empty(),
        }
    }

    /// Returns the term if this is a plain value.
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Self::Term(term) => Some(term),
            _ => None,
        }
    }

    /// Returns the child if this holds a single object.
    pub fn as_object(&self) -> Option<&ManagedObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the text if this is a text literal.
    pub fn as_text(&self) -> Option<&str> {
        self.as_term().and_then(Term::as_text)
    }

    /// Returns the integer if this is an integer literal.
    pub fn as_integer(&self) -> Option<i64> {
        self.as_term().and_then(Term::as_integer)
    }

    /// The terms this value contributes to statements, one per element.
    ///
    /// Children are referenced by identifier.
    pub fn to_terms(&self) -> Vec<Term> {
        match self {
            Self::Term(term) => term.flatten(),
            Self::Object(object) => vec![Term::node(object.id().as_str())],
            Self::Objects(items) => items
                .iter()
                .map(|object| Term::node(object.id().as_str()))
                .collect(),
        }
    }

    /// The term this value is stored as remotely.
    pub fn to_term(&self) -> Term {
        match self {
            Self::Term(term) => term.clone(),
            Self::Object(object) => Term::node(object.id().as_str()),
            Self::Objects(_) => Term::List(self.to_terms()),
        }
    }

    pub(crate) fn children(&self) -> Vec<ManagedObject> {
        match self {
            Self::Term(_) => Vec::new(),
            Self::Object(object) => vec![object.clone()],
            Self::Objects(items) => items.clone(),
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::NULL
    }
}

// Children compare by identity, not by content.
impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Term(a), Self::Term(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Objects(a), Self::Objects(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "Term({term})"),
            Self::Object(object) => write!(f, "Object({})", object.id()),
            Self::Objects(items) => f
                .debug_list()
                .entries(items.iter().map(|object| object.id().to_string()))
                .finish(),
        }
    }
}

impl From<Term> for PropertyValue {
    fn from(term: Term) -> Self {
        Self::Term(term)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Term(Term::from(s))
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Term(Term::from(s))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Term(Term::from(b))
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Term(Term::from(n))
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        Self::Term(Term::from(n))
    }
}

impl From<ManagedObject> for PropertyValue {
    fn from(object: ManagedObject) -> Self {
        Self::Object(object)
    }
}

impl From<&ManagedObject> for PropertyValue {
    fn from(object: &ManagedObject) -> Self {
        Self::Object(object.clone())
    }
}

impl From<Vec<ManagedObject>> for PropertyValue {
    fn from(objects: Vec<ManagedObject>) -> Self {
        Self::Objects(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values() {
        assert!(PropertyValue::NULL.is_empty());
        assert!(PropertyValue::Objects(vec![]).is_empty());
        assert!(PropertyValue::Term(Term::List(vec![])).is_empty());
        assert!(!PropertyValue::from("x").is_empty());
        assert!(!PropertyValue::from(ManagedObject::new("c", ["n"])).is_empty());
    }

    #[test]
    fn children_render_as_node_terms() {
        let a = ManagedObject::new("a", ["n"]);
        let b = ManagedObject::new("b", ["n"]);
        let value = PropertyValue::from(vec![a, b]);
        assert_eq!(value.to_terms(), vec![Term::node("a"), Term::node("b")]);
        assert_eq!(
            value.to_term(),
            Term::List(vec![Term::node("a"), Term::node("b")])
        );
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = ManagedObject::new("same", ["n"]);
        let b = ManagedObject::new("same", ["n"]);
        assert_eq!(PropertyValue::from(&a), PropertyValue::from(&a));
        assert_ne!(PropertyValue::from(&a), PropertyValue::from(&b));
        assert_ne!(PropertyValue::from("same"), PropertyValue::from(&a));
    }
}

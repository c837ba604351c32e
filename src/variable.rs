//! Definition of the variable module
//!
//! A `Variable` represents a discrete random variable in a Probabilistic Graphical Model. The
//! `Variable` itself is only a handle: two handles are the same variable if and only if they were
//! cloned from the same original, regardless of their names or domains.

use crate::util::{BayesError, Result};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Source of the process-unique identifiers of `Variable`s
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct VariableInner {
    /// unique identity of the variable
    id: usize,

    /// user facing name, used for diagnostics and name collisions
    name: String,

    /// the labels of the values of the variable. The number of labels is the domain size.
    labels: Vec<String>,
}

/// A discrete random variable.
///
/// `Variable`s are cheap to clone. Equality and hashing use the identity of the handle, so two
/// variables created separately with the same name and domain are still distinct.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableInner>,
}

impl Variable {

    /// Construct a new binary `Variable`, with labels `0` and `1`
    pub fn binary(name: &str) -> Self {
        Variable::discrete(name, 2)
    }

    /// Construct a new `Variable` with `cardinality` values labelled `0...cardinality - 1`
    ///
    /// # Panics
    /// if `cardinality` is zero. A variable must have at least one value.
    pub fn discrete(name: &str, cardinality: usize) -> Self {
        assert!(cardinality > 0, "a Variable must have at least one value");
        let labels = (0..cardinality).map(|i| i.to_string()).collect();
        Variable::build(name, labels)
    }

    /// Construct a new `Variable` whose values are named by `labels`.
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if there are no labels
    /// * `BayesError::DuplicateElement` if a label is repeated
    pub fn labelized(name: &str, labels: &[&str]) -> Result<Self> {
        if labels.is_empty() {
            return Err(BayesError::InvalidArgument(
                format!("variable {} needs at least one label", name)
            ));
        }

        for (i, l) in labels.iter().enumerate() {
            if labels[..i].contains(l) {
                return Err(BayesError::DuplicateElement(format!("label {} of {}", l, name)));
            }
        }

        Ok(Variable::build(name, labels.iter().map(|l| l.to_string()).collect()))
    }

    fn build(name: &str, labels: Vec<String>) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Variable { inner: Arc::new(VariableInner { id, name: String::from(name), labels }) }
    }

    /// Get the unique identifier of the handle
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Get the name of the `Variable`
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the number of values the `Variable` can take
    pub fn cardinality(&self) -> usize {
        self.inner.labels.len()
    }

    /// Get the label of the `i`-th value
    pub fn label(&self, i: usize) -> Result<&str> {
        self.inner.labels
            .get(i)
            .map(|l| l.as_str())
            .ok_or_else(|| BayesError::NotFound(format!("value {} of {}", i, self.name())))
    }

    /// Get the index of the value with the given label
    pub fn index_of(&self, label: &str) -> Result<usize> {
        self.inner.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| BayesError::NotFound(format!("label {} of {}", label, self.name())))
    }

}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}<{}>#{}", self.name(), self.cardinality(), self.id())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}


// Unit Tests for the Variable struct.
#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn binary() {
        let var = Variable::binary("Foo");
        assert_eq!(var.name(), "Foo");
        assert_eq!(var.cardinality(), 2);
        assert_eq!(var.label(1).unwrap(), "1");
    }

    #[test]
    fn discrete() {
        let var = Variable::discrete("Foo", 10);
        assert_eq!(var.cardinality(), 10);
        assert_eq!(var.index_of("7").unwrap(), 7);
        assert!(var.label(10).is_err());
    }

    #[test]
    #[should_panic]
    fn discrete_empty_domain() {
        Variable::discrete("Foo", 0);
    }

    #[test]
    fn labelized() {
        let var = Variable::labelized("Foo", &["Probabilistic", "Graphical", "Models"]).unwrap();
        assert_eq!(var.cardinality(), 3);
        assert_eq!(var.index_of("Graphical").unwrap(), 1);
        assert_eq!(var.label(2).unwrap(), "Models");

        match var.index_of("FooBar") {
            Err(BayesError::NotFound(_)) => (),
            _ => panic!("wrong error type")
        };

        assert!(Variable::labelized("Bar", &[]).is_err());
        match Variable::labelized("Bar", &["x", "x"]) {
            Err(BayesError::DuplicateElement(_)) => (),
            _ => panic!("wrong error type")
        };
    }

    #[test]
    /// Identity is by handle, not by value
    fn identity() {
        let a = Variable::binary("A");
        let a2 = a.clone();
        let other = Variable::binary("A");

        assert_eq!(a, a2);
        assert_ne!(a, other);
        assert_ne!(a.id(), other.id());
    }

}

//! Defines the `Error` type for the bayes-core library

use thiserror::Error;

use std::result;

pub type Result<T> = result::Result<T, BayesError>;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum BayesError {

    /// An operation that needs a graphical model was attempted before one was attached
    #[error("No model has been attached to the inference engine")]
    NullElement,

    /// A node, variable or target that does not exist in the current model
    #[error("Undefined element: {0}")]
    UndefinedElement(String),

    /// A variable or value that was expected in a container but is absent
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Represents a variable that was present multiple times in a situation where it should only
    /// have been present once
    #[error("Duplicate element: {0}")]
    DuplicateElement(String),

    /// An operation was called with the wrong number of operands
    #[error("Invalid number of arguments: expected at least {expected}, got {got}")]
    InvalidArgumentsNumber { expected: usize, got: usize },

    /// An argument violated the preconditions of the operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A structural invariant would be violated by the operation
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    /// The inference algorithm cannot proceed with the current evidence
    #[error("Unsupported evidence: {0}")]
    UnsupportedEvidence(String),

    /// Represents the situation when we expected a CPD but did not receive one
    #[error("Requires a Conditional Probability Distribution")]
    NotACPD,

    /// Represents an attempt to initialize a variable with an incompatible Initialization
    #[error("An invalid initialization was provided")]
    InvalidInitialization,

    /// The worker pool for a parallel operation could not be created
    #[error("Unable to build worker pool: {0}")]
    ThreadPool(String),

}

impl BayesError {

    /// Shorthand for an `UndefinedElement` naming a node of the model
    pub fn undefined_node(node: usize) -> Self {
        BayesError::UndefinedElement(format!("node {} is not in the model", node))
    }

}

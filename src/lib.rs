//! Exact inference on discrete probabilistic graphical models.
//!
//! Potentials are `Factor`s over `Variable`s, walked with `Instantiation`s and combined by a
//! `TableCombination`. Bayesian and Markov networks implement `GraphicalModel`; a
//! `TargetedInference` engine answers posterior queries on them under hard or soft evidence.

pub mod changes;
pub mod config;
pub mod factor;
pub mod inference;
pub mod init;
pub mod instantiation;
pub mod model;
pub mod util;
pub mod variable;

pub use crate::config::{EliminationHeuristic, EngineConfig};
pub use crate::factor::{Factor, Reduction, TableCombination};
pub use crate::inference::{Evidence, InferenceState, TargetedInference, VariableElimination};
pub use crate::init::Initialization;
pub use crate::instantiation::Instantiation;
pub use crate::model::{GraphicalModel, NodeId, NodeSet};
pub use crate::util::{BayesError, Result};
pub use crate::variable::Variable;

//! Tunables of the inference engines

use serde::{Deserialize, Serialize};

/// Heuristic used to order the variables eliminated by `VariableElimination`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationHeuristic {
    /// Greedily eliminate the variable whose elimination yields the smallest table
    MaxCardinality,

    /// Greedily eliminate the variable adding the fewest edges to the interaction graph
    MinFill,
}

impl Default for EliminationHeuristic {
    fn default() -> Self {
        EliminationHeuristic::MaxCardinality
    }
}

/// Engine configuration.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use bayes_core::config::{EngineConfig, EliminationHeuristic};
///
/// let config = EngineConfig::default().with_threads(4).with_elimination(EliminationHeuristic::MinFill);
/// assert_eq!(4, config.threads);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the parallel routines. `0` lets rayon decide.
    pub threads: usize,

    pub elimination: EliminationHeuristic,

    /// Drop the nodes that are neither targets, evidence nor ancestors of those before
    /// eliminating
    pub prune_barren_nodes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threads: 1,
            elimination: EliminationHeuristic::default(),
            prune_barren_nodes: true,
        }
    }
}

impl EngineConfig {

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_elimination(mut self, heuristic: EliminationHeuristic) -> Self {
        self.elimination = heuristic;
        self
    }

    pub fn with_barren_pruning(mut self, prune: bool) -> Self {
        self.prune_barren_nodes = prune;
        self
    }

}

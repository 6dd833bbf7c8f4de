use thiserror::Error;

use crate::node::NodeType;

/// A structural problem found while validating a workflow graph.
///
/// Validation never stops at the first problem; [`crate::WorkflowGraph::diagnostics`]
/// collects every error so callers can surface them in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("node '{0}' has no bound component")]
  MissingComponent(String),

  #[error("node '{node_id}' is declared as {declared} but its component is a {bound}")]
  ComponentMismatch {
    node_id: String,
    declared: NodeType,
    bound: NodeType,
  },

  #[error("node '{0}' config must be a JSON object")]
  InvalidConfig(String),

  #[error("edge references unknown source node: from={from}, to={to}")]
  UnknownSource { from: String, to: String },

  #[error("edge references unknown target node: from={from}, to={to}")]
  UnknownTarget { from: String, to: String },

  #[error("no entry points found (all nodes have incoming edges)")]
  NoEntryPoints,

  #[error("workflow contains a cycle: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },
}

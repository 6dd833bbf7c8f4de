//! Runtime errors.

use braid_workflow::{ComponentError, NodeType};

use crate::context::ExecutionStatus;

/// Errors that can occur while running a workflow.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// Node not found in workflow.
  #[error("node '{node_id}' not found in workflow")]
  NodeNotFound { node_id: String },

  /// Node has no component, or one of the wrong kind.
  #[error("node '{node_id}' has no {node_type} component bound")]
  MissingComponent { node_id: String, node_type: NodeType },

  /// Arguments for a node could not be built from its config.
  #[error("invalid arguments for node '{node_id}': {message}")]
  InvalidArguments { node_id: String, message: String },

  /// An agent node ran on an engine without an agent executor.
  #[error("node '{node_id}' is an agent but no agent executor is configured")]
  AgentExecutorMissing { node_id: String },

  /// The component returned an error.
  #[error("component execution failed for node '{node_id}': {source}")]
  ComponentFailed {
    node_id: String,
    #[source]
    source: ComponentError,
  },

  /// The component panicked or its task was aborted.
  #[error("node '{node_id}' panicked: {message}")]
  NodePanicked { node_id: String, message: String },

  /// The graph has nodes but none without incoming edges.
  #[error("workflow has no entry nodes")]
  NoEntryNodes,

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl RuntimeError {
  /// The node this error belongs to, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      RuntimeError::NodeNotFound { node_id }
      | RuntimeError::MissingComponent { node_id, .. }
      | RuntimeError::InvalidArguments { node_id, .. }
      | RuntimeError::AgentExecutorMissing { node_id }
      | RuntimeError::ComponentFailed { node_id, .. }
      | RuntimeError::NodePanicked { node_id, .. } => Some(node_id),
      RuntimeError::NoEntryNodes | RuntimeError::Cancelled => None,
    }
  }
}

/// Errors raised by the execution status state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
  #[error("invalid status transition from {from} to {to}")]
  InvalidTransition {
    from: ExecutionStatus,
    to: ExecutionStatus,
  },
}

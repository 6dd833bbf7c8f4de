//! The executable side of a node.
//!
//! A [`Component`] is a closed set of capabilities, one per [`NodeType`]. The
//! variant is fixed when the node is added to the graph, so dispatch is a
//! single match instead of runtime type inspection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::node::{Node, NodeType};

/// Error returned by a component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
  /// The component ran and reported a failure.
  #[error("{message}")]
  Failed { message: String },

  /// The component rejected its arguments.
  #[error("invalid arguments: {message}")]
  InvalidArguments { message: String },
}

impl ComponentError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn invalid_arguments(message: impl Into<String>) -> Self {
    Self::InvalidArguments {
      message: message.into(),
    }
  }
}

/// Read-only view of the run handed to task components.
///
/// The variable and result tables are snapshots taken when the node's frontier
/// layer was dispatched.
#[derive(Debug, Clone)]
pub struct NodeContext {
  pub workflow_id: String,
  pub execution_id: String,
  pub variables: Map<String, Value>,
  pub node_results: HashMap<String, Value>,
  /// Cancelled when the execution is cancelled. The engine never interrupts a
  /// running node; long-running components may watch this to stop early.
  pub cancel: CancellationToken,
}

/// General-purpose node capability.
#[async_trait]
pub trait TaskComponent: Send + Sync {
  async fn execute(
    &self,
    node: &Node,
    config: &Value,
    ctx: &NodeContext,
  ) -> Result<Value, ComponentError>;
}

/// A tool invoked with the node's resolved config as arguments.
#[async_trait]
pub trait Tool: Send + Sync {
  async fn run(&self, args: Map<String, Value>) -> Result<Value, ComponentError>;
}

/// A callable invoked with the resolved `config.args` as keyword arguments.
#[async_trait]
pub trait Function: Send + Sync {
  async fn call(&self, kwargs: Map<String, Value>) -> Result<Value, ComponentError>;
}

/// Opaque handle to an agent. Execution goes through the engine's agent executor.
pub trait Agent: Send + Sync {
  fn name(&self) -> &str;
}

/// Adapts a plain closure into a [`Function`].
pub struct FnFunction<F>(F);

#[async_trait]
impl<F> Function for FnFunction<F>
where
  F: Fn(Map<String, Value>) -> Result<Value, ComponentError> + Send + Sync,
{
  async fn call(&self, kwargs: Map<String, Value>) -> Result<Value, ComponentError> {
    (self.0)(kwargs)
  }
}

/// A component bound to a node.
#[derive(Clone)]
pub enum Component {
  Task(Arc<dyn TaskComponent>),
  Tool(Arc<dyn Tool>),
  Agent(Arc<dyn Agent>),
  Function(Arc<dyn Function>),
}

impl Component {
  pub fn task(task: impl TaskComponent + 'static) -> Self {
    Self::Task(Arc::new(task))
  }

  pub fn tool(tool: impl Tool + 'static) -> Self {
    Self::Tool(Arc::new(tool))
  }

  pub fn agent(agent: impl Agent + 'static) -> Self {
    Self::Agent(Arc::new(agent))
  }

  /// Wrap a synchronous closure as a function component.
  pub fn function<F>(f: F) -> Self
  where
    F: Fn(Map<String, Value>) -> Result<Value, ComponentError> + Send + Sync + 'static,
  {
    Self::Function(Arc::new(FnFunction(f)))
  }

  /// The node type this component can serve.
  pub fn kind(&self) -> NodeType {
    match self {
      Component::Task(_) => NodeType::Task,
      Component::Tool(_) => NodeType::Tool,
      Component::Agent(_) => NodeType::Agent,
      Component::Function(_) => NodeType::Function,
    }
  }
}

impl fmt::Debug for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Component::Agent(agent) => write!(f, "Component::Agent({})", agent.name()),
      other => write!(f, "Component::{:?}", other.kind()),
    }
  }
}

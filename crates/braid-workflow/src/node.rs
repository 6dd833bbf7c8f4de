use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of work a node performs. Decides how the engine dispatches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
  /// Generic component receiving the node, its resolved config and the run context.
  Task,
  /// Tool invoked with the resolved config as its arguments.
  Tool,
  /// Agent handle executed through the engine's agent executor.
  Agent,
  /// Plain callable invoked with the resolved `config.args`.
  Function,
}

impl NodeType {
  pub fn as_str(&self) -> &'static str {
    match self {
      NodeType::Task => "task",
      NodeType::Tool => "tool",
      NodeType::Agent => "agent",
      NodeType::Function => "function",
    }
  }
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Node metadata. The executable component is bound separately in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  pub name: String,
  pub node_type: NodeType,
  /// Arbitrary configuration; string values may reference `${variable}` placeholders.
  #[serde(default = "empty_config")]
  pub config: Value,
  /// When set, the node's result is written back into the run variables under this name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_variable: Option<String>,
}

fn empty_config() -> Value {
  Value::Object(serde_json::Map::new())
}

impl Node {
  /// Create a node whose name defaults to its id and whose config is empty.
  pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
    let id = id.into();
    Self {
      name: id.clone(),
      id,
      node_type,
      config: empty_config(),
      output_variable: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Replace the node config. `null` is normalized to an empty object.
  pub fn with_config(mut self, config: Value) -> Self {
    self.config = if config.is_null() {
      empty_config()
    } else {
      config
    };
    self
  }

  pub fn with_output_variable(mut self, name: impl Into<String>) -> Self {
    self.output_variable = Some(name.into());
    self
  }
}

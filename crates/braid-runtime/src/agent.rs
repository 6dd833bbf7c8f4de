//! Agent execution collaborator.
//!
//! Agent nodes only carry an opaque [`Agent`] handle. Running it (prompting a
//! model, tool loops, and so on) is delegated to an [`AgentExecutor`] supplied
//! to the engine.

use async_trait::async_trait;
use braid_workflow::{Agent, ComponentError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The unit of work handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
  /// What the agent should do. Taken from the node's `task` or `description`
  /// config, falling back to `"Execute <node name>"`.
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_output: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<Value>,
}

/// What an agent run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
  pub success: bool,
  pub result: Value,
}

impl AgentOutcome {
  pub fn success(result: impl Into<Value>) -> Self {
    Self {
      success: true,
      result: result.into(),
    }
  }

  pub fn failure(result: impl Into<Value>) -> Self {
    Self {
      success: false,
      result: result.into(),
    }
  }

  /// The node result recorded for an agent node.
  pub fn into_value(self) -> Value {
    json!({ "success": self.success, "result": self.result })
  }
}

/// Runs agent tasks on behalf of the engine.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
  async fn execute(&self, agent: &dyn Agent, task: AgentTask)
  -> Result<AgentOutcome, ComponentError>;
}

//! Dispatching a single node to its component.

use std::sync::Arc;

use braid_workflow::{Component, ComponentError, Node, NodeContext, NodeType};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use crate::agent::{AgentExecutor, AgentTask};
use crate::error::RuntimeError;
use crate::input;

/// Everything one node needs to run, owned so it can move into a spawned task.
pub(crate) struct NodeDispatch {
  pub(crate) node: Node,
  pub(crate) component: Component,
  pub(crate) ctx: NodeContext,
  pub(crate) agent_executor: Option<Arc<dyn AgentExecutor>>,
}

impl NodeDispatch {
  #[instrument(
    name = "node_execute",
    skip(self),
    fields(
      execution_id = %self.ctx.execution_id,
      node_id = %self.node.id,
      node_type = %self.node.node_type,
    )
  )]
  pub(crate) async fn run(self) -> Result<Value, RuntimeError> {
    let resolved = input::resolve(&self.node.config, &self.ctx.variables);

    info!(
      execution_id = %self.ctx.execution_id,
      node_id = %self.node.id,
      resolved_config = %resolved,
      "node_started"
    );

    let result = self.invoke(resolved).await;

    match &result {
      Ok(output) => {
        info!(
          execution_id = %self.ctx.execution_id,
          node_id = %self.node.id,
          output = %output,
          "node_completed"
        );
      }
      Err(e) => {
        error!(
          execution_id = %self.ctx.execution_id,
          node_id = %self.node.id,
          error = %e,
          "node_failed"
        );
      }
    }

    result
  }

  async fn invoke(&self, resolved: Value) -> Result<Value, RuntimeError> {
    let node_id = &self.node.id;
    let failed = |source: ComponentError| RuntimeError::ComponentFailed {
      node_id: node_id.clone(),
      source,
    };

    match (&self.component, self.node.node_type) {
      (Component::Task(task), NodeType::Task) => task
        .execute(&self.node, &resolved, &self.ctx)
        .await
        .map_err(failed),

      (Component::Tool(tool), NodeType::Tool) => {
        let args = self.object(resolved, "config")?;
        tool.run(args).await.map_err(failed)
      }

      (Component::Function(function), NodeType::Function) => {
        let kwargs = match resolved {
          Value::Object(mut config) => match config.remove("args") {
            None | Some(Value::Null) => Map::new(),
            Some(args) => self.object(args, "config.args")?,
          },
          _ => Map::new(),
        };
        function.call(kwargs).await.map_err(failed)
      }

      (Component::Agent(agent), NodeType::Agent) => {
        let executor =
          self
            .agent_executor
            .as_ref()
            .ok_or_else(|| RuntimeError::AgentExecutorMissing {
              node_id: node_id.clone(),
            })?;

        let task = agent_task(&self.node, &resolved);
        let outcome = executor
          .execute(agent.as_ref(), task)
          .await
          .map_err(failed)?;
        Ok(outcome.into_value())
      }

      (_, node_type) => Err(RuntimeError::MissingComponent {
        node_id: node_id.clone(),
        node_type,
      }),
    }
  }

  fn object(&self, value: Value, what: &str) -> Result<Map<String, Value>, RuntimeError> {
    match value {
      Value::Object(map) => Ok(map),
      other => Err(RuntimeError::InvalidArguments {
        node_id: self.node.id.clone(),
        message: format!("{} must be an object, got {}", what, json_kind(&other)),
      }),
    }
  }
}

/// Build the agent task from a node's resolved config.
pub(crate) fn agent_task(node: &Node, resolved: &Value) -> AgentTask {
  let text = |key: &str| {
    resolved.get(key).and_then(|v| match v {
      Value::Null => None,
      Value::String(s) => Some(s.clone()),
      other => Some(other.to_string()),
    })
  };

  AgentTask {
    description: text("task")
      .or_else(|| text("description"))
      .unwrap_or_else(|| format!("Execute {}", node.name)),
    expected_output: text("expected_output"),
    context: resolved.get("context").filter(|v| !v.is_null()).cloned(),
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

//! Built-in demo workflow used by the CLI.

use async_trait::async_trait;
use braid_workflow::{
  Component, ComponentError, ConditionConfig, Node, NodeContext, NodeType, TaskComponent, Tool,
  WorkflowGraph,
};
use serde_json::{Map, Value, json};

pub const WORKFLOW_ID: &str = "demo-report";

/// Returns its arguments, tagged with where they came from.
struct Fetch;

#[async_trait]
impl Tool for Fetch {
  async fn run(&self, mut args: Map<String, Value>) -> Result<Value, ComponentError> {
    args.insert("fetched".to_string(), Value::Bool(true));
    Ok(Value::Object(args))
  }
}

/// Combines the results of upstream nodes into a report.
struct Report;

#[async_trait]
impl TaskComponent for Report {
  async fn execute(
    &self,
    node: &Node,
    config: &Value,
    ctx: &NodeContext,
  ) -> Result<Value, ComponentError> {
    let score = ctx
      .node_results
      .get("score")
      .and_then(|r| r.get("score"))
      .and_then(Value::as_u64)
      .ok_or_else(|| ComponentError::failed("score result missing"))?;

    Ok(json!({
      "title": config.get("title").cloned().unwrap_or(Value::Null),
      "summary": ctx.variables.get("summary").cloned().unwrap_or(Value::Null),
      "score": score,
      "ready": score > 3,
      "written_by": node.name,
    }))
  }
}

/// `fetch -> {summarize, score} -> report -> publish (when ready)`.
pub fn workflow() -> WorkflowGraph {
  let mut graph = WorkflowGraph::new(WORKFLOW_ID);

  graph
    .add_node(
      "fetch",
      Component::tool(Fetch),
      NodeType::Tool,
      json!({"topic": "${topic}", "source": "demo"}),
    )
    .insert_node(
      Node::new("summarize", NodeType::Function)
        .with_config(json!({"args": {"text": "Notes on ${topic}"}}))
        .with_output_variable("summary"),
      Component::function(|kwargs| {
        let text = kwargs.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(json!(text.to_uppercase()))
      }),
    )
    .add_node(
      "score",
      Component::function(|kwargs| {
        let topic = kwargs.get("topic").and_then(Value::as_str).unwrap_or_default();
        Ok(json!({"score": topic.split_whitespace().count()}))
      }),
      NodeType::Function,
      json!({"args": {"topic": "${topic}"}}),
    )
    .insert_node(
      Node::new("report", NodeType::Task)
        .with_name("Report writer")
        .with_config(json!({"title": "Report: ${topic}"})),
      Component::task(Report),
    )
    .add_node(
      "publish",
      Component::function(|kwargs| Ok(json!({"published": kwargs}))),
      NodeType::Function,
      json!({"args": {"channel": "${channel}"}}),
    )
    .add_edge("fetch", "summarize")
    .add_edge("fetch", "score")
    .add_edge("summarize", "report")
    .add_edge("score", "report")
    .add_conditional_edge("report", "publish", ConditionConfig::field_equals("ready", true));

  graph
}

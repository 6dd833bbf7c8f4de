use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::Component;
use crate::condition::{self, ConditionConfig, Predicate};
use crate::edge::{Edge, edge_key};
use crate::error::WorkflowError;
use crate::node::{Node, NodeType};
use crate::topology::Topology;

/// A workflow: typed nodes, their bound components, and conditional edges.
///
/// The graph is built once and then shared read-only (`Arc<WorkflowGraph>`)
/// by every run of the workflow.
#[derive(Clone)]
pub struct WorkflowGraph {
  workflow_id: String,
  nodes: IndexMap<String, Node>,
  components: HashMap<String, Component>,
  edges: Vec<Edge>,
  predicates: HashMap<String, Predicate>,
}

impl WorkflowGraph {
  pub fn new(workflow_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      nodes: IndexMap::new(),
      components: HashMap::new(),
      edges: Vec::new(),
      predicates: HashMap::new(),
    }
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  /// Add a node and bind its component.
  ///
  /// Re-adding an id replaces the node and its component but keeps its
  /// original position.
  pub fn add_node(
    &mut self,
    id: impl Into<String>,
    component: Component,
    node_type: NodeType,
    config: Value,
  ) -> &mut Self {
    let node = Node::new(id, node_type).with_config(config);
    self.insert_node(node, component)
  }

  /// Add a fully built node (custom name, output variable).
  pub fn insert_node(&mut self, node: Node, component: Component) -> &mut Self {
    self.components.insert(node.id.clone(), component);
    self.nodes.insert(node.id.clone(), node);
    self
  }

  /// Add an unconditional edge.
  pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>) -> &mut Self {
    self.add_edge_with(source, target, None, None)
  }

  /// Add an edge that fires when `condition` matches the source result.
  pub fn add_conditional_edge(
    &mut self,
    source: impl Into<String>,
    target: impl Into<String>,
    condition: ConditionConfig,
  ) -> &mut Self {
    self.add_edge_with(source, target, None, Some(condition))
  }

  /// Add an edge guarded by a programmatic predicate.
  pub fn add_predicate_edge<F>(
    &mut self,
    source: impl Into<String>,
    target: impl Into<String>,
    predicate: F,
  ) -> &mut Self
  where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
  {
    let predicate: Predicate = Arc::new(predicate);
    self.add_edge_with(source, target, Some(predicate), None)
  }

  /// Add an edge with an optional predicate and an optional declarative condition.
  ///
  /// Predicates are stored by `"source->target"`, so a later predicate for the
  /// same pair replaces the earlier one.
  pub fn add_edge_with(
    &mut self,
    source: impl Into<String>,
    target: impl Into<String>,
    predicate: Option<Predicate>,
    condition: Option<ConditionConfig>,
  ) -> &mut Self {
    let source = source.into();
    let target = target.into();

    if let Some(predicate) = predicate {
      self.predicates.insert(edge_key(&source, &target), predicate);
    }

    self.edges.push(Edge {
      source,
      target,
      condition_config: condition,
    });
    self
  }

  pub fn node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  pub fn component(&self, node_id: &str) -> Option<&Component> {
    self.components.get(node_id)
  }

  /// Nodes in insertion order.
  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.values()
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Build the traversal structure for this graph.
  pub fn topology(&self) -> Topology {
    Topology::new(self.nodes.keys().map(String::as_str), &self.edges)
  }

  /// Every outgoing edge of `node_id`, in insertion order, with whether it fires.
  pub fn edge_outcomes(&self, node_id: &str, result: Option<&Value>) -> Vec<(&Edge, bool)> {
    self
      .edges
      .iter()
      .filter(|edge| edge.source == node_id)
      .map(|edge| {
        let predicate = self.predicates.get(&edge.key());
        let fires = condition::evaluate(predicate, edge.condition_config.as_ref(), result);
        (edge, fires)
      })
      .collect()
  }

  /// Targets of the outgoing edges of `node_id` whose conditions hold for `result`.
  pub fn get_next_nodes(&self, node_id: &str, result: Option<&Value>) -> Vec<String> {
    self
      .edge_outcomes(node_id, result)
      .into_iter()
      .filter(|(_, fires)| *fires)
      .map(|(edge, _)| edge.target.clone())
      .collect()
  }

  /// Nodes that are not the target of any edge, in insertion order.
  pub fn get_entry_nodes(&self) -> Vec<String> {
    self
      .nodes
      .keys()
      .filter(|id| !self.edges.iter().any(|edge| &edge.target == *id))
      .cloned()
      .collect()
  }

  /// Collect every structural problem in the graph.
  pub fn diagnostics(&self) -> Vec<WorkflowError> {
    let mut errors = Vec::new();

    for node in self.nodes.values() {
      match self.components.get(&node.id) {
        None => errors.push(WorkflowError::MissingComponent(node.id.clone())),
        Some(component) if component.kind() != node.node_type => {
          errors.push(WorkflowError::ComponentMismatch {
            node_id: node.id.clone(),
            declared: node.node_type,
            bound: component.kind(),
          });
        }
        Some(_) => {}
      }

      if !node.config.is_object() {
        errors.push(WorkflowError::InvalidConfig(node.id.clone()));
      }
    }

    for edge in &self.edges {
      if !self.nodes.contains_key(&edge.source) {
        errors.push(WorkflowError::UnknownSource {
          from: edge.source.clone(),
          to: edge.target.clone(),
        });
      }
      if !self.nodes.contains_key(&edge.target) {
        errors.push(WorkflowError::UnknownTarget {
          from: edge.source.clone(),
          to: edge.target.clone(),
        });
      }
    }

    if !self.nodes.is_empty() && self.get_entry_nodes().is_empty() {
      errors.push(WorkflowError::NoEntryPoints);
    }

    if let Some(path) = self.topology().find_cycle() {
      errors.push(WorkflowError::Cycle { path });
    }

    errors
  }

  /// Validate the graph and return human-readable error messages.
  ///
  /// An empty list means the graph is valid. Never fails.
  pub fn validate(&self) -> Vec<String> {
    self
      .diagnostics()
      .iter()
      .map(ToString::to_string)
      .collect()
  }
}

impl fmt::Debug for WorkflowGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkflowGraph")
      .field("workflow_id", &self.workflow_id)
      .field("nodes", &self.nodes)
      .field("components", &self.components)
      .field("edges", &self.edges)
      .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn echo() -> Component {
    Component::function(|kwargs| Ok(Value::Object(kwargs)))
  }

  fn linear(ids: &[&str]) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new("wf");
    for id in ids {
      graph.add_node(*id, echo(), NodeType::Function, json!({}));
    }
    for pair in ids.windows(2) {
      graph.add_edge(pair[0], pair[1]);
    }
    graph
  }

  #[test]
  fn test_valid_linear_graph() {
    let graph = linear(&["a", "b", "c"]);
    assert!(graph.validate().is_empty());
    assert_eq!(graph.get_entry_nodes(), ["a"]);
    assert_eq!(graph.get_next_nodes("a", None), ["b"]);
    assert!(graph.get_next_nodes("c", None).is_empty());
    assert_eq!(graph.len(), 3);
  }

  #[test]
  fn test_entry_nodes_in_insertion_order() {
    let mut graph = WorkflowGraph::new("wf");
    graph
      .add_node("z", echo(), NodeType::Function, json!({}))
      .add_node("a", echo(), NodeType::Function, json!({}))
      .add_node("m", echo(), NodeType::Function, json!({}))
      .add_edge("z", "m");

    assert_eq!(graph.get_entry_nodes(), ["z", "a"]);
  }

  #[test]
  fn test_predicate_edges() {
    let mut graph = WorkflowGraph::new("wf");
    graph
      .add_node("check", echo(), NodeType::Function, json!({}))
      .add_node("ok", echo(), NodeType::Function, json!({}))
      .add_node("fallback", echo(), NodeType::Function, json!({}))
      .add_predicate_edge("check", "ok", |r| {
        r.as_str().is_some_and(|s| s.contains("success"))
      })
      .add_predicate_edge("check", "fallback", |r| {
        !r.as_str().is_some_and(|s| s.contains("success"))
      });

    assert_eq!(
      graph.get_next_nodes("check", Some(&json!("operation success"))),
      ["ok"]
    );
    assert_eq!(
      graph.get_next_nodes("check", Some(&json!("failure"))),
      ["fallback"]
    );
    assert_eq!(graph.get_next_nodes("check", None), ["fallback"]);
  }

  #[test]
  fn test_conditional_edges() {
    let mut graph = WorkflowGraph::new("wf");
    graph
      .add_node("review", echo(), NodeType::Function, json!({}))
      .add_node("publish", echo(), NodeType::Function, json!({}))
      .add_node("revise", echo(), NodeType::Function, json!({}))
      .add_conditional_edge(
        "review",
        "publish",
        ConditionConfig::field_equals("verdict", "approve"),
      )
      .add_conditional_edge(
        "review",
        "revise",
        ConditionConfig::field_equals("verdict", "reject"),
      );

    let approved = json!({"verdict": "approve"});
    assert_eq!(graph.get_next_nodes("review", Some(&approved)), ["publish"]);

    let outcomes = graph.edge_outcomes("review", Some(&approved));
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].1);
    assert!(!outcomes[1].1);
  }

  #[test]
  fn test_later_predicate_replaces_earlier() {
    let mut graph = linear(&["a", "b"]);
    graph.add_predicate_edge("a", "b", |_| false);
    graph.add_predicate_edge("a", "b", |_| true);

    // Three edges a->b now exist; all share the last predicate.
    assert_eq!(graph.get_next_nodes("a", None), ["b", "b", "b"]);
  }

  #[test]
  fn test_validate_reports_missing_and_mismatched_components() {
    let mut graph = WorkflowGraph::new("wf");
    graph.add_node("a", echo(), NodeType::Tool, json!({}));

    let errors = graph.diagnostics();
    assert_eq!(
      errors,
      vec![WorkflowError::ComponentMismatch {
        node_id: "a".to_string(),
        declared: NodeType::Tool,
        bound: NodeType::Function,
      }]
    );
    assert_eq!(
      graph.validate(),
      ["node 'a' is declared as tool but its component is a function"]
    );
  }

  #[test]
  fn test_validate_reports_unknown_edge_endpoints() {
    let mut graph = linear(&["a"]);
    graph.add_edge("a", "ghost").add_edge("phantom", "a");

    let errors = graph.diagnostics();
    assert!(errors.contains(&WorkflowError::UnknownTarget {
      from: "a".to_string(),
      to: "ghost".to_string(),
    }));
    assert!(errors.contains(&WorkflowError::UnknownSource {
      from: "phantom".to_string(),
      to: "a".to_string(),
    }));
  }

  #[test]
  fn test_validate_reports_cycle_and_no_entry_nodes() {
    let mut graph = linear(&["a", "b"]);
    graph.add_edge("b", "a");

    assert!(graph.get_entry_nodes().is_empty());
    let errors = graph.validate();
    assert!(errors.iter().any(|e| e.contains("no entry points")));
    assert!(errors.iter().any(|e| e.contains("contains a cycle")));
  }

  #[test]
  fn test_validate_reports_cycle_below_entry() {
    let mut graph = linear(&["start", "a", "b"]);
    graph.add_edge("b", "a");

    assert_eq!(graph.get_entry_nodes(), ["start"]);
    assert_eq!(
      graph.diagnostics(),
      vec![WorkflowError::Cycle {
        path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
      }]
    );
  }

  #[test]
  fn test_validate_reports_non_object_config() {
    let mut graph = WorkflowGraph::new("wf");
    graph.add_node("a", echo(), NodeType::Function, json!([1, 2]));
    assert_eq!(graph.diagnostics(), vec![WorkflowError::InvalidConfig("a".to_string())]);
  }

  #[test]
  fn test_empty_graph_is_valid() {
    let graph = WorkflowGraph::new("wf");
    assert!(graph.is_empty());
    assert!(graph.validate().is_empty());
  }
}

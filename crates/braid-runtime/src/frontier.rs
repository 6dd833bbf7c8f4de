//! Frontier scheduling.
//!
//! Given the results of one layer, decide which nodes make up the next layer.

use std::collections::{HashMap, HashSet};

use braid_workflow::WorkflowGraph;
use serde_json::Value;

use crate::config::JoinStrategy;

pub(crate) enum Frontier {
  /// Breadth-first: every fired edge schedules its target in the next layer.
  Any,
  /// Fan-in waits until every incoming edge of a node is resolved.
  All(JoinState),
}

impl Frontier {
  pub(crate) fn new(strategy: JoinStrategy, graph: &WorkflowGraph) -> Self {
    match strategy {
      JoinStrategy::Any => Frontier::Any,
      JoinStrategy::All => Frontier::All(JoinState::new(graph)),
    }
  }

  /// Build the next layer from `(node_id, result)` pairs in layer order.
  ///
  /// Targets are de-duplicated, keeping the first occurrence.
  pub(crate) fn advance(&mut self, graph: &WorkflowGraph, completed: &[(String, Value)]) -> Vec<String> {
    let mut next = Vec::new();
    let mut seen = HashSet::new();

    match self {
      Frontier::Any => {
        for (node_id, result) in completed {
          for target in graph.get_next_nodes(node_id, Some(result)) {
            if seen.insert(target.clone()) {
              next.push(target);
            }
          }
        }
      }
      Frontier::All(state) => {
        for (node_id, result) in completed {
          for target in state.settle(graph, node_id, Some(result)) {
            if seen.insert(target.clone()) {
              next.push(target);
            }
          }
        }
      }
    }

    next
  }
}

/// Incoming-edge bookkeeping for [`JoinStrategy::All`].
pub(crate) struct JoinState {
  /// Incoming edges of each node not yet resolved.
  remaining: HashMap<String, usize>,
  /// Nodes with at least one fired incoming edge.
  fired: HashSet<String>,
}

impl JoinState {
  fn new(graph: &WorkflowGraph) -> Self {
    let mut remaining: HashMap<String, usize> = HashMap::new();
    for edge in graph.edges() {
      *remaining.entry(edge.target.clone()).or_default() += 1;
    }

    Self {
      remaining,
      fired: HashSet::new(),
    }
  }

  /// Resolve the outgoing edges of a finished node.
  ///
  /// Returns the nodes that became ready. Nodes whose incoming edges all
  /// resolved without firing are skipped, and their own outgoing edges are
  /// resolved as not fired in turn.
  fn settle(&mut self, graph: &WorkflowGraph, node_id: &str, result: Option<&Value>) -> Vec<String> {
    let mut ready = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    self.resolve_edges(graph, node_id, result, true, &mut ready, &mut skipped);
    while let Some(skip) = skipped.pop() {
      self.resolve_edges(graph, &skip, None, false, &mut ready, &mut skipped);
    }

    ready
  }

  fn resolve_edges(
    &mut self,
    graph: &WorkflowGraph,
    node_id: &str,
    result: Option<&Value>,
    ran: bool,
    ready: &mut Vec<String>,
    skipped: &mut Vec<String>,
  ) {
    for (edge, fires) in graph.edge_outcomes(node_id, result) {
      let target = &edge.target;
      if ran && fires {
        self.fired.insert(target.clone());
      }

      let Some(count) = self.remaining.get_mut(target) else {
        continue;
      };
      *count = count.saturating_sub(1);
      if *count > 0 {
        continue;
      }

      if self.fired.contains(target) {
        ready.push(target.clone());
      } else {
        skipped.push(target.clone());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use braid_workflow::{Component, ConditionConfig, NodeType};
  use serde_json::json;

  fn graph(ids: &[&str], edges: &[(&str, &str)]) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new("wf");
    for id in ids {
      graph.add_node(
        *id,
        Component::function(|_| Ok(Value::Null)),
        NodeType::Function,
        json!({}),
      );
    }
    for (source, target) in edges {
      graph.add_edge(*source, *target);
    }
    graph
  }

  fn done(ids: &[&str]) -> Vec<(String, Value)> {
    ids.iter().map(|id| (id.to_string(), json!("ok"))).collect()
  }

  #[test]
  fn test_any_deduplicates_layer() {
    let graph = graph(
      &["a", "b", "c", "d"],
      &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    );
    let mut frontier = Frontier::new(JoinStrategy::Any, &graph);

    assert_eq!(frontier.advance(&graph, &done(&["a"])), ["b", "c"]);
    assert_eq!(frontier.advance(&graph, &done(&["b", "c"])), ["d"]);
    assert!(frontier.advance(&graph, &done(&["d"])).is_empty());
  }

  #[test]
  fn test_all_waits_for_every_predecessor() {
    // a -> b -> c -> d and a -> d: d is reached at depth 1 and 3.
    let graph = graph(
      &["a", "b", "c", "d"],
      &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")],
    );
    let mut frontier = Frontier::new(JoinStrategy::All, &graph);

    assert_eq!(frontier.advance(&graph, &done(&["a"])), ["b"]);
    assert_eq!(frontier.advance(&graph, &done(&["b"])), ["c"]);
    assert_eq!(frontier.advance(&graph, &done(&["c"])), ["d"]);
  }

  #[test]
  fn test_all_skips_unreached_branch() {
    // check -> yes -> merge, check -> no -> merge, only "yes" fires.
    let mut graph = graph(&["check", "yes", "no", "merge"], &[("yes", "merge"), ("no", "merge")]);
    graph
      .add_conditional_edge("check", "yes", ConditionConfig::result_equals("ok"))
      .add_conditional_edge("check", "no", ConditionConfig::result_equals("bad"));
    let mut frontier = Frontier::new(JoinStrategy::All, &graph);

    assert_eq!(frontier.advance(&graph, &done(&["check"])), ["yes"]);
    assert_eq!(frontier.advance(&graph, &done(&["yes"])), ["merge"]);
  }

  #[test]
  fn test_all_skip_propagates() {
    // Nothing fires out of "check", so "a" is skipped and so is its child.
    let mut graph = graph(&["check", "a", "b"], &[("a", "b")]);
    graph.add_conditional_edge("check", "a", ConditionConfig::ResultFalsy);
    let mut frontier = Frontier::new(JoinStrategy::All, &graph);

    assert!(frontier.advance(&graph, &done(&["check"])).is_empty());
  }
}

use std::collections::{HashMap, HashSet};

use crate::edge::Edge;

/// Derived graph structure for traversal and analysis.
///
/// Built on demand from a graph's nodes and edges; never stored.
#[derive(Debug, Clone)]
pub struct Topology {
  /// Node ids in insertion order.
  order: Vec<String>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
  /// Nodes with multiple incoming edges (join points).
  join_points: HashSet<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
  InProgress,
  Done,
}

impl Topology {
  /// Build the topology from node ids (in order) and edges.
  ///
  /// Edges pointing at unknown nodes still contribute adjacency entries so
  /// cycle detection sees the full edge set.
  pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a str>, edges: &[Edge]) -> Self {
    let order: Vec<String> = node_ids.into_iter().map(str::to_string).collect();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in &order {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for edge in edges {
      adjacency
        .entry(edge.source.clone())
        .or_default()
        .push(edge.target.clone());
      reverse_adjacency
        .entry(edge.target.clone())
        .or_default()
        .push(edge.source.clone());
    }

    let entry_points: Vec<String> = order
      .iter()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      order,
      adjacency,
      reverse_adjacency,
      entry_points,
      join_points,
    }
  }

  /// Nodes with no incoming edges, in node insertion order.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn is_join_point(&self, node_id: &str) -> bool {
    self.join_points.contains(node_id)
  }

  pub fn join_points(&self) -> &HashSet<String> {
    &self.join_points
  }

  /// Find a cycle with a depth-first search over every node.
  ///
  /// Returns the cycle as a path whose first and last element are the same
  /// node, e.g. `["a", "b", "a"]`.
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    let mut state: HashMap<&str, Visit> = HashMap::new();

    // Nodes only referenced by edges are visited after the declared ones.
    let mut roots: Vec<&str> = self.order.iter().map(String::as_str).collect();
    let mut extra: Vec<&str> = self
      .adjacency
      .keys()
      .map(String::as_str)
      .filter(|id| !self.order.iter().any(|known| known == id))
      .collect();
    extra.sort_unstable();
    roots.extend(extra);

    for root in roots {
      if state.contains_key(root) {
        continue;
      }

      // Explicit stack of (node, next child index); `path` mirrors the recursion stack.
      let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
      let mut path: Vec<&str> = vec![root];
      state.insert(root, Visit::InProgress);

      while let Some(frame) = stack.last_mut() {
        let node: &str = frame.0;
        let children = self.downstream(node);
        if frame.1 >= children.len() {
          state.insert(node, Visit::Done);
          stack.pop();
          path.pop();
          continue;
        }

        let child = children[frame.1].as_str();
        frame.1 += 1;

        match state.get(child) {
          Some(Visit::InProgress) => {
            let start = path.iter().position(|id| *id == child).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|id| id.to_string()).collect();
            cycle.push(child.to_string());
            return Some(cycle);
          }
          Some(Visit::Done) => {}
          None => {
            state.insert(child, Visit::InProgress);
            stack.push((child, 0));
            path.push(child);
          }
        }
      }
    }

    None
  }
}

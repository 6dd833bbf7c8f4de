use serde::{Deserialize, Serialize};

use crate::condition::ConditionConfig;

/// A directed edge between two nodes.
///
/// Only the declarative condition is stored here; programmatic predicates are
/// kept by the graph in a side table keyed by [`edge_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub source: String,
  pub target: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition_config: Option<ConditionConfig>,
}

impl Edge {
  /// Create an unconditional edge.
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      condition_config: None,
    }
  }

  pub fn with_condition(mut self, condition: ConditionConfig) -> Self {
    self.condition_config = Some(condition);
    self
  }

  /// Key of this edge in the predicate side table.
  pub fn key(&self) -> String {
    edge_key(&self.source, &self.target)
  }
}

/// `"source->target"`
pub fn edge_key(source: &str, target: &str) -> String {
  format!("{}->{}", source, target)
}

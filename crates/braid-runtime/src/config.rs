use serde::{Deserialize, Serialize};

/// How a node with several incoming edges is scheduled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
  /// Run the node in every frontier layer that schedules it.
  #[default]
  Any,
  /// Run the node once, after every predecessor has settled.
  All,
}

/// Configuration for the workflow engine.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on nodes running at once within a frontier layer. `None` runs
  /// the whole layer concurrently.
  pub max_parallel_nodes: Option<usize>,
  pub join_strategy: JoinStrategy,
}

impl EngineConfig {
  pub fn with_max_parallel_nodes(mut self, limit: usize) -> Self {
    self.max_parallel_nodes = Some(limit.max(1));
    self
  }

  pub fn with_join_strategy(mut self, strategy: JoinStrategy) -> Self {
    self.join_strategy = strategy;
    self
  }
}

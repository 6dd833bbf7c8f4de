//! Per-run execution state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ContextError;
use crate::events::{EventKind, ExecutionEvent};

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Pending,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl ExecutionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExecutionStatus::Pending => "pending",
      ExecutionStatus::Running => "running",
      ExecutionStatus::Paused => "paused",
      ExecutionStatus::Completed => "completed",
      ExecutionStatus::Failed => "failed",
      ExecutionStatus::Cancelled => "cancelled",
    }
  }

  /// Completed, failed and cancelled executions never change again.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
    )
  }

  pub fn can_transition_to(&self, to: ExecutionStatus) -> bool {
    use ExecutionStatus::*;
    matches!(
      (self, to),
      (Pending, Running | Failed | Cancelled)
        | (Running, Paused | Completed | Failed | Cancelled)
        | (Paused, Running | Failed | Cancelled)
    )
  }
}

impl fmt::Display for ExecutionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The state of one workflow run: variables, node results, status and event log.
///
/// The engine owns the live context; callers receive clones.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
  workflow_id: String,
  execution_id: String,
  variables: Map<String, Value>,
  node_results: HashMap<String, Value>,
  status: ExecutionStatus,
  events: Vec<ExecutionEvent>,
  started_at: DateTime<Utc>,
  completed_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
  /// Create a pending context with a fresh execution id.
  pub fn new(workflow_id: impl Into<String>, variables: Map<String, Value>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      execution_id: uuid::Uuid::new_v4().to_string(),
      variables,
      node_results: HashMap::new(),
      status: ExecutionStatus::Pending,
      events: Vec::new(),
      started_at: Utc::now(),
      completed_at: None,
    }
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  pub fn variables(&self) -> &Map<String, Value> {
    &self.variables
  }

  pub fn variable(&self, name: &str) -> Option<&Value> {
    self.variables.get(name)
  }

  pub fn node_results(&self) -> &HashMap<String, Value> {
    &self.node_results
  }

  pub fn node_result(&self, node_id: &str) -> Option<&Value> {
    self.node_results.get(node_id)
  }

  pub fn status(&self) -> ExecutionStatus {
    self.status
  }

  pub fn events(&self) -> &[ExecutionEvent] {
    &self.events
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  pub fn completed_at(&self) -> Option<DateTime<Utc>> {
    self.completed_at
  }

  /// Move to `to`, stamping `completed_at` when a terminal state is entered.
  pub fn transition(&mut self, to: ExecutionStatus) -> Result<(), ContextError> {
    if !self.status.can_transition_to(to) {
      return Err(ContextError::InvalidTransition {
        from: self.status,
        to,
      });
    }

    self.status = to;
    if to.is_terminal() {
      self.completed_at = Some(Utc::now());
    }
    Ok(())
  }

  /// Append an event to the log and return a copy for notifiers.
  pub fn record(&mut self, kind: EventKind) -> ExecutionEvent {
    let event = ExecutionEvent {
      execution_id: self.execution_id.clone(),
      timestamp: Utc::now(),
      kind,
    };
    self.events.push(event.clone());
    event
  }

  pub(crate) fn set_variable(&mut self, name: impl Into<String>, value: Value) {
    self.variables.insert(name.into(), value);
  }

  pub(crate) fn set_node_result(&mut self, node_id: impl Into<String>, result: Value) {
    self.node_results.insert(node_id.into(), result);
  }

  pub fn summary(&self) -> ExecutionSummary {
    ExecutionSummary {
      execution_id: self.execution_id.clone(),
      workflow_id: self.workflow_id.clone(),
      status: self.status,
      started_at: self.started_at,
      completed_at: self.completed_at,
    }
  }
}

/// Lightweight view of a registered execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_new_context_is_pending() {
    let ctx = ExecutionContext::new("wf", Map::new());
    assert_eq!(ctx.status(), ExecutionStatus::Pending);
    assert!(ctx.events().is_empty());
    assert!(ctx.completed_at().is_none());
    assert!(uuid::Uuid::parse_str(ctx.execution_id()).is_ok());
  }

  #[test]
  fn test_execution_ids_are_unique() {
    let a = ExecutionContext::new("wf", Map::new());
    let b = ExecutionContext::new("wf", Map::new());
    assert_ne!(a.execution_id(), b.execution_id());
  }

  #[test]
  fn test_legal_transitions() {
    let mut ctx = ExecutionContext::new("wf", Map::new());
    ctx.transition(ExecutionStatus::Running).unwrap();
    ctx.transition(ExecutionStatus::Paused).unwrap();
    ctx.transition(ExecutionStatus::Running).unwrap();
    assert!(ctx.completed_at().is_none());
    ctx.transition(ExecutionStatus::Completed).unwrap();
    assert!(ctx.completed_at().is_some());
  }

  #[test]
  fn test_terminal_states_are_final() {
    let mut ctx = ExecutionContext::new("wf", Map::new());
    ctx.transition(ExecutionStatus::Running).unwrap();
    ctx.transition(ExecutionStatus::Cancelled).unwrap();

    for to in [
      ExecutionStatus::Running,
      ExecutionStatus::Completed,
      ExecutionStatus::Failed,
      ExecutionStatus::Cancelled,
    ] {
      assert_eq!(
        ctx.transition(to),
        Err(ContextError::InvalidTransition {
          from: ExecutionStatus::Cancelled,
          to,
        })
      );
    }
  }

  #[test]
  fn test_completion_only_from_running() {
    assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Completed));
    assert!(!ExecutionStatus::Paused.can_transition_to(ExecutionStatus::Completed));
    assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Failed));
    assert!(ExecutionStatus::Paused.can_transition_to(ExecutionStatus::Cancelled));
    assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Paused));
  }

  #[test]
  fn test_record_appends_events() {
    let mut ctx = ExecutionContext::new("wf", Map::new());
    let event = ctx.record(EventKind::ExecutionStarted {
      workflow_id: "wf".to_string(),
    });

    assert_eq!(event.execution_id, ctx.execution_id());
    assert_eq!(ctx.events(), [event]);
  }

  #[test]
  fn test_serializes_status_snake_case() {
    let mut ctx = ExecutionContext::new("wf", Map::new());
    ctx.set_variable("x", json!(1));
    let value = serde_json::to_value(&ctx).unwrap();
    assert_eq!(value["status"], "pending");
    assert_eq!(value["variables"], json!({"x": 1}));
  }
}

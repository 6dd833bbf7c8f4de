//! Execution events and notifiers for observability.
//!
//! Every event is appended to the execution's own log and, at the same time,
//! handed to the engine's [`ExecutionNotifier`] so consumers can persist or
//! stream progress without polling.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// A timestamped entry in an execution's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
  pub execution_id: String,
  pub timestamp: DateTime<Utc>,
  #[serde(flatten)]
  pub kind: EventKind,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
  /// The execution was created.
  ExecutionStarted { workflow_id: String },

  /// Graph validation reported a problem. One event per problem.
  ValidationFailed { error: String },

  /// A node was dispatched.
  NodeStarted { node_id: String },

  /// A node produced a result.
  NodeCompleted { node_id: String, result: Value },

  /// A node's component returned an error or panicked.
  NodeFailed { node_id: String, error: String },

  /// A node result was written back into the variable table.
  VariableSet { name: String, node_id: String },

  ExecutionPaused,
  ExecutionResumed,
  ExecutionCancelled,

  /// The frontier was exhausted.
  ExecutionCompleted {
    variables: Map<String, Value>,
    node_results: HashMap<String, Value>,
  },

  ExecutionFailed { error: String },
}

impl EventKind {
  /// The node this event refers to, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      EventKind::NodeStarted { node_id }
      | EventKind::NodeCompleted { node_id, .. }
      | EventKind::NodeFailed { node_id, .. }
      | EventKind::VariableSet { node_id, .. } => Some(node_id),
      _ => None,
    }
  }
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event it records - implementations decide
/// what to do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when you need to consume events asynchronously (e.g., persist
/// to a database, stream to a UI via websocket, etc.).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run. Volume is a handful of
  // events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

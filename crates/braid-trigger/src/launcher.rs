//! Starting workflow runs on behalf of triggers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use braid_runtime::{ExecutionNotifier, NoopNotifier, WorkflowEngine};
use braid_workflow::WorkflowGraph;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::TriggerError;

/// Starts a workflow run and returns its execution id without waiting for it.
#[async_trait]
pub trait WorkflowLauncher: Send + Sync {
  async fn launch(&self, workflow_id: &str, data: Value) -> Result<String, TriggerError>;
}

/// Launches registered workflows on a [`WorkflowEngine`].
///
/// Trigger data becomes the run's initial variables: an object is used as-is,
/// `null` means no variables, and any other value is stored under `data`.
pub struct EngineLauncher<N: ExecutionNotifier = NoopNotifier> {
  engine: WorkflowEngine<N>,
  workflows: RwLock<HashMap<String, Arc<WorkflowGraph>>>,
}

impl<N: ExecutionNotifier + 'static> EngineLauncher<N> {
  pub fn new(engine: WorkflowEngine<N>) -> Self {
    Self {
      engine,
      workflows: RwLock::new(HashMap::new()),
    }
  }

  /// Make `graph` launchable under its workflow id, replacing any previous graph.
  pub fn register_workflow(&self, graph: impl Into<Arc<WorkflowGraph>>) {
    let graph = graph.into();
    let workflow_id = graph.workflow_id().to_string();
    info!(workflow_id = %workflow_id, nodes = graph.len(), "workflow_registered");
    self
      .workflows
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(workflow_id, graph);
  }

  pub fn unregister_workflow(&self, workflow_id: &str) -> bool {
    self
      .workflows
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(workflow_id)
      .is_some()
  }

  /// The engine runs are started on, for status and control.
  pub fn engine(&self) -> &WorkflowEngine<N> {
    &self.engine
  }

  fn graph(&self, workflow_id: &str) -> Option<Arc<WorkflowGraph>> {
    self
      .workflows
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(workflow_id)
      .cloned()
  }
}

#[async_trait]
impl<N: ExecutionNotifier + 'static> WorkflowLauncher for EngineLauncher<N> {
  async fn launch(&self, workflow_id: &str, data: Value) -> Result<String, TriggerError> {
    let graph = self
      .graph(workflow_id)
      .ok_or_else(|| TriggerError::UnknownWorkflow(workflow_id.to_string()))?;

    let execution = self.engine.execute(graph, variables_from(data));
    let execution_id = execution.execution_id().to_string();
    tokio::spawn(execution.wait());

    Ok(execution_id)
  }
}

fn variables_from(data: Value) -> Map<String, Value> {
  match data {
    Value::Object(map) => map,
    Value::Null => Map::new(),
    other => {
      let mut map = Map::new();
      map.insert("data".to_string(), other);
      map
    }
  }
}

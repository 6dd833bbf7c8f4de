//! Workflow execution.

use std::collections::HashMap;
use std::sync::Arc;

use braid_workflow::{NodeContext, WorkflowGraph};
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{error, info, instrument, warn};

use crate::agent::AgentExecutor;
use crate::config::EngineConfig;
use crate::context::{ExecutionContext, ExecutionStatus};
use crate::dispatch::NodeDispatch;
use crate::error::RuntimeError;
use crate::events::{EventKind, ExecutionNotifier};
use crate::frontier::Frontier;
use crate::registry::ExecutionSlot;

/// A handle to a registered workflow execution.
///
/// The execution is visible to the engine's control operations as soon as the
/// handle exists. Call `.wait()` to drive it to a terminal state; a handle
/// dropped without waiting leaves the execution `Running` in the registry
/// until it is cancelled.
#[must_use = "the execution only runs when `.wait()` is awaited"]
pub struct WorkflowExecution<N: ExecutionNotifier> {
  graph: Arc<WorkflowGraph>,
  slot: Arc<ExecutionSlot>,
  notifier: Arc<N>,
  agent_executor: Option<Arc<dyn AgentExecutor>>,
  config: EngineConfig,
  execution_id: String,
}

impl<N: ExecutionNotifier + 'static> WorkflowExecution<N> {
  pub(crate) fn new(
    graph: Arc<WorkflowGraph>,
    slot: Arc<ExecutionSlot>,
    notifier: Arc<N>,
    agent_executor: Option<Arc<dyn AgentExecutor>>,
    config: EngineConfig,
  ) -> Self {
    let execution_id = slot.lock().execution_id().to_string();
    Self {
      graph,
      slot,
      notifier,
      agent_executor,
      config,
      execution_id,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Current snapshot of the execution.
  pub fn snapshot(&self) -> ExecutionContext {
    self.slot.snapshot()
  }

  /// Run the workflow to a terminal state and return the final context.
  #[instrument(
    name = "workflow_execute",
    skip(self),
    fields(
      workflow_id = %self.graph.workflow_id(),
      execution_id = %self.execution_id,
    )
  )]
  pub async fn wait(self) -> ExecutionContext {
    // Validation failures and early cancels leave nothing to run.
    if self.slot.lock().status().is_terminal() {
      return self.slot.snapshot();
    }

    info!(
      execution_id = %self.execution_id,
      workflow_id = %self.graph.workflow_id(),
      nodes = self.graph.len(),
      "workflow_started"
    );

    let result = self.run_loop().await;
    self.finish(result).await
  }

  /// Walk the graph frontier by frontier until it is exhausted.
  async fn run_loop(&self) -> Result<(), RuntimeError> {
    let mut layer = self.graph.get_entry_nodes();
    if layer.is_empty() {
      return Err(RuntimeError::NoEntryNodes);
    }

    let mut frontier = Frontier::new(self.config.join_strategy, &self.graph);
    let semaphore = self
      .config
      .max_parallel_nodes
      .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    loop {
      self.checkpoint().await?;

      if layer.is_empty() {
        return Ok(());
      }

      info!(
        execution_id = %self.execution_id,
        ready_nodes = ?layer,
        "executing batch of ready nodes"
      );

      let completed = self.run_layer(&layer, semaphore.as_ref()).await?;

      // Dispatched siblings finish and are recorded, but a cancel issued
      // meanwhile stops the graph from advancing.
      if self.slot.cancel.is_cancelled() {
        return Err(RuntimeError::Cancelled);
      }

      layer = frontier.advance(&self.graph, &completed);
    }
  }

  /// Block while paused. Errors once the execution has been cancelled.
  async fn checkpoint(&self) -> Result<(), RuntimeError> {
    loop {
      let notified = self.slot.wake.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      let status = self.slot.lock().status();
      match status {
        ExecutionStatus::Running => return Ok(()),
        ExecutionStatus::Paused => {
          info!(execution_id = %self.execution_id, "workflow_paused");
          notified.await;
        }
        _ => {
          warn!(execution_id = %self.execution_id, status = %status, "workflow_cancelled");
          return Err(RuntimeError::Cancelled);
        }
      }
    }
  }

  /// Run one layer concurrently and record results in layer order.
  ///
  /// Returns the `(node_id, result)` pairs of the nodes that succeeded. Fails
  /// with the first node error once the whole layer has been recorded.
  async fn run_layer(
    &self,
    layer: &[String],
    semaphore: Option<&Arc<Semaphore>>,
  ) -> Result<Vec<(String, Value)>, RuntimeError> {
    let (variables, node_results) = {
      let ctx = self.slot.lock();
      (ctx.variables().clone(), ctx.node_results().clone())
    };

    let mut handles = Vec::with_capacity(layer.len());
    for node_id in layer {
      let dispatch = self.prepare(node_id, &variables, &node_results)?;
      let slot = self.slot.clone();
      let notifier = self.notifier.clone();
      let semaphore = semaphore.cloned();
      let node_id = node_id.clone();

      // Yields `None` when the node never started because the run was cancelled.
      handles.push(tokio::spawn(async move {
        let _permit = match semaphore {
          Some(semaphore) => tokio::select! {
            _ = slot.cancel.cancelled() => return None,
            permit = semaphore.acquire_owned() => permit.ok(),
          },
          None => None,
        };
        if slot.cancel.is_cancelled() {
          return None;
        }

        let event = slot.lock().record(EventKind::NodeStarted { node_id });
        notifier.notify(event);

        Some(dispatch.run().await)
      }));
    }

    let joined = futures::future::join_all(handles).await;

    let mut completed = Vec::with_capacity(layer.len());
    let mut first_error = None;

    for (node_id, joined) in layer.iter().zip(joined) {
      let result = match joined {
        Ok(Some(result)) => result,
        Ok(None) => {
          info!(
            execution_id = %self.execution_id,
            node_id = %node_id,
            "node_not_started_cancelled"
          );
          continue;
        }
        Err(e) => Err(RuntimeError::NodePanicked {
          node_id: node_id.clone(),
          message: panic_message(e),
        }),
      };

      match result {
        Ok(value) => {
          self.record_success(node_id, &value);
          completed.push((node_id.clone(), value));
        }
        Err(e) => {
          self.record_failure(node_id, &e);
          first_error.get_or_insert(e);
        }
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(completed),
    }
  }

  fn prepare(
    &self,
    node_id: &str,
    variables: &Map<String, Value>,
    node_results: &HashMap<String, Value>,
  ) -> Result<NodeDispatch, RuntimeError> {
    let node = self
      .graph
      .node(node_id)
      .ok_or_else(|| RuntimeError::NodeNotFound {
        node_id: node_id.to_string(),
      })?;
    let component = self
      .graph
      .component(node_id)
      .ok_or_else(|| RuntimeError::MissingComponent {
        node_id: node_id.to_string(),
        node_type: node.node_type,
      })?;

    Ok(NodeDispatch {
      node: node.clone(),
      component: component.clone(),
      ctx: NodeContext {
        workflow_id: self.graph.workflow_id().to_string(),
        execution_id: self.execution_id.clone(),
        variables: variables.clone(),
        node_results: node_results.clone(),
        cancel: self.slot.cancel.clone(),
      },
      agent_executor: self.agent_executor.clone(),
    })
  }

  fn record_success(&self, node_id: &str, value: &Value) {
    let output_variable = self
      .graph
      .node(node_id)
      .and_then(|node| node.output_variable.clone());

    let events = {
      let mut ctx = self.slot.lock();
      ctx.set_node_result(node_id, value.clone());
      let mut events = vec![ctx.record(EventKind::NodeCompleted {
        node_id: node_id.to_string(),
        result: value.clone(),
      })];

      if let Some(name) = output_variable {
        ctx.set_variable(name.clone(), value.clone());
        events.push(ctx.record(EventKind::VariableSet {
          name,
          node_id: node_id.to_string(),
        }));
      }
      events
    };

    events.into_iter().for_each(|event| self.notifier.notify(event));
  }

  fn record_failure(&self, node_id: &str, err: &RuntimeError) {
    let event = {
      let mut ctx = self.slot.lock();
      ctx.set_node_result(node_id, json!({ "error": err.to_string() }));
      ctx.record(EventKind::NodeFailed {
        node_id: node_id.to_string(),
        error: err.to_string(),
      })
    };
    self.notifier.notify(event);
  }

  /// Move the context to its terminal state and return the final snapshot.
  async fn finish(&self, result: Result<(), RuntimeError>) -> ExecutionContext {
    let result = match result {
      Ok(()) => self.complete().await,
      Err(e) => Err(e),
    };
    if let Err(e) = &result {
      self.fail(e);
    }

    let snapshot = self.slot.snapshot();
    match snapshot.status() {
      ExecutionStatus::Completed => info!(
        execution_id = %self.execution_id,
        nodes_run = snapshot.node_results().len(),
        "workflow_completed"
      ),
      ExecutionStatus::Cancelled => warn!(execution_id = %self.execution_id, "workflow_cancelled"),
      status => error!(
        execution_id = %self.execution_id,
        status = %status,
        error = ?result.err().map(|e| e.to_string()),
        "workflow_failed"
      ),
    }

    snapshot
  }

  /// Transition to `Completed`, holding while a pause requested after the
  /// last layer is in effect. Errors if the run is cancelled meanwhile.
  async fn complete(&self) -> Result<(), RuntimeError> {
    loop {
      let notified = self.slot.wake.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      let event = {
        let mut ctx = self.slot.lock();
        match ctx.transition(ExecutionStatus::Completed) {
          Ok(()) => {
            let kind = EventKind::ExecutionCompleted {
              variables: ctx.variables().clone(),
              node_results: ctx.node_results().clone(),
            };
            Some(ctx.record(kind))
          }
          Err(_) if ctx.status() == ExecutionStatus::Paused => None,
          Err(_) => return Err(RuntimeError::Cancelled),
        }
      };

      match event {
        Some(event) => {
          self.notifier.notify(event);
          return Ok(());
        }
        None => {
          info!(execution_id = %self.execution_id, "workflow_paused");
          notified.await;
        }
      }
    }
  }

  fn fail(&self, err: &RuntimeError) {
    let event = {
      let mut ctx = self.slot.lock();
      match ctx.transition(ExecutionStatus::Failed) {
        Ok(()) => Some(ctx.record(EventKind::ExecutionFailed {
          error: err.to_string(),
        })),
        // Already cancelled.
        Err(_) => None,
      }
    };

    if let Some(event) = event {
      self.notifier.notify(event);
    }
  }
}

fn panic_message(err: JoinError) -> String {
  if !err.is_panic() {
    return err.to_string();
  }

  let payload = err.into_panic();
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

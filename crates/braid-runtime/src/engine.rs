//! Workflow execution engine.
//!
//! The `WorkflowEngine` validates graphs, starts executions, and exposes the
//! control surface (pause, resume, cancel, status) for executions it started.

use std::sync::Arc;

use braid_workflow::WorkflowGraph;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agent::AgentExecutor;
use crate::config::EngineConfig;
use crate::context::{ExecutionContext, ExecutionStatus, ExecutionSummary};
use crate::events::{EventKind, ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::execution::WorkflowExecution;
use crate::registry::{ExecutionRegistry, ExecutionSlot};

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `WorkflowEngine::new()` for a default engine with no-op notifications,
/// or `WorkflowEngine::with_notifier()` to provide a custom notifier.
///
/// Clones share the same registry and notifier.
pub struct WorkflowEngine<N: ExecutionNotifier = NoopNotifier> {
  registry: ExecutionRegistry,
  notifier: Arc<N>,
  agent_executor: Option<Arc<dyn AgentExecutor>>,
  config: EngineConfig,
}

impl<N: ExecutionNotifier> Clone for WorkflowEngine<N> {
  fn clone(&self) -> Self {
    Self {
      registry: self.registry.clone(),
      notifier: self.notifier.clone(),
      agent_executor: self.agent_executor.clone(),
      config: self.config.clone(),
    }
  }
}

impl WorkflowEngine<NoopNotifier> {
  /// Create a new workflow engine with no-op notifications.
  pub fn new(config: EngineConfig) -> Self {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl Default for WorkflowEngine<NoopNotifier> {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

impl<N: ExecutionNotifier + 'static> WorkflowEngine<N> {
  /// Create a new workflow engine with a custom notifier.
  pub fn with_notifier(config: EngineConfig, notifier: N) -> Self {
    Self {
      registry: ExecutionRegistry::default(),
      notifier: Arc::new(notifier),
      agent_executor: None,
      config,
    }
  }

  /// Set the collaborator that runs agent nodes.
  pub fn with_agent_executor(mut self, executor: impl AgentExecutor + 'static) -> Self {
    self.agent_executor = Some(Arc::new(executor));
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Register a new execution of `graph` and return its handle.
  ///
  /// The graph is validated first. An invalid graph still produces a
  /// registered execution, already `Failed`, whose log carries one
  /// `ValidationFailed` event per problem.
  ///
  /// Nothing runs until the handle's `wait()` is awaited.
  pub fn execute(&self, graph: Arc<WorkflowGraph>, variables: Map<String, Value>) -> WorkflowExecution<N> {
    let mut context = ExecutionContext::new(graph.workflow_id(), variables);
    let mut events = vec![context.record(EventKind::ExecutionStarted {
      workflow_id: graph.workflow_id().to_string(),
    })];

    let errors = graph.validate();
    if errors.is_empty() {
      self.apply(&mut context, ExecutionStatus::Running);
    } else {
      warn!(
        execution_id = %context.execution_id(),
        workflow_id = %graph.workflow_id(),
        errors = ?errors,
        "workflow_validation_failed"
      );
      for error in &errors {
        events.push(context.record(EventKind::ValidationFailed {
          error: error.clone(),
        }));
      }
      self.apply(&mut context, ExecutionStatus::Failed);
      events.push(context.record(EventKind::ExecutionFailed {
        error: format!("workflow validation failed: {}", errors.join("; ")),
      }));
    }

    let execution_id = context.execution_id().to_string();
    let slot = Arc::new(ExecutionSlot::new(context));
    self.registry.insert(execution_id, slot.clone());
    events.into_iter().for_each(|event| self.notifier.notify(event));

    WorkflowExecution::new(
      graph,
      slot,
      self.notifier.clone(),
      self.agent_executor.clone(),
      self.config.clone(),
    )
  }

  /// Run `graph` to a terminal state.
  pub async fn run(&self, graph: Arc<WorkflowGraph>, variables: Map<String, Value>) -> ExecutionContext {
    self.execute(graph, variables).wait().await
  }

  /// Pause a running execution at its next frontier boundary.
  pub fn pause_execution(&self, execution_id: &str) -> bool {
    let paused = self.control(execution_id, ExecutionStatus::Paused, EventKind::ExecutionPaused);
    if paused {
      info!(execution_id = %execution_id, "pause_requested");
    }
    paused
  }

  /// Resume a paused execution where it stopped.
  pub fn resume_execution(&self, execution_id: &str) -> bool {
    let resumed = self.control(execution_id, ExecutionStatus::Running, EventKind::ExecutionResumed);
    if resumed {
      info!(execution_id = %execution_id, "workflow_resumed");
    }
    resumed
  }

  /// Cancel a running or paused execution.
  ///
  /// Nodes already dispatched finish, but no further nodes are started.
  pub fn cancel_execution(&self, execution_id: &str) -> bool {
    let cancelled = self.control(
      execution_id,
      ExecutionStatus::Cancelled,
      EventKind::ExecutionCancelled,
    );
    if cancelled {
      info!(execution_id = %execution_id, "cancel_requested");
    }
    cancelled
  }

  /// Snapshot of an execution, if it is registered.
  pub fn get_execution_status(&self, execution_id: &str) -> Option<ExecutionContext> {
    self.registry.get(execution_id).map(|slot| slot.snapshot())
  }

  /// Summaries of every registered execution, oldest first.
  pub fn list_executions(&self) -> Vec<ExecutionSummary> {
    self.registry.list()
  }

  /// Remove a terminal execution from the registry and return its final state.
  pub fn evict_execution(&self, execution_id: &str) -> Option<ExecutionContext> {
    self.registry.evict(execution_id)
  }

  /// Remove every terminal execution from the registry.
  pub fn evict_terminal(&self) -> usize {
    self.registry.evict_terminal()
  }

  fn control(&self, execution_id: &str, to: ExecutionStatus, kind: EventKind) -> bool {
    let Some(slot) = self.registry.get(execution_id) else {
      return false;
    };

    let event: ExecutionEvent = {
      let mut ctx = slot.lock();
      if ctx.transition(to).is_err() {
        return false;
      }
      ctx.record(kind)
    };

    if to == ExecutionStatus::Cancelled {
      slot.cancel.cancel();
    }
    slot.wake.notify_waiters();
    self.notifier.notify(event);
    true
  }

  fn apply(&self, context: &mut ExecutionContext, to: ExecutionStatus) {
    if let Err(e) = context.transition(to) {
      warn!(execution_id = %context.execution_id(), error = %e, "ignored status transition");
    }
  }
}

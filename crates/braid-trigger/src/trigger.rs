//! The trigger contract.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::error::TriggerError;
use crate::launcher::WorkflowLauncher;

/// A source of workflow launches.
///
/// Triggers are registered with a [`crate::TriggerService`], which attaches a
/// [`TriggerSink`] the trigger fires through. `start` and `stop` never block.
pub trait Trigger: Send + Sync {
  /// The workflow this trigger launches.
  fn workflow_id(&self) -> &str;

  /// Receive the sink used to launch workflows.
  fn attach(&self, sink: TriggerSink);

  fn start(&self) -> Result<(), TriggerError>;

  fn stop(&self);

  fn is_active(&self) -> bool;
}

/// Back-reference from a trigger to the service that owns it.
#[derive(Clone)]
pub struct TriggerSink {
  name: String,
  launcher: Arc<dyn WorkflowLauncher>,
}

impl TriggerSink {
  pub fn new(name: impl Into<String>, launcher: Arc<dyn WorkflowLauncher>) -> Self {
    Self {
      name: name.into(),
      launcher,
    }
  }

  /// Name the trigger is registered under.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Launch `workflow_id` with `data` and return the new execution id.
  pub async fn trigger_workflow(&self, workflow_id: &str, data: Value) -> Result<String, TriggerError> {
    let result = self.launcher.launch(workflow_id, data).await;
    match &result {
      Ok(execution_id) => info!(
        trigger = %self.name,
        workflow_id = %workflow_id,
        execution_id = %execution_id,
        "workflow_triggered"
      ),
      Err(e) => error!(
        trigger = %self.name,
        workflow_id = %workflow_id,
        error = %e,
        "trigger_launch_failed"
      ),
    }
    result
  }
}
